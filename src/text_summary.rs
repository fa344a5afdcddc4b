//! Text summary builder for CLI output.
//!
//! Formats the assignment table, the metrics list, and the chart line.

use crate::model::{ScheduleAssignment, SessionResult};

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

const HEADERS: [&str; 10] = [
    "Patient",
    "Name",
    "Disease",
    "Doctor",
    "Doctor Name",
    "Specialty",
    "Match",
    "Urgency",
    "Fuzzy",
    "Bed",
];

fn cells(row: &ScheduleAssignment) -> [String; 10] {
    [
        row.patient_id.clone(),
        row.patient_name.clone(),
        row.disease.clone(),
        row.doctor_id.clone(),
        row.doctor_name.clone(),
        row.specialty.clone(),
        row.specialty_match.clone(),
        format_urgency(row.urgency),
        format!("{:.3}", row.fuzzy_score),
        row.bed_id.clone(),
    ]
}

fn format_urgency(u: f64) -> String {
    if u.fract() == 0.0 {
        format!("{u:.0}")
    } else {
        u.to_string()
    }
}

/// Build a text summary from a completed (or partial) session result.
pub(crate) fn build_text_summary(result: &SessionResult) -> TextSummary {
    let mut lines = Vec::new();

    if result.assignments.is_empty() {
        lines.push("No assignments.".to_string());
    } else {
        let rows: Vec<[String; 10]> = result.assignments.iter().map(cells).collect();
        let mut widths = HEADERS.map(|h| h.chars().count());
        for row in &rows {
            for (w, cell) in widths.iter_mut().zip(row) {
                *w = (*w).max(cell.chars().count());
            }
        }
        let header: [String; 10] = HEADERS.map(str::to_string);
        lines.push(join_row(&header, &widths));
        lines.push(
            widths
                .iter()
                .map(|w| "-".repeat(*w))
                .collect::<Vec<_>>()
                .join("  "),
        );
        lines.extend(rows.iter().map(|row| join_row(row, &widths)));
    }

    if !result.metrics.is_empty() {
        lines.push(String::new());
        lines.push("Metrics:".to_string());
        let key_width = result
            .metrics
            .iter()
            .map(|m| m.key.chars().count())
            .max()
            .unwrap_or(0);
        for m in &result.metrics {
            lines.push(format!("  {:<key_width$}  {}", m.key, m.value));
        }
    }

    if let Some(chart) = &result.chart {
        lines.push(String::new());
        lines.push(format!(
            "Convergence chart: {} ({}x{})",
            chart.path.display(),
            chart.width,
            chart.height
        ));
    }

    TextSummary { lines }
}

fn join_row(cells: &[String; 10], widths: &[usize; 10]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(cell, w)| format!("{cell:<w$}", w = *w))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}
