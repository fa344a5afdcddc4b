//! Read the optimizer's result directory.
//!
//! The three artifacts are independent. A missing file is never an error;
//! only a present but unreadable assignment table is reported.

use crate::model::{now_rfc3339, ChartImage, MetricEntry, ScheduleAssignment, SessionResult};
use image::ImageFormat;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const ASSIGNMENTS_FILE: &str = "output.json";
pub const METRICS_FILE: &str = "metrics.csv";
pub const CHART_FILE: &str = "convergence.png";

#[derive(Debug, thiserror::Error)]
pub enum IngestionError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("ingestion task failed: {0}")]
    Join(String),
}

/// Whatever could be read, plus the assignment-table error if there was one.
#[derive(Debug)]
pub struct IngestReport {
    pub result: SessionResult,
    pub table_error: Option<IngestionError>,
}

pub fn ingest(results_dir: &Path) -> IngestReport {
    let (assignments, table_error) = match read_assignments(&results_dir.join(ASSIGNMENTS_FILE))
    {
        Ok(rows) => (rows, None),
        Err(e) => {
            warn!(error = %e, "assignment table rejected");
            (Vec::new(), Some(e))
        }
    };
    let metrics = read_metrics(&results_dir.join(METRICS_FILE));
    let chart = load_chart(&results_dir.join(CHART_FILE));

    IngestReport {
        result: SessionResult {
            completed_at: now_rfc3339(),
            assignments,
            metrics,
            chart,
        },
        table_error,
    }
}

pub fn read_assignments(path: &Path) -> Result<Vec<ScheduleAssignment>, IngestionError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "no assignment table");
            return Ok(Vec::new());
        }
        Err(source) => {
            return Err(IngestionError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    parse_assignments(&raw).map_err(|source| IngestionError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse, round fuzzy scores, and order by urgency (highest first, stable).
pub fn parse_assignments(raw: &str) -> Result<Vec<ScheduleAssignment>, serde_json::Error> {
    let mut rows: Vec<ScheduleAssignment> = serde_json::from_str(raw)?;
    for row in &mut rows {
        row.fuzzy_score = round3(row.fuzzy_score);
    }
    sort_by_urgency(&mut rows);
    Ok(rows)
}

pub fn sort_by_urgency(rows: &mut [ScheduleAssignment]) {
    rows.sort_by(|a, b| b.urgency.total_cmp(&a.urgency));
}

// Halves go to the even neighbour.
fn round3(v: f64) -> f64 {
    (v * 1000.0).round_ties_even() / 1000.0
}

pub fn read_metrics(path: &Path) -> Vec<MetricEntry> {
    match std::fs::read(path) {
        Ok(raw) => parse_metrics(&raw),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "metrics skipped");
            Vec::new()
        }
    }
}

/// Skip the header; keep lines with at least two UTF-8 fields; drop the rest.
pub fn parse_metrics(raw: impl AsRef<[u8]>) -> Vec<MetricEntry> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(raw.as_ref());

    reader
        .byte_records()
        .filter_map(|record| match record {
            Ok(record) => Some(record),
            Err(e) => {
                debug!(error = %e, "malformed metrics line skipped");
                None
            }
        })
        .filter(|record| record.len() >= 2)
        .filter_map(|record| {
            match (std::str::from_utf8(&record[0]), std::str::from_utf8(&record[1])) {
                (Ok(key), Ok(value)) => Some(MetricEntry {
                    key: key.to_string(),
                    value: value.to_string(),
                }),
                _ => {
                    debug!(line = ?record.position().map(|p| p.line()), "non-UTF-8 metrics line skipped");
                    None
                }
            }
        })
        .collect()
}

/// Decode the chart fully; anything that fails to decode is treated as absent.
pub fn load_chart(path: &Path) -> Option<ChartImage> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "no convergence chart");
            return None;
        }
    };
    let decoded = match image::load_from_memory_with_format(&bytes, ImageFormat::Png) {
        Ok(decoded) => decoded,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "convergence chart could not be decoded");
            return None;
        }
    };
    Some(ChartImage {
        path: path.to_path_buf(),
        width: decoded.width(),
        height: decoded.height(),
        bytes,
    })
}

/// Any JSON scalar as display text; null becomes empty.
pub(crate) fn display_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    })
}

/// Numbers or numeric strings; null becomes zero.
pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(0.0),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| D::Error::custom(format!("number {n} out of range"))),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("'{s}' is not a number"))),
        other => Err(D::Error::custom(format!("expected a number, got {other}"))),
    }
}
