//! Symptom-based disease prediction through the external predictor script.
//!
//! Same protocol shape as scheduling: write a JSON request next to the
//! script, run it under the bounded runner, read a JSON object from stdout.

use crate::engine::{run_bounded, write_json_file, BoundedCommand, InvocationError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum PredictionError {
    #[error("please select at least one symptom")]
    NoSymptoms,
    #[error("unknown symptoms: {}", .0.join(", "))]
    UnknownSymptoms(Vec<String>),
    #[error("failed to read symptom catalog {}: {source}", path.display())]
    CatalogRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse symptom catalog {}: {source}", path.display())]
    CatalogParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Invocation(#[from] InvocationError),
    #[error("predictor output is not valid JSON: {0}")]
    Output(#[source] serde_json::Error),
    #[error("prediction failed: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, Serialize)]
struct PredictionInput<'a> {
    symptoms: &'a [String],
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OtherPrediction {
    #[serde(default)]
    pub disease: String,
    #[serde(default)]
    pub probability: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Prediction {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub top_disease: String,
    pub confidence: f64,
    pub specialist: String,
    pub department: String,
    pub description: String,
    pub precautions: Vec<String>,
    pub severity_score: f64,
    pub matched_symptoms: Vec<String>,
    pub total_symptoms_analyzed: usize,
    pub other_predictions: Vec<OtherPrediction>,
}

/// Sorted catalog, or `None` when the file does not exist.
pub fn load_symptom_catalog(path: &Path) -> Result<Option<Vec<String>>, PredictionError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "no symptom catalog");
            return Ok(None);
        }
        Err(source) => {
            return Err(PredictionError::CatalogRead {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let mut symptoms: Vec<String> =
        serde_json::from_str(&raw).map_err(|source| PredictionError::CatalogParse {
            path: path.to_path_buf(),
            source,
        })?;
    symptoms.sort();
    symptoms.dedup();
    Ok(Some(symptoms))
}

/// `chest_pain` → `Chest Pain`.
pub fn display_name(symptom: &str) -> String {
    symptom
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Accepts catalog keys or display names; returns catalog keys in input order.
pub fn check_selection(
    selected: &[String],
    catalog: Option<&[String]>,
) -> Result<Vec<String>, PredictionError> {
    let mut seen = HashSet::new();
    let symptoms: Vec<String> = selected
        .iter()
        .map(|s| normalize_symptom(s))
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.clone()))
        .collect();
    if symptoms.is_empty() {
        return Err(PredictionError::NoSymptoms);
    }
    if let Some(catalog) = catalog {
        let unknown: Vec<String> = symptoms
            .iter()
            .filter(|s| !catalog.contains(s))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(PredictionError::UnknownSymptoms(unknown));
        }
    }
    Ok(symptoms)
}

fn normalize_symptom(symptom: &str) -> String {
    symptom
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}

pub struct DiseasePredictor {
    input_path: PathBuf,
    command: BoundedCommand,
}

impl DiseasePredictor {
    pub fn new(input_path: PathBuf, command: BoundedCommand) -> Self {
        Self {
            input_path,
            command,
        }
    }

    pub async fn predict(&self, symptoms: &[String]) -> Result<Prediction, PredictionError> {
        write_json_file(&self.input_path, &PredictionInput { symptoms }).await?;
        info!(count = symptoms.len(), "prediction requested");

        let capture = run_bounded(&self.command).await?;
        debug!(elapsed_ms = capture.elapsed.as_millis() as u64, exit_code = ?capture.exit_code, "predictor exited");

        if !capture.exit_success {
            // The predictor still prints a JSON error object before exiting non-zero.
            if let Ok(p) = parse_prediction(&capture.stdout) {
                if let Some(error) = p.error.filter(|e| !e.trim().is_empty()) {
                    return Err(PredictionError::Rejected(error));
                }
            }
            return Err(InvocationError::Failed {
                status: capture.status_label(),
                detail: capture.failure_detail(),
            }
            .into());
        }

        let prediction = parse_prediction(&capture.stdout).map_err(PredictionError::Output)?;
        if !prediction.success {
            let error = prediction
                .error
                .unwrap_or_else(|| "Unknown error".to_string());
            return Err(PredictionError::Rejected(error));
        }
        Ok(prediction)
    }
}

/// The whole of stdout, or failing that its last non-empty line.
pub fn parse_prediction(stdout: &str) -> Result<Prediction, serde_json::Error> {
    match serde_json::from_str(stdout.trim()) {
        Ok(p) => Ok(p),
        Err(e) => match stdout.lines().rev().find(|l| !l.trim().is_empty()) {
            Some(last) => serde_json::from_str(last.trim()),
            None => Err(e),
        },
    }
}

pub fn render_prediction(p: &Prediction) -> Vec<String> {
    let mut lines = vec![
        format!("Top: {}", p.top_disease),
        format!("Confidence: {:.1}%", p.confidence),
        format!("Specialist: {}", p.specialist),
        format!("Department: {}", p.department),
    ];
    if !p.description.trim().is_empty() {
        lines.push(format!("Description: {}", p.description.trim()));
    }
    if p.severity_score > 0.0 {
        lines.push(format!("Severity: {}", p.severity_score));
    }
    if !p.matched_symptoms.is_empty() {
        let names: Vec<String> = p.matched_symptoms.iter().map(|s| display_name(s)).collect();
        lines.push(format!("Matched symptoms: {}", names.join(", ")));
    }
    if !p.precautions.is_empty() {
        lines.push("Precautions:".to_string());
        lines.extend(p.precautions.iter().map(|s| format!("  - {s}")));
    }
    if !p.other_predictions.is_empty() {
        lines.push("Other possibilities:".to_string());
        lines.extend(
            p.other_predictions
                .iter()
                .map(|o| format!("  {} ({}%)", o.disease, o.probability)),
        );
    }
    lines
}
