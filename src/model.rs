use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Specialties a doctor can be assigned.
pub const SPECIALTIES: [&str; 6] = [
    "Cardiology",
    "Neurology",
    "Orthopedics",
    "Pediatrics",
    "General",
    "Emergency",
];

/// Conditions a patient can be admitted with.
pub const DISEASES: [&str; 10] = [
    "Heart Attack",
    "Stroke",
    "Fracture",
    "Fever",
    "Migraine",
    "Broken Arm",
    "Appendicitis",
    "Pneumonia",
    "Diabetes",
    "Hypertension",
];

pub const DEFAULT_URGENCY: u8 = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorEntry {
    pub name: String,
    /// Empty until a specialty is selected.
    pub specialty: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientEntry {
    pub name: String,
    pub disease: String,
    /// Raw entered text; checked by the validator, parsed by the request builder.
    pub age: String,
    pub urgency: u8,
}

impl Default for PatientEntry {
    fn default() -> Self {
        Self {
            name: String::new(),
            disease: String::new(),
            age: String::new(),
            urgency: DEFAULT_URGENCY,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationMode {
    /// Deterministic specialty-matching assignment
    #[default]
    Heuristic,
    /// Genetic-algorithm search
    Ga,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaSettings {
    #[serde(rename = "GAPopulation")]
    pub population: u32,
    #[serde(rename = "GAGenerations")]
    pub generations: u32,
    #[serde(rename = "GAMutation")]
    pub mutation_rate: f64,
    #[serde(rename = "GASeed", default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
}

impl Default for GaSettings {
    fn default() -> Self {
        Self {
            population: 80,
            generations: 120,
            mutation_rate: 0.06,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DoctorDetail {
    pub name: String,
    pub specialty: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PatientDetail {
    pub name: String,
    pub disease: String,
    pub age: i64,
    pub urgency: u8,
}

/// The request file handed to the optimizer. Built once per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SchedulingRequest {
    pub doctors: usize,
    pub patients: usize,
    pub beds: u32,
    pub urgency: Vec<u8>,
    pub doctor_details: Vec<DoctorDetail>,
    pub patient_details: Vec<PatientDetail>,
    #[serde(rename = "UseGA")]
    pub use_ga: bool,
    // GA keys only appear in the file when GA mode is selected.
    #[serde(flatten)]
    pub ga: Option<GaSettings>,
}

/// One row of the optimizer's assignment table.
///
/// Input keys follow the optimizer's `output.json`; ids are kept as display
/// strings because the optimizer writes either a number or `"-"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleAssignment {
    #[serde(
        rename(deserialize = "Patient"),
        default = "zero_id",
        deserialize_with = "crate::ingest::display_string"
    )]
    pub patient_id: String,
    #[serde(
        rename(deserialize = "PatientName"),
        default,
        deserialize_with = "crate::ingest::display_string"
    )]
    pub patient_name: String,
    #[serde(
        rename(deserialize = "Disease"),
        default,
        deserialize_with = "crate::ingest::display_string"
    )]
    pub disease: String,
    #[serde(
        rename(deserialize = "Doctor"),
        default = "zero_id",
        deserialize_with = "crate::ingest::display_string"
    )]
    pub doctor_id: String,
    #[serde(
        rename(deserialize = "DoctorName"),
        default,
        deserialize_with = "crate::ingest::display_string"
    )]
    pub doctor_name: String,
    #[serde(
        rename(deserialize = "Specialty"),
        default,
        deserialize_with = "crate::ingest::display_string"
    )]
    pub specialty: String,
    #[serde(
        rename(deserialize = "SpecialtyMatch"),
        default,
        deserialize_with = "crate::ingest::display_string"
    )]
    pub specialty_match: String,
    #[serde(
        rename(deserialize = "Urgency"),
        default,
        deserialize_with = "crate::ingest::lenient_f64"
    )]
    pub urgency: f64,
    #[serde(
        rename(deserialize = "FuzzyScore"),
        default,
        deserialize_with = "crate::ingest::lenient_f64"
    )]
    pub fuzzy_score: f64,
    #[serde(
        rename(deserialize = "Bed"),
        default = "zero_id",
        deserialize_with = "crate::ingest::display_string"
    )]
    pub bed_id: String,
}

fn zero_id() -> String {
    "0".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricEntry {
    pub key: String,
    pub value: String,
}

/// A decoded convergence chart. Only the PNG header is inspected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartImage {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionResult {
    pub completed_at: String,
    pub assignments: Vec<ScheduleAssignment>,
    pub metrics: Vec<MetricEntry>,
    pub chart: Option<ChartImage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    Idle,
    Validating,
    BuildingRequest,
    Invoking,
    Ingesting,
    Done,
    Failed,
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    PhaseChanged {
        phase: SessionPhase,
    },
    /// The run trigger was disabled (run started) or re-enabled (run ended).
    TriggerChanged {
        enabled: bool,
    },
    Info(InfoEvent),
    RunCompleted {
        result: Arc<SessionResult>,
    },
    RunFailed {
        message: String,
    },
}

/// Structured info events emitted by the session and consumed by the CLI.
#[derive(Debug, Clone)]
pub enum InfoEvent {
    Message(String),
    ComputationFinished { elapsed_ms: u128, exit_code: Option<i32> },
    TableRejected { reason: String },
}

impl InfoEvent {
    /// Render a human-readable message for the CLI.
    pub fn to_message(&self) -> String {
        match self {
            InfoEvent::Message(msg) => msg.clone(),
            InfoEvent::ComputationFinished {
                elapsed_ms,
                exit_code,
            } => match exit_code {
                Some(code) => format!("Optimizer finished in {elapsed_ms} ms (exit code {code})"),
                None => format!("Optimizer finished in {elapsed_ms} ms"),
            },
            InfoEvent::TableRejected { reason } => format!("Error loading schedule: {reason}"),
        }
    }
}

/// Current UTC time as RFC 3339.
pub fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "now".into())
}
