//! The scheduling form as a JSON file.
//!
//! Fields hold raw text, exactly as a person would type it, so numbers and
//! strings are both accepted. Interpretation happens in the roster and the
//! request builder.

use crate::ingest::display_string;
use crate::model::OptimizationMode;
use crate::orchestrator::RunOptions;
use crate::request::GaForm;
use crate::roster::{Roster, RosterError};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FormDoctor {
    #[serde(deserialize_with = "display_string")]
    pub name: String,
    #[serde(deserialize_with = "display_string")]
    pub specialty: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FormPatient {
    #[serde(deserialize_with = "display_string")]
    pub name: String,
    #[serde(deserialize_with = "display_string")]
    pub disease: String,
    #[serde(deserialize_with = "display_string")]
    pub age: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulingForm {
    #[serde(deserialize_with = "display_string")]
    pub doctors: String,
    #[serde(deserialize_with = "display_string")]
    pub patients: String,
    #[serde(deserialize_with = "display_string")]
    pub beds: String,
    #[serde(deserialize_with = "display_string")]
    pub urgency: String,
    pub algorithm: OptimizationMode,
    pub doctor_entries: Vec<FormDoctor>,
    pub patient_entries: Vec<FormPatient>,
    pub ga: GaForm,
}

impl SchedulingForm {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read form {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("failed to parse form {}", path.display()))
    }

    /// Counts first (they reset the entries), then urgency, then each field.
    ///
    /// An empty count with entries present takes the number of entries.
    pub fn apply_to(&self, roster: &mut Roster) -> Result<(), RosterError> {
        roster.set_doctor_count(&count_text(&self.doctors, self.doctor_entries.len()));
        roster.set_patient_count(&count_text(&self.patients, self.patient_entries.len()));
        roster.set_urgency_text(&self.urgency);

        for (i, doctor) in self.doctor_entries.iter().enumerate() {
            roster.set_doctor_name(i, &doctor.name)?;
            roster.set_doctor_specialty(i, &doctor.specialty)?;
        }
        for (i, patient) in self.patient_entries.iter().enumerate() {
            roster.set_patient_name(i, &patient.name)?;
            roster.set_patient_disease(i, &patient.disease)?;
            roster.set_patient_age(i, &patient.age)?;
        }
        Ok(())
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            beds: self.beds.clone(),
            mode: self.algorithm,
            ga: self.ga.clone(),
        }
    }
}

fn count_text(text: &str, entries: usize) -> String {
    if text.trim().is_empty() && entries > 0 {
        entries.to_string()
    } else {
        text.to_string()
    }
}
