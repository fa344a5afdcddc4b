//! Doctor/patient rosters and the reconciled urgency list.
//!
//! The roster is the session's only mutable form state. Count changes
//! rematerialize the entries; urgency text is parsed leniently and then
//! padded or truncated to the patient count.

use crate::model::{DoctorEntry, PatientEntry, DEFAULT_URGENCY, DISEASES, SPECIALTIES};

pub const DEFAULT_DOCTOR_COUNT: usize = 3;
pub const DEFAULT_PATIENT_COUNT: usize = 6;
/// Largest count accepted from text; anything above falls back to the default.
pub const MAX_ROSTER_COUNT: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RosterError {
    #[error("doctor {index} does not exist (roster has {len})")]
    DoctorIndex { index: usize, len: usize },
    #[error("patient {index} does not exist (roster has {len})")]
    PatientIndex { index: usize, len: usize },
    #[error("unknown specialty '{0}'")]
    UnknownSpecialty(String),
    #[error("unknown disease '{0}'")]
    UnknownDisease(String),
}

/// Immutable copy of the roster handed to the validator and request builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterSnapshot {
    pub revision: u64,
    pub doctors: Vec<DoctorEntry>,
    pub patients: Vec<PatientEntry>,
    /// Reconciled list; always as long as `patients`.
    pub urgency: Vec<u8>,
    /// Raw text as entered, kept for validation.
    pub urgency_text: String,
}

#[derive(Debug, Clone)]
pub struct Roster {
    revision: u64,
    doctors: Vec<DoctorEntry>,
    patients: Vec<PatientEntry>,
    urgency_text: String,
    urgency: Vec<u8>,
}

impl Default for Roster {
    fn default() -> Self {
        Self::new()
    }
}

impl Roster {
    pub fn new() -> Self {
        let mut roster = Self {
            revision: 0,
            doctors: vec![DoctorEntry::default(); DEFAULT_DOCTOR_COUNT],
            patients: vec![PatientEntry::default(); DEFAULT_PATIENT_COUNT],
            urgency_text: String::new(),
            urgency: Vec::new(),
        };
        roster.reconcile();
        roster
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn doctors(&self) -> &[DoctorEntry] {
        &self.doctors
    }

    pub fn patients(&self) -> &[PatientEntry] {
        &self.patients
    }

    pub fn urgency(&self) -> &[u8] {
        &self.urgency
    }

    /// Replace all doctors with `text` empty entries (default 3).
    pub fn set_doctor_count(&mut self, text: &str) {
        let n = parse_count(text, DEFAULT_DOCTOR_COUNT);
        self.doctors = vec![DoctorEntry::default(); n];
        self.bump();
    }

    /// Replace all patients with `text` empty entries (default 6) and reconcile urgency.
    pub fn set_patient_count(&mut self, text: &str) {
        let n = parse_count(text, DEFAULT_PATIENT_COUNT);
        self.patients = vec![PatientEntry::default(); n];
        self.reconcile();
        self.bump();
    }

    /// Store the raw urgency text and reconcile. Bad tokens are dropped here;
    /// the validator reports them separately.
    pub fn set_urgency_text(&mut self, text: &str) {
        self.urgency_text = text.to_string();
        self.reconcile();
        self.bump();
    }

    pub fn set_doctor_name(&mut self, index: usize, name: &str) -> Result<(), RosterError> {
        self.doctor_mut(index)?.name = name.to_string();
        self.bump();
        Ok(())
    }

    /// Select a specialty from the catalog (case-insensitive). Empty clears it.
    pub fn set_doctor_specialty(&mut self, index: usize, specialty: &str) -> Result<(), RosterError> {
        let canonical = if specialty.trim().is_empty() {
            String::new()
        } else {
            catalog_match(&SPECIALTIES, specialty)
                .ok_or_else(|| RosterError::UnknownSpecialty(specialty.to_string()))?
                .to_string()
        };
        self.doctor_mut(index)?.specialty = canonical;
        self.bump();
        Ok(())
    }

    pub fn set_patient_name(&mut self, index: usize, name: &str) -> Result<(), RosterError> {
        self.patient_mut(index)?.name = name.to_string();
        self.bump();
        Ok(())
    }

    /// Select a disease from the catalog (case-insensitive). Empty clears it.
    pub fn set_patient_disease(&mut self, index: usize, disease: &str) -> Result<(), RosterError> {
        let canonical = if disease.trim().is_empty() {
            String::new()
        } else {
            catalog_match(&DISEASES, disease)
                .ok_or_else(|| RosterError::UnknownDisease(disease.to_string()))?
                .to_string()
        };
        self.patient_mut(index)?.disease = canonical;
        self.bump();
        Ok(())
    }

    pub fn set_patient_age(&mut self, index: usize, age: &str) -> Result<(), RosterError> {
        self.patient_mut(index)?.age = age.to_string();
        self.bump();
        Ok(())
    }

    pub fn snapshot(&self) -> RosterSnapshot {
        RosterSnapshot {
            revision: self.revision,
            doctors: self.doctors.clone(),
            patients: self.patients.clone(),
            urgency: self.urgency.clone(),
            urgency_text: self.urgency_text.clone(),
        }
    }

    fn doctor_mut(&mut self, index: usize) -> Result<&mut DoctorEntry, RosterError> {
        let len = self.doctors.len();
        self.doctors
            .get_mut(index)
            .ok_or(RosterError::DoctorIndex { index, len })
    }

    fn patient_mut(&mut self, index: usize) -> Result<&mut PatientEntry, RosterError> {
        let len = self.patients.len();
        self.patients
            .get_mut(index)
            .ok_or(RosterError::PatientIndex { index, len })
    }

    fn reconcile(&mut self) {
        let parsed = parse_urgency_tokens(&self.urgency_text);
        self.urgency = reconcile_urgency(&parsed, self.patients.len());
        for (patient, urgency) in self.patients.iter_mut().zip(&self.urgency) {
            patient.urgency = *urgency;
        }
    }

    fn bump(&mut self) {
        self.revision += 1;
    }
}

/// Parse a user-entered count; non-positive, oversized or unparseable text is `default`.
pub fn parse_count(text: &str, default: usize) -> usize {
    match text.trim().parse::<usize>() {
        Ok(n) if (1..=MAX_ROSTER_COUNT).contains(&n) => n,
        _ => default,
    }
}

/// Keep the comma-separated tokens that are integers in 1..=10, in order.
pub fn parse_urgency_tokens(text: &str) -> Vec<u8> {
    text.split(',')
        .filter_map(|token| token.trim().parse::<i64>().ok())
        .filter(|u| (1..=10).contains(u))
        .map(|u| u as u8)
        .collect()
}

/// Pad with the default urgency or truncate so the list has exactly `count` values.
pub fn reconcile_urgency(parsed: &[u8], count: usize) -> Vec<u8> {
    parsed
        .iter()
        .copied()
        .chain(std::iter::repeat(DEFAULT_URGENCY))
        .take(count)
        .collect()
}

fn catalog_match(catalog: &[&'static str], value: &str) -> Option<&'static str> {
    let value = value.trim();
    catalog
        .iter()
        .copied()
        .find(|entry| entry.eq_ignore_ascii_case(value))
}
