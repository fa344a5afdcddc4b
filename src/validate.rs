//! Pre-submission checks over the roster.

use crate::model::{DoctorEntry, PatientEntry};
use crate::roster::RosterSnapshot;
use serde::Serialize;
use std::fmt;

/// Field-level errors grouped by entity kind, in roster order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub doctor: Vec<String>,
    pub patient: Vec<String>,
    pub urgency: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.doctor.is_empty() && self.patient.is_empty() && self.urgency.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.doctor.len() + self.patient.len() + self.urgency.len()
    }

    /// Grouped, human-readable block for display.
    pub fn to_message(&self) -> String {
        let mut sections = Vec::new();
        for (title, errors) in [
            ("Doctor Errors:", &self.doctor),
            ("Patient Errors:", &self.patient),
            ("Urgency Errors:", &self.urgency),
        ] {
            if !errors.is_empty() {
                sections.push(format!("{title}\n{}", errors.join("\n")));
            }
        }
        format!(
            "Please fix the following errors:\n\n{}",
            sections.join("\n\n")
        )
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_message())
    }
}

pub fn validate_snapshot(snapshot: &RosterSnapshot) -> ValidationReport {
    validate(&snapshot.doctors, &snapshot.patients, &snapshot.urgency_text)
}

pub fn validate(
    doctors: &[DoctorEntry],
    patients: &[PatientEntry],
    urgency_text: &str,
) -> ValidationReport {
    let mut report = ValidationReport::default();

    for (i, doctor) in doctors.iter().enumerate() {
        let n = i + 1;
        if doctor.name.trim().is_empty() {
            report.doctor.push(format!("Doctor {n}: Name is required"));
        }
        if doctor.specialty.trim().is_empty() {
            report
                .doctor
                .push(format!("Doctor {n}: Specialty must be selected"));
        }
    }

    for (i, patient) in patients.iter().enumerate() {
        let n = i + 1;
        if patient.name.trim().is_empty() {
            report.patient.push(format!("Patient {n}: Name is required"));
        }
        if patient.disease.trim().is_empty() {
            report
                .patient
                .push(format!("Patient {n}: Disease/Condition must be selected"));
        }
        let age = patient.age.trim();
        if age.is_empty() {
            report.patient.push(format!("Patient {n}: Age is required"));
        } else if !matches!(age.parse::<i64>(), Ok(a) if (1..=120).contains(&a)) {
            report.patient.push(format!(
                "Patient {n}: Age must be a valid number between 1 and 120"
            ));
        }
    }

    // Reported by position even when reconciliation would drop the token.
    if !urgency_text.is_empty() {
        for (i, token) in urgency_text.split(',').enumerate() {
            let token = token.trim();
            if !matches!(token.parse::<i64>(), Ok(u) if (1..=10).contains(&u)) {
                report.urgency.push(format!(
                    "Urgency value #{}: '{token}' must be a number between 1-10",
                    i + 1
                ));
            }
        }
    }

    report
}
