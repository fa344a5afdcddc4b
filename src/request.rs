//! Build the optimizer request from a roster snapshot.
//!
//! Everything here is total: malformed numeric text falls back to a default
//! instead of failing, since the validator has already run.

use crate::model::{
    DoctorDetail, GaSettings, OptimizationMode, PatientDetail, SchedulingRequest,
};
use crate::roster::RosterSnapshot;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BEDS: u32 = 4;
pub const DEFAULT_MUTATION_RATE: f64 = 0.06;
const FALLBACK_SPECIALTY: &str = "General";
const FALLBACK_DISEASE: &str = "Fever";
const FALLBACK_AGE: i64 = 30;

/// Raw GA tuning text as entered; parsed only when GA mode is selected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaForm {
    #[serde(deserialize_with = "crate::ingest::display_string")]
    pub population: String,
    #[serde(deserialize_with = "crate::ingest::display_string")]
    pub generations: String,
    #[serde(deserialize_with = "crate::ingest::display_string")]
    pub mutation: String,
    #[serde(deserialize_with = "crate::ingest::display_string")]
    pub seed: String,
}

pub fn build_request(
    snapshot: &RosterSnapshot,
    beds_text: &str,
    mode: OptimizationMode,
    ga: &GaForm,
) -> SchedulingRequest {
    let doctor_details = snapshot
        .doctors
        .iter()
        .map(|d| DoctorDetail {
            name: d.name.clone(),
            specialty: or_fallback(&d.specialty, FALLBACK_SPECIALTY),
        })
        .collect();

    let patient_details = snapshot
        .patients
        .iter()
        .zip(&snapshot.urgency)
        .map(|(p, urgency)| PatientDetail {
            name: p.name.clone(),
            disease: or_fallback(&p.disease, FALLBACK_DISEASE),
            age: p.age.trim().parse().unwrap_or(FALLBACK_AGE),
            urgency: *urgency,
        })
        .collect();

    let use_ga = mode == OptimizationMode::Ga;
    SchedulingRequest {
        doctors: snapshot.doctors.len(),
        patients: snapshot.patients.len(),
        beds: parse_beds(beds_text),
        urgency: snapshot.urgency.clone(),
        doctor_details,
        patient_details,
        use_ga,
        ga: use_ga.then(|| build_ga_settings(ga)),
    }
}

pub fn build_ga_settings(form: &GaForm) -> GaSettings {
    let defaults = GaSettings::default();
    GaSettings {
        population: form.population.trim().parse().unwrap_or(defaults.population),
        generations: form
            .generations
            .trim()
            .parse()
            .unwrap_or(defaults.generations),
        mutation_rate: normalize_mutation_rate(&form.mutation),
        seed: parse_seed(&form.seed),
    }
}

/// Accept either a fraction (`0.06`) or a percentage (`6`). Values above 1
/// are divided by 100 and capped at 1; negatives and junk use the default.
pub fn normalize_mutation_rate(text: &str) -> f64 {
    match text.trim().parse::<f64>() {
        Ok(v) if !v.is_finite() => DEFAULT_MUTATION_RATE,
        Ok(v) if v > 1.0 => (v / 100.0).min(1.0),
        Ok(v) if v < 0.0 => DEFAULT_MUTATION_RATE,
        Ok(v) => v,
        Err(_) => DEFAULT_MUTATION_RATE,
    }
}

/// `None` for empty or non-integer text.
pub fn parse_seed(text: &str) -> Option<i64> {
    text.trim().parse().ok()
}

pub fn parse_beds(text: &str) -> u32 {
    match text.trim().parse::<u32>() {
        Ok(n) if n > 0 => n,
        _ => DEFAULT_BEDS,
    }
}

fn or_fallback(value: &str, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::Roster;

    fn filled_snapshot() -> RosterSnapshot {
        let mut roster = Roster::new();
        roster.set_doctor_count("2");
        roster.set_patient_count("3");
        roster.set_urgency_text("9,4");
        roster.set_doctor_name(0, "Dr. Kim").unwrap();
        roster.set_doctor_specialty(0, "Pediatrics").unwrap();
        roster.set_doctor_name(1, "Dr. Batista").unwrap();
        roster.set_doctor_specialty(1, "Emergency").unwrap();
        for (i, (name, disease, age)) in [
            ("Ivo", "Fever", "8"),
            ("Noor", "Fracture", "41"),
            ("Jon", "Stroke", "77"),
        ]
        .iter()
        .enumerate()
        {
            roster.set_patient_name(i, name).unwrap();
            roster.set_patient_disease(i, disease).unwrap();
            roster.set_patient_age(i, age).unwrap();
        }
        roster.snapshot()
    }

    #[test]
    fn mutation_rate_normalization() {
        assert_eq!(normalize_mutation_rate("6"), 0.06);
        assert_eq!(normalize_mutation_rate("0.5"), 0.5);
        assert_eq!(normalize_mutation_rate("150"), 1.0);
        assert_eq!(normalize_mutation_rate("-3"), 0.06);
        assert_eq!(normalize_mutation_rate("lots"), 0.06);
        assert_eq!(normalize_mutation_rate(""), 0.06);
        assert_eq!(normalize_mutation_rate("1"), 1.0);
        assert_eq!(normalize_mutation_rate("0"), 0.0);
        assert_eq!(normalize_mutation_rate(" 0.25 "), 0.25);
    }

    #[test]
    fn mutation_rate_uses_dot_decimal_only() {
        assert_eq!(normalize_mutation_rate("0,5"), 0.06);
        assert_eq!(normalize_mutation_rate("NaN"), 0.06);
        assert_eq!(normalize_mutation_rate("inf"), 0.06);
    }

    #[test]
    fn ga_counts_default_on_parse_failure() {
        let settings = build_ga_settings(&GaForm {
            population: "many".into(),
            generations: " 200 ".into(),
            mutation: "12".into(),
            seed: "".into(),
        });
        assert_eq!(settings.population, 80);
        assert_eq!(settings.generations, 200);
        assert_eq!(settings.mutation_rate, 0.12);
        assert_eq!(settings.seed, None);
    }

    #[test]
    fn invalid_seed_is_omitted() {
        assert_eq!(parse_seed("17"), Some(17));
        assert_eq!(parse_seed("-3"), Some(-3));
        assert_eq!(parse_seed("seventeen"), None);
        assert_eq!(parse_seed("1.5"), None);
    }

    #[test]
    fn heuristic_mode_has_no_ga_settings() {
        let req = build_request(
            &filled_snapshot(),
            "5",
            OptimizationMode::Heuristic,
            &GaForm {
                population: "10".into(),
                ..Default::default()
            },
        );
        assert!(!req.use_ga);
        assert!(req.ga.is_none());
        assert_eq!(req.beds, 5);
    }

    #[test]
    fn request_mirrors_reconciled_snapshot() {
        let req = build_request(&filled_snapshot(), "x", OptimizationMode::Ga, &GaForm::default());
        assert_eq!(req.doctors, 2);
        assert_eq!(req.patients, 3);
        assert_eq!(req.beds, DEFAULT_BEDS);
        assert_eq!(req.urgency, vec![9, 4, 5]);
        assert_eq!(req.doctor_details[1].specialty, "Emergency");
        assert_eq!(req.patient_details[2].age, 77);
        assert_eq!(req.patient_details[2].urgency, 5);
        assert_eq!(req.ga, Some(GaSettings::default()));
    }

    #[test]
    fn missing_fields_fall_back() {
        let snapshot = Roster::new().snapshot();
        let req = build_request(&snapshot, "0", OptimizationMode::Heuristic, &GaForm::default());
        assert_eq!(req.beds, DEFAULT_BEDS);
        assert!(req.doctor_details.iter().all(|d| d.specialty == "General"));
        assert!(req
            .patient_details
            .iter()
            .all(|p| p.disease == "Fever" && p.age == 30));
    }

    #[test]
    fn builder_is_deterministic() {
        let snapshot = filled_snapshot();
        let ga = GaForm {
            mutation: "6".into(),
            seed: "99".into(),
            ..Default::default()
        };
        let a = build_request(&snapshot, "3", OptimizationMode::Ga, &ga);
        let b = build_request(&snapshot, "3", OptimizationMode::Ga, &ga);
        assert_eq!(a, b);
        assert_eq!(a.ga.unwrap().seed, Some(99));
    }
}
