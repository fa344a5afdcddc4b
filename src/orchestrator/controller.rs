//! Scheduling session controller.
//!
//! Owns the roster and the last completed result, drives one run through
//! validate → build → invoke → ingest, and emits events for presentation layers.

use crate::engine::{ComputationPort, InvocationError};
use crate::ingest::{ingest, IngestionError};
use crate::model::{GaSettings, InfoEvent, OptimizationMode, SessionEvent, SessionPhase, SessionResult};
use crate::request::{build_request, GaForm};
use crate::roster::Roster;
use crate::validate::{validate_snapshot, ValidationReport};
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

/// Per-run inputs that live outside the roster.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub beds: String,
    pub mode: OptimizationMode,
    pub ga: GaForm,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("a scheduling run is already in progress")]
    Busy,
    #[error("{0}")]
    Validation(ValidationReport),
    #[error(transparent)]
    Invocation(#[from] InvocationError),
    /// The table failed but the other artifacts were read and published.
    #[error("{error}")]
    Ingestion {
        #[source]
        error: IngestionError,
        partial: Arc<SessionResult>,
    },
}

/// Disables the run trigger for its lifetime.
struct TriggerGuard {
    trigger: Arc<AtomicBool>,
    event_tx: UnboundedSender<SessionEvent>,
}

impl TriggerGuard {
    fn acquire(trigger: &Arc<AtomicBool>, event_tx: &UnboundedSender<SessionEvent>) -> Option<Self> {
        trigger
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        let _ = event_tx.send(SessionEvent::TriggerChanged { enabled: false });
        Some(Self {
            trigger: Arc::clone(trigger),
            event_tx: event_tx.clone(),
        })
    }
}

impl Drop for TriggerGuard {
    fn drop(&mut self) {
        self.trigger.store(true, Ordering::Release);
        let _ = self
            .event_tx
            .send(SessionEvent::TriggerChanged { enabled: true });
    }
}

pub struct SessionController {
    roster: Roster,
    port: Arc<dyn ComputationPort>,
    results_dir: PathBuf,
    phase: SessionPhase,
    last_result: Option<Arc<SessionResult>>,
    trigger: Arc<AtomicBool>,
    event_tx: UnboundedSender<SessionEvent>,
}

impl SessionController {
    pub fn new(
        port: Arc<dyn ComputationPort>,
        results_dir: PathBuf,
        event_tx: UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            roster: Roster::new(),
            port,
            results_dir,
            phase: SessionPhase::Idle,
            last_result: None,
            trigger: Arc::new(AtomicBool::new(true)),
            event_tx,
        }
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn roster_mut(&mut self) -> &mut Roster {
        &mut self.roster
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// The most recent ingested result, kept across runs.
    pub fn last_result(&self) -> Option<Arc<SessionResult>> {
        self.last_result.clone()
    }

    /// `true` while a run may be started.
    pub fn trigger_enabled(&self) -> bool {
        self.trigger.load(Ordering::Acquire)
    }

    /// Run one scheduling session. Always returns with the controller back in `Idle`.
    pub async fn run(&mut self, options: &RunOptions) -> Result<Arc<SessionResult>, SessionError> {
        let _guard = TriggerGuard::acquire(&self.trigger, &self.event_tx).ok_or(SessionError::Busy)?;

        let outcome = self.run_phases(options).await;
        match &outcome {
            Ok(result) => {
                self.transition(SessionPhase::Done);
                let _ = self.event_tx.send(SessionEvent::RunCompleted {
                    result: Arc::clone(result),
                });
            }
            Err(e) => {
                self.transition(SessionPhase::Failed);
                let _ = self.event_tx.send(SessionEvent::RunFailed {
                    message: format!("{e:#}"),
                });
            }
        }
        self.transition(SessionPhase::Idle);
        outcome
    }

    async fn run_phases(&mut self, options: &RunOptions) -> Result<Arc<SessionResult>, SessionError> {
        self.transition(SessionPhase::Validating);
        let snapshot = self.roster.snapshot();
        debug!(revision = snapshot.revision, "validating roster");
        let report = validate_snapshot(&snapshot);
        if !report.is_valid() {
            info!(errors = report.error_count(), "validation blocked submission");
            return Err(SessionError::Validation(report));
        }

        self.transition(SessionPhase::BuildingRequest);
        let request = build_request(&snapshot, &options.beds, options.mode, &options.ga);
        if let Some(GaSettings {
            population,
            generations,
            mutation_rate,
            seed,
        }) = &request.ga
        {
            debug!(population, generations, mutation_rate, ?seed, "ga settings");
        }
        self.info(InfoEvent::Message(format!(
            "Scheduling {} patients across {} doctors and {} beds",
            request.patients, request.doctors, request.beds
        )));

        self.transition(SessionPhase::Invoking);
        let port = Arc::clone(&self.port);
        let handle = tokio::spawn(async move { port.submit(request).await });
        let capture = handle
            .await
            .map_err(|e| InvocationError::Join(e.to_string()))??;
        self.info(InfoEvent::ComputationFinished {
            elapsed_ms: capture.elapsed.as_millis(),
            exit_code: capture.exit_code,
        });

        self.transition(SessionPhase::Ingesting);
        let dir = self.results_dir.clone();
        let report = match tokio::task::spawn_blocking(move || ingest(&dir)).await {
            Ok(report) => report,
            Err(e) => {
                return Err(SessionError::Ingestion {
                    error: IngestionError::Join(e.to_string()),
                    partial: Arc::new(SessionResult::default()),
                })
            }
        };

        // The new result replaces the previous one even when the table failed.
        let result = Arc::new(report.result);
        self.last_result = Some(Arc::clone(&result));
        info!(
            assignments = result.assignments.len(),
            metrics = result.metrics.len(),
            chart = result.chart.is_some(),
            "results ingested"
        );

        match report.table_error {
            Some(error) => {
                warn!(error = %error, "assignment table could not be loaded");
                self.info(InfoEvent::TableRejected {
                    reason: error.to_string(),
                });
                Err(SessionError::Ingestion {
                    error,
                    partial: result,
                })
            }
            None => Ok(result),
        }
    }

    fn transition(&mut self, phase: SessionPhase) {
        debug!(from = ?self.phase, to = ?phase, "session phase");
        self.phase = phase;
        let _ = self.event_tx.send(SessionEvent::PhaseChanged { phase });
    }

    fn info(&self, event: InfoEvent) {
        let _ = self.event_tx.send(SessionEvent::Info(event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{FakePort, FakeScript};
    use crate::ingest::{ASSIGNMENTS_FILE, METRICS_FILE};
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    const TABLE: &str = r#"[
        {"Patient": 1, "PatientName": "Ada", "Disease": "Fever", "Doctor": 1, "DoctorName": "Dr. Vo", "Specialty": "General", "SpecialtyMatch": "Perfect Match", "Urgency": 3, "FuzzyScore": 0.3, "Bed": 1},
        {"Patient": 2, "PatientName": "Ben", "Disease": "Stroke", "Doctor": 2, "DoctorName": "Dr. Ruiz", "Specialty": "Neurology", "SpecialtyMatch": "Perfect Match", "Urgency": 9, "FuzzyScore": 0.91234, "Bed": 2}
    ]"#;
    const METRICS: &str = "Metric,Value\nStatus,Success\nTotal Patients,2\n";

    fn controller(port: Arc<dyn ComputationPort>, dir: &std::path::Path) -> (SessionController, UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (SessionController::new(port, dir.to_path_buf(), tx), rx)
    }

    fn fill(roster: &mut Roster) {
        roster.set_doctor_count("2");
        roster.set_patient_count("2");
        roster.set_urgency_text("3,9");
        for (i, (name, specialty)) in [("Dr. Vo", "General"), ("Dr. Ruiz", "Neurology")].iter().enumerate() {
            roster.set_doctor_name(i, name).unwrap();
            roster.set_doctor_specialty(i, specialty).unwrap();
        }
        for (i, (name, disease, age)) in [("Ada", "Fever", "30"), ("Ben", "Stroke", "70")].iter().enumerate() {
            roster.set_patient_name(i, name).unwrap();
            roster.set_patient_disease(i, disease).unwrap();
            roster.set_patient_age(i, age).unwrap();
        }
    }

    fn drain(rx: &mut UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            events.push(ev);
        }
        events
    }

    fn phases(events: &[SessionEvent]) -> Vec<SessionPhase> {
        events
            .iter()
            .filter_map(|ev| match ev {
                SessionEvent::PhaseChanged { phase } => Some(*phase),
                _ => None,
            })
            .collect()
    }

    fn triggers(events: &[SessionEvent]) -> Vec<bool> {
        events
            .iter()
            .filter_map(|ev| match ev {
                SessionEvent::TriggerChanged { enabled } => Some(*enabled),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn successful_run_walks_every_phase() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakePort::succeeding(
            dir.path(),
            &[(ASSIGNMENTS_FILE, TABLE), (METRICS_FILE, METRICS)],
        ));
        let (mut ctl, mut rx) = controller(fake.clone(), dir.path());
        fill(ctl.roster_mut());

        let options = RunOptions {
            beds: "2".into(),
            mode: OptimizationMode::Ga,
            ga: GaForm {
                mutation: "6".into(),
                ..Default::default()
            },
        };
        let result = ctl.run(&options).await.unwrap();

        assert_eq!(result.assignments[0].patient_name, "Ben");
        assert_eq!(result.assignments[0].fuzzy_score, 0.912);
        assert_eq!(result.metrics.len(), 2);
        assert_eq!(ctl.phase(), SessionPhase::Idle);
        assert!(ctl.trigger_enabled());
        assert!(Arc::ptr_eq(&ctl.last_result().unwrap(), &result));

        let submitted = fake.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].urgency, vec![3, 9]);
        assert_eq!(submitted[0].beds, 2);
        assert_eq!(submitted[0].ga.as_ref().unwrap().mutation_rate, 0.06);

        let events = drain(&mut rx);
        assert_eq!(
            phases(&events),
            vec![
                SessionPhase::Validating,
                SessionPhase::BuildingRequest,
                SessionPhase::Invoking,
                SessionPhase::Ingesting,
                SessionPhase::Done,
                SessionPhase::Idle,
            ]
        );
        assert_eq!(triggers(&events), vec![false, true]);
        assert!(events
            .iter()
            .any(|ev| matches!(ev, SessionEvent::RunCompleted { .. })));
    }

    #[tokio::test]
    async fn validation_failure_never_reaches_the_port() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakePort::succeeding(dir.path(), &[(ASSIGNMENTS_FILE, TABLE)]));
        let (mut ctl, mut rx) = controller(fake.clone(), dir.path());
        fill(ctl.roster_mut());
        let first = ctl.run(&RunOptions::default()).await.unwrap();

        ctl.roster_mut().set_patient_name(1, "").unwrap();
        drain(&mut rx);
        let err = ctl.run(&RunOptions::default()).await.unwrap_err();

        match err {
            SessionError::Validation(report) => {
                assert_eq!(report.patient, vec!["Patient 2: Name is required"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(fake.submitted().len(), 1);
        assert!(Arc::ptr_eq(&ctl.last_result().unwrap(), &first));
        let events = drain(&mut rx);
        assert_eq!(
            phases(&events),
            vec![SessionPhase::Validating, SessionPhase::Failed, SessionPhase::Idle]
        );
        assert_eq!(triggers(&events), vec![false, true]);
    }

    #[tokio::test]
    async fn invocation_failure_keeps_previous_result() {
        let dir = tempfile::tempdir().unwrap();
        let good = Arc::new(FakePort::succeeding(dir.path(), &[(ASSIGNMENTS_FILE, TABLE)]));
        let (mut ctl, _rx) = controller(good, dir.path());
        fill(ctl.roster_mut());
        let first = ctl.run(&RunOptions::default()).await.unwrap();

        let failing: Arc<dyn ComputationPort> = Arc::new(FakePort::new(
            dir.path(),
            FakeScript::Fail {
                stderr: "ModuleNotFoundError: numpy".into(),
            },
        ));
        ctl.port = failing;
        let err = ctl.run(&RunOptions::default()).await.unwrap_err();
        assert!(
            matches!(err, SessionError::Invocation(InvocationError::Failed { ref detail, .. }) if detail.contains("numpy"))
        );
        assert!(Arc::ptr_eq(&ctl.last_result().unwrap(), &first));
        assert!(ctl.trigger_enabled());
        assert_eq!(ctl.phase(), SessionPhase::Idle);
    }

    #[tokio::test]
    async fn timeout_is_reported_as_invocation_error() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakePort::new(dir.path(), FakeScript::Timeout));
        let (mut ctl, _rx) = controller(fake, dir.path());
        fill(ctl.roster_mut());
        let err = ctl.run(&RunOptions::default()).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Invocation(InvocationError::Timeout { .. })
        ));
        assert!(ctl.last_result().is_none());
    }

    #[tokio::test]
    async fn malformed_table_still_publishes_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakePort::succeeding(
            dir.path(),
            &[(ASSIGNMENTS_FILE, "{\"broken\": "), (METRICS_FILE, METRICS)],
        ));
        let (mut ctl, _rx) = controller(fake, dir.path());
        fill(ctl.roster_mut());

        let err = ctl.run(&RunOptions::default()).await.unwrap_err();
        let partial = match err {
            SessionError::Ingestion { error, partial } => {
                assert!(matches!(error, IngestionError::Parse { .. }));
                partial
            }
            other => panic!("unexpected error: {other:?}"),
        };
        assert!(partial.assignments.is_empty());
        assert_eq!(partial.metrics[0].key, "Status");
        assert!(Arc::ptr_eq(&ctl.last_result().unwrap(), &partial));
        assert_eq!(ctl.phase(), SessionPhase::Idle);
    }

    #[tokio::test]
    async fn disabled_trigger_rejects_a_second_run() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakePort::succeeding(dir.path(), &[]));
        let (mut ctl, _rx) = controller(fake.clone(), dir.path());
        fill(ctl.roster_mut());

        ctl.trigger.store(false, Ordering::Release);
        let err = ctl.run(&RunOptions::default()).await.unwrap_err();
        assert!(matches!(err, SessionError::Busy));
        assert!(fake.submitted().is_empty());
        assert!(!ctl.trigger_enabled());
    }
}
