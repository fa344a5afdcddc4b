use super::{ComputationPort, InvocationError, ProcessCapture};
use crate::model::SchedulingRequest;
use futures::future::BoxFuture;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

/// What the fake optimizer does when a request arrives.
#[derive(Debug, Clone)]
pub enum FakeScript {
    /// Write the given artifacts (file name, contents) and report success.
    Succeed { artifacts: Vec<(String, Vec<u8>)> },
    /// Exit non-zero with the given stderr.
    Fail { stderr: String },
    Timeout,
}

/// In-memory optimizer used by controller tests.
pub struct FakePort {
    results_dir: PathBuf,
    script: FakeScript,
    submitted: Mutex<Vec<SchedulingRequest>>,
}

impl FakePort {
    pub fn new(results_dir: impl Into<PathBuf>, script: FakeScript) -> Self {
        Self {
            results_dir: results_dir.into(),
            script,
            submitted: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding(results_dir: impl Into<PathBuf>, artifacts: &[(&str, &str)]) -> Self {
        let artifacts = artifacts
            .iter()
            .map(|(name, body)| (name.to_string(), body.as_bytes().to_vec()))
            .collect();
        Self::new(results_dir, FakeScript::Succeed { artifacts })
    }

    pub fn submitted(&self) -> Vec<SchedulingRequest> {
        self.submitted
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    fn respond(&self) -> Result<ProcessCapture, InvocationError> {
        match &self.script {
            FakeScript::Succeed { artifacts } => {
                std::fs::create_dir_all(&self.results_dir).map_err(|source| {
                    InvocationError::RequestWrite {
                        path: self.results_dir.clone(),
                        source,
                    }
                })?;
                for (name, body) in artifacts {
                    let path = self.results_dir.join(name);
                    std::fs::write(&path, body)
                        .map_err(|source| InvocationError::RequestWrite { path, source })?;
                }
                Ok(ProcessCapture {
                    stdout: "SUCCESS - ALL FILES SAVED!\n".into(),
                    exit_code: Some(0),
                    exit_success: true,
                    ..Default::default()
                })
            }
            FakeScript::Fail { stderr } => Err(InvocationError::Failed {
                status: "exit code 1".into(),
                detail: stderr.clone(),
            }),
            FakeScript::Timeout => Err(InvocationError::Timeout {
                after: Duration::from_secs(60),
            }),
        }
    }
}

impl ComputationPort for FakePort {
    fn submit(
        &self,
        request: SchedulingRequest,
    ) -> BoxFuture<'_, Result<ProcessCapture, InvocationError>> {
        Box::pin(async move {
            if let Ok(mut submitted) = self.submitted.lock() {
                submitted.push(request);
            }
            self.respond()
        })
    }
}
