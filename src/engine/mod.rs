//! The external optimizer, seen as a port.
//!
//! `ProcessPort` shells out to the configured interpreter; tests use
//! `FakePort`, which never starts a process.

#[cfg(test)]
mod fake;
mod process;

#[cfg(test)]
pub use fake::{FakePort, FakeScript};
pub use process::{
    run_bounded, write_json_file, BoundedCommand, ProcessCapture, ProcessPort,
    DEFAULT_TIMEOUT, SUCCESS_MARKER,
};

use crate::model::SchedulingRequest;
use futures::future::BoxFuture;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum InvocationError {
    #[error("failed to serialize request: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write request file {}: {source}", path.display())]
    RequestWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed waiting for `{program}`: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("external computation did not finish within {}", humantime::format_duration(*after))]
    Timeout { after: Duration },
    #[error("external computation failed ({status}): {detail}")]
    Failed { status: String, detail: String },
    #[error("invocation task failed: {0}")]
    Join(String),
}

/// Submit a request to the optimizer and wait for its bounded completion.
pub trait ComputationPort: Send + Sync {
    fn submit(
        &self,
        request: SchedulingRequest,
    ) -> BoxFuture<'_, Result<ProcessCapture, InvocationError>>;
}
