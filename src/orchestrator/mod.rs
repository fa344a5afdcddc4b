//! Application-level orchestration.
//!
//! This module owns the scheduling session lifecycle and post-run exports.
//! CLI layers call into it and consume its events.

mod controller;
mod post_process;

pub(crate) use controller::{RunOptions, SessionController, SessionError};
pub(crate) use post_process::{process_run_completion, ExportTargets};
