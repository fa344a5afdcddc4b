use super::{ComputationPort, InvocationError};
use crate::model::SchedulingRequest;
use futures::future::BoxFuture;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Literal the optimizer prints on stdout when all result files were written.
pub const SUCCESS_MARKER: &str = "SUCCESS";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// A program invocation with a wall-clock ceiling.
#[derive(Debug, Clone)]
pub struct BoundedCommand {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
    pub timeout: Duration,
}

impl BoundedCommand {
    /// `<interpreter> <script>`, run from the script's directory.
    pub fn script(interpreter: &str, script: &Path, timeout: Duration) -> Self {
        Self {
            program: interpreter.to_string(),
            args: vec![script.to_string_lossy().into_owned()],
            current_dir: script.parent().map(Path::to_path_buf),
            timeout,
        }
    }
}

/// Everything observed from a process that exited within its ceiling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessCapture {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub exit_success: bool,
    pub elapsed: Duration,
}

impl ProcessCapture {
    pub fn status_label(&self) -> String {
        match self.exit_code {
            Some(code) => format!("exit code {code}"),
            None => "terminated by signal".to_string(),
        }
    }

    /// Failure detail, preferring stderr.
    pub fn failure_detail(&self) -> String {
        [&self.stderr, &self.stdout]
            .into_iter()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .unwrap_or("no output")
            .to_string()
    }
}

/// A finished run counts as success if stdout carries the marker or the exit
/// status is success.
pub fn judge(capture: ProcessCapture, marker: &str) -> Result<ProcessCapture, InvocationError> {
    if capture.stdout.contains(marker) || capture.exit_success {
        Ok(capture)
    } else {
        Err(InvocationError::Failed {
            status: capture.status_label(),
            detail: capture.failure_detail(),
        })
    }
}

/// Run `cmd`, draining stdout and stderr while waiting for exit.
///
/// On timeout the child is left running; only the wait is abandoned.
pub async fn run_bounded(cmd: &BoundedCommand) -> Result<ProcessCapture, InvocationError> {
    let start = Instant::now();
    let mut command = Command::new(&cmd.program);
    command
        .args(&cmd.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = &cmd.current_dir {
        command.current_dir(dir);
    }

    let mut child = command.spawn().map_err(|source| InvocationError::Spawn {
        program: cmd.program.clone(),
        source,
    })?;
    debug!(program = %cmd.program, args = ?cmd.args, "process started");

    // Readers must run concurrently with wait(); a full pipe would stall the child.
    let stdout_task = spawn_drain(child.stdout.take());
    let stderr_task = spawn_drain(child.stderr.take());

    let status = match tokio::time::timeout(cmd.timeout, child.wait()).await {
        Ok(Ok(status)) => status,
        Ok(Err(source)) => {
            return Err(InvocationError::Wait {
                program: cmd.program.clone(),
                source,
            })
        }
        Err(_) => {
            warn!(program = %cmd.program, timeout = ?cmd.timeout, "process exceeded time ceiling");
            return Err(InvocationError::Timeout { after: cmd.timeout });
        }
    };

    let grace = cmd.timeout.saturating_sub(start.elapsed());
    let stdout = collect_drain(stdout_task, grace).await;
    let stderr = collect_drain(stderr_task, grace).await;

    Ok(ProcessCapture {
        stdout,
        stderr,
        exit_code: status.code(),
        exit_success: status.success(),
        elapsed: start.elapsed(),
    })
}

fn spawn_drain<R>(pipe: Option<R>) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            if let Err(e) = pipe.read_to_end(&mut buf).await {
                debug!(error = %e, "pipe read ended early");
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

// A grandchild can keep the pipe open after the child exits; don't wait past the ceiling.
async fn collect_drain(handle: JoinHandle<String>, grace: Duration) -> String {
    match tokio::time::timeout(grace, handle).await {
        Ok(Ok(text)) => text,
        _ => String::new(),
    }
}

/// Serialize `value` as pretty JSON to `path`, creating parent directories.
pub async fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<(), InvocationError> {
    let data = serde_json::to_vec_pretty(value)?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| InvocationError::RequestWrite {
                path: parent.to_path_buf(),
                source,
            })?;
    }
    tokio::fs::write(path, data)
        .await
        .map_err(|source| InvocationError::RequestWrite {
            path: path.to_path_buf(),
            source,
        })
}

/// Talks to the optimizer through the request file and a subprocess.
#[derive(Debug, Clone)]
pub struct ProcessPort {
    request_path: PathBuf,
    command: BoundedCommand,
    marker: String,
}

impl ProcessPort {
    pub fn new(request_path: PathBuf, command: BoundedCommand, marker: impl Into<String>) -> Self {
        Self {
            request_path,
            command,
            marker: marker.into(),
        }
    }

    async fn submit_inner(
        &self,
        request: SchedulingRequest,
    ) -> Result<ProcessCapture, InvocationError> {
        write_json_file(&self.request_path, &request).await?;
        info!(
            path = %self.request_path.display(),
            doctors = request.doctors,
            patients = request.patients,
            use_ga = request.use_ga,
            "request written"
        );

        let capture = run_bounded(&self.command).await?;
        info!(
            elapsed_ms = capture.elapsed.as_millis() as u64,
            exit_code = ?capture.exit_code,
            "optimizer exited"
        );
        if !capture.stderr.trim().is_empty() {
            debug!(stderr = %capture.stderr.trim(), "optimizer diagnostics");
        }
        judge(capture, &self.marker)
    }
}

impl ComputationPort for ProcessPort {
    fn submit(
        &self,
        request: SchedulingRequest,
    ) -> BoxFuture<'_, Result<ProcessCapture, InvocationError>> {
        Box::pin(self.submit_inner(request))
    }
}
