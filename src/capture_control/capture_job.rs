use chrono::Utc;
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::capture_control::types::{ArtifactState, CaptureOutcome};
use crate::configuration::types::CaptureSettings;
use crate::error_handling::types::CaptureError;
use crate::subprocess::{self, WaitError};

/// Starts the external capture tool.
///
/// The controller only launches the process; completion is observed through
/// the returned [`CaptureHandle`]. The artifact file is created by the tool
/// itself, never by the controller.
pub struct CaptureController {
    settings: CaptureSettings,
}

impl CaptureController {
    pub fn new(settings: CaptureSettings) -> Self {
        Self { settings }
    }

    /// Arguments of the capture invocation:
    /// `-i <interface> -w <artifact> -c <max_packets> [-a duration:<secs>]`.
    pub fn command_args(&self) -> Vec<String> {
        let mut args = vec![
            "-i".to_string(),
            self.settings.interface.clone(),
            "-w".to_string(),
            self.settings.artifact_path.to_string_lossy().to_string(),
            "-c".to_string(),
            self.settings.max_packets.to_string(),
        ];
        if let Some(secs) = self.settings.max_duration_secs {
            args.push("-a".to_string());
            args.push(format!("duration:{}", secs));
        }
        args
    }

    /// Warning for a capture bounded by its packet ceiling only: on a quiet
    /// interface such a capture never ends and nothing kills it.
    pub fn unbounded_warning(&self) -> Option<String> {
        if self.settings.deadline().is_some() {
            return None;
        }
        Some(format!(
            "No capture.max_duration_secs set: the run waits until {} packets are seen on '{}', however long that takes",
            self.settings.max_packets, self.settings.interface
        ))
    }

    /// Spawns the capture process without waiting for it.
    ///
    /// Errors with [`CaptureError::LaunchFailure`] if the tool cannot be started
    /// (binary missing, permission denied).
    pub fn start(&self) -> Result<CaptureHandle, CaptureError> {
        let args = self.command_args();
        if let Some(warning) = self.unbounded_warning() {
            warn!("{}", warning);
        }
        debug!("Spawning capture: {} {:?}", self.settings.tool, args);

        let mut child = Command::new(&self.settings.tool)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                error!("Failed to spawn capture tool {}: {}", self.settings.tool, e);
                CaptureError::LaunchFailure(e)
            })?;

        let label = format!("capture:{}", child.id().unwrap_or(0));
        let stderr_task = child
            .stderr
            .take()
            .map(|stderr| subprocess::relay_stderr(label, stderr));

        info!(
            "Capture started on '{}' (pid {:?}), up to {} packets into {}",
            self.settings.interface,
            child.id(),
            self.settings.max_packets,
            self.settings.artifact_path.display()
        );

        Ok(CaptureHandle {
            child,
            stderr_task,
            artifact: self.settings.artifact_path.clone(),
            deadline: self.settings.deadline(),
            started: Instant::now(),
            started_at: Utc::now(),
        })
    }
}

/// A running capture process. Waiting on it is the completion signal of the
/// capture phase; dropping it kills the process.
pub struct CaptureHandle {
    child: Child,
    stderr_task: Option<JoinHandle<String>>,
    artifact: PathBuf,
    deadline: Option<Duration>,
    started: Instant,
    started_at: chrono::DateTime<Utc>,
}

impl CaptureHandle {
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    pub fn artifact(&self) -> &Path {
        &self.artifact
    }

    /// Waits until the capture process exits by itself, or kills it when the
    /// watchdog deadline passes.
    pub async fn wait(mut self) -> Result<CaptureOutcome, CaptureError> {
        let deadline = self
            .deadline
            .map(|budget| (self.started + budget, budget));
        if let Some((_, budget)) = deadline {
            debug!("Capture watchdog armed for {}s", budget.as_secs_f64());
        }

        let status = match subprocess::wait_with_deadline(&mut self.child, deadline).await {
            Ok(status) => status,
            Err(WaitError::TimedOut(budget)) => {
                if let Some(task) = self.stderr_task.take() {
                    task.abort();
                }
                error!("Capture did not finish within {}s", budget.as_secs_f64());
                return Err(CaptureError::TimeoutFailure(budget));
            }
            Err(WaitError::Io(e)) => return Err(CaptureError::IoError(e)),
        };

        let stderr = subprocess::collect_stderr(self.stderr_task.take()).await;
        if !status.success() {
            error!("Capture process exited with {}", status);
            return Err(CaptureError::Exited { status, stderr });
        }

        let artifact_state = ArtifactState::inspect(&self.artifact).map_err(|e| {
            error!(
                "Cannot inspect capture artifact {}: {}",
                self.artifact.display(),
                e
            );
            CaptureError::IoError(e)
        })?;
        if !artifact_state.has_data() {
            warn!(
                "Capture finished but artifact {} is {}",
                self.artifact.display(),
                artifact_state
            );
        }

        let outcome = CaptureOutcome {
            artifact: self.artifact.clone(),
            artifact_state,
            started_at: self.started_at,
            finished_at: Utc::now(),
            elapsed: self.started.elapsed(),
        };
        info!(
            "Capture finished after {:.1}s, artifact {} ({})",
            outcome.elapsed.as_secs_f64(),
            outcome.artifact.display(),
            outcome.artifact_state
        );
        Ok(outcome)
    }
}
