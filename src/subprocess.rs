//! Helpers shared by the capture and filter processes: stderr relaying and
//! deadline-bounded waiting.

use std::collections::VecDeque;
use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use log::{debug, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Number of trailing stderr lines kept for failure reports.
pub const STDERR_TAIL_LINES: usize = 8;

#[derive(Debug)]
pub enum WaitError {
    /// The deadline passed; the child has been killed and reaped.
    TimedOut(Duration),
    Io(io::Error),
}

/// Relays every stderr line of a child to the debug log and returns the last
/// [`STDERR_TAIL_LINES`] lines once the stream closes. The stream is drained
/// to its end whatever the encoding of its lines, so the child never writes
/// into a closed pipe.
pub fn relay_stderr(label: String, stderr: ChildStderr) -> JoinHandle<String> {
    tokio::spawn(async move {
        let mut reader = BufReader::new(stderr);
        let mut buf = Vec::new();
        let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!("[{}] reading stderr failed: {}", label, e);
                    break;
                }
            }
            // Tools print interface names and paths verbatim, not always UTF-8.
            let line = String::from_utf8_lossy(&buf)
                .trim_end_matches(['\n', '\r'])
                .to_string();
            debug!("[{}][stderr] {}", label, line);
            if tail.len() == STDERR_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line);
        }
        debug!("[{}] stderr monitoring ended", label);
        Vec::from(tail).join(" | ")
    })
}

/// Collects the tail produced by [`relay_stderr`], if any.
pub async fn collect_stderr(task: Option<JoinHandle<String>>) -> String {
    match task {
        Some(task) => task.await.unwrap_or_else(|e| {
            warn!("stderr relay task failed: {}", e);
            String::new()
        }),
        None => String::new(),
    }
}

/// Waits for `child` to exit. With a deadline, a child still running when it
/// passes is killed and reaped before [`WaitError::TimedOut`] is returned.
pub async fn wait_with_deadline(
    child: &mut Child,
    deadline: Option<(Instant, Duration)>,
) -> Result<ExitStatus, WaitError> {
    let Some((at, budget)) = deadline else {
        return child.wait().await.map_err(WaitError::Io);
    };

    match tokio::time::timeout_at(at, child.wait()).await {
        Ok(status) => status.map_err(WaitError::Io),
        Err(_) => {
            warn!(
                "Process {:?} exceeded its {}s budget, killing it",
                child.id(),
                budget.as_secs_f64()
            );
            if let Err(e) = child.kill().await {
                warn!("Failed to kill process {:?}: {}", child.id(), e);
            }
            Err(WaitError::TimedOut(budget))
        }
    }
}
