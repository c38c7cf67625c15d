//! One read-and-filter pass over the capture artifact.
//!
//! A job moves through `Created → Launched → {Succeeded | Failed}`:
//! [`FilterJob`] is created with its sink, [`FilterJob::launch`] spawns the
//! filter tool and yields a [`RunningFilterJob`], and
//! [`RunningFilterJob::wait`] produces the terminal [`FilterJobOutcome`].
//! Terminal states are final; nothing is retried.

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::de::IgnoredAny;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::predicate::FilterPredicate;
use super::sink::OutputSink;
use crate::configuration::types::ReferenceAddresses;
use crate::error_handling::types::{FilterJobError, FilterJobFailure};
use crate::subprocess::{self, WaitError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Created,
    Launched,
    Succeeded,
    Failed,
}

/// A filter job that has not been started yet. Owns its sink.
#[derive(Debug)]
pub struct FilterJob {
    predicate: FilterPredicate,
    artifact: PathBuf,
    expression: String,
    sink: OutputSink,
}

impl FilterJob {
    pub fn new(artifact: &Path, addresses: &ReferenceAddresses, sink: OutputSink) -> Self {
        let predicate = sink.predicate();
        Self {
            predicate,
            artifact: artifact.to_path_buf(),
            expression: predicate.expression(addresses),
            sink,
        }
    }

    pub fn state(&self) -> JobState {
        JobState::Created
    }

    pub fn predicate(&self) -> FilterPredicate {
        self.predicate
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Arguments of the filter invocation: `-r <artifact> -T json -Y <expression>`.
    pub fn command_args(&self) -> Vec<String> {
        vec![
            "-r".to_string(),
            self.artifact.to_string_lossy().to_string(),
            "-T".to_string(),
            "json".to_string(),
            "-Y".to_string(),
            self.expression.clone(),
        ]
    }

    /// Spawns the filter tool with its stdout redirected into the sink.
    ///
    /// A spawn failure is returned as an already terminal outcome; the sink is
    /// closed either way.
    pub fn launch(
        self,
        tool: &str,
        timeout: Option<Duration>,
    ) -> Result<RunningFilterJob, FilterJobOutcome> {
        let args = self.command_args();
        let predicate = self.predicate;
        let started_at = Utc::now();
        let (report, stdout) = self.sink.into_stdio();

        debug!("[{}] spawning {} {:?}", predicate, tool, args);
        let spawned = Command::new(tool)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                error!("[{}] failed to launch filter tool {}: {}", predicate, tool, e);
                return Err(FilterJobOutcome::failed(
                    predicate,
                    report,
                    started_at,
                    FilterJobError::Launch(e),
                ));
            }
        };

        let stderr_task = child
            .stderr
            .take()
            .map(|stderr| subprocess::relay_stderr(predicate.to_string(), stderr));
        info!(
            "[{}] filter job launched (pid {:?}) -> {}",
            predicate,
            child.id(),
            report.display()
        );

        let started = Instant::now();
        Ok(RunningFilterJob {
            predicate,
            report,
            child,
            stderr_task,
            started_at,
            deadline: timeout.map(|budget| (started + budget, budget)),
        })
    }

    /// Completes the job without a process when the artifact holds nothing to
    /// filter: the report is an empty JSON array.
    pub fn complete_empty(self) -> FilterJobOutcome {
        let predicate = self.predicate;
        let started_at = Utc::now();
        let report = self.sink.path().to_path_buf();
        match self.sink.finish_empty() {
            Ok(report) => FilterJobOutcome {
                predicate,
                report,
                started_at,
                finished_at: Utc::now(),
                result: Ok(JobCompletion {
                    records: Some(0),
                    launched: false,
                }),
            },
            Err(e) => FilterJobOutcome::failed(predicate, report, started_at, FilterJobError::Io(e)),
        }
    }
}

/// A launched filter process. Dropping it kills the process.
#[derive(Debug)]
pub struct RunningFilterJob {
    predicate: FilterPredicate,
    report: PathBuf,
    child: Child,
    stderr_task: Option<JoinHandle<String>>,
    started_at: DateTime<Utc>,
    deadline: Option<(Instant, Duration)>,
}

impl RunningFilterJob {
    pub fn state(&self) -> JobState {
        JobState::Launched
    }

    pub fn report(&self) -> &Path {
        &self.report
    }

    /// Waits for the filter process and turns its exit into a terminal outcome.
    pub async fn wait(mut self) -> FilterJobOutcome {
        let predicate = self.predicate;
        let status = match subprocess::wait_with_deadline(&mut self.child, self.deadline).await {
            Ok(status) => status,
            Err(WaitError::TimedOut(budget)) => {
                if let Some(task) = self.stderr_task.take() {
                    task.abort();
                }
                error!("[{}] filter job timed out", predicate);
                return self.fail(FilterJobError::Timeout(budget));
            }
            Err(WaitError::Io(e)) => {
                error!("[{}] waiting on filter job failed: {}", predicate, e);
                return self.fail(FilterJobError::Io(e));
            }
        };

        let stderr = subprocess::collect_stderr(self.stderr_task.take()).await;
        if !status.success() {
            error!("[{}] filter process exited with {}", predicate, status);
            return self.fail(FilterJobError::Exited { status, stderr });
        }

        match count_records(&self.report) {
            Ok(records) => {
                info!(
                    "[{}] filter job succeeded, {} record(s) in {}",
                    predicate,
                    records.map_or_else(|| "unknown".to_string(), |n| n.to_string()),
                    self.report.display()
                );
                FilterJobOutcome {
                    predicate,
                    report: self.report,
                    started_at: self.started_at,
                    finished_at: Utc::now(),
                    result: Ok(JobCompletion {
                        records,
                        launched: true,
                    }),
                }
            }
            Err(e) => {
                error!("[{}] cannot read report {}: {}", predicate, self.report.display(), e);
                self.fail(FilterJobError::Io(e))
            }
        }
    }

    fn fail(self, cause: FilterJobError) -> FilterJobOutcome {
        FilterJobOutcome::failed(self.predicate, self.report, self.started_at, cause)
    }
}

/// Details of a successful job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobCompletion {
    /// Top-level JSON records in the report; `None` when the report could not be parsed.
    pub records: Option<usize>,
    /// Whether a filter process ran (false when the artifact was missing or empty).
    pub launched: bool,
}

/// Terminal state of one filter job.
#[derive(Debug)]
pub struct FilterJobOutcome {
    pub predicate: FilterPredicate,
    pub report: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub result: Result<JobCompletion, FilterJobFailure>,
}

impl FilterJobOutcome {
    pub fn failed(
        predicate: FilterPredicate,
        report: PathBuf,
        started_at: DateTime<Utc>,
        cause: FilterJobError,
    ) -> Self {
        Self {
            predicate,
            report,
            started_at,
            finished_at: Utc::now(),
            result: Err(FilterJobFailure { predicate, cause }),
        }
    }

    pub fn state(&self) -> JobState {
        match self.result {
            Ok(_) => JobState::Succeeded,
            Err(_) => JobState::Failed,
        }
    }

    pub fn records(&self) -> Option<usize> {
        self.result.as_ref().ok().and_then(|c| c.records)
    }
}

/// Counts the top-level elements of a JSON array report without keeping them.
///
/// An empty file counts as zero records. A report that is not a JSON array
/// yields `Ok(None)`.
pub fn count_records(path: &Path) -> io::Result<Option<usize>> {
    let file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(Some(0));
    }
    match serde_json::from_reader::<_, Vec<IgnoredAny>>(BufReader::new(file)) {
        Ok(records) => Ok(Some(records.len())),
        Err(e) if e.is_io() => Err(io::Error::from(e)),
        Err(e) => {
            warn!("Report {} is not a JSON array: {}", path.display(), e);
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{scenario_addresses, write_artifact, write_fake_filter};
    use serial_test::serial;

    fn job_for(dir: &Path, artifact: &Path, index: usize) -> FilterJob {
        let predicate = FilterPredicate::ALL[index];
        let sink = OutputSink::create(
            predicate,
            dir.join(predicate.report_file_name("secondary")),
        )
        .unwrap();
        FilterJob::new(artifact, &scenario_addresses(), sink)
    }

    #[test]
    fn command_args_follow_the_filter_contract() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("capture.pcap");
        let job = job_for(dir.path(), &artifact, 2);
        assert_eq!(job.state(), JobState::Created);
        assert_eq!(job.expression(), "ip.src == 192.168.51.172");
        let args = job.command_args();
        assert_eq!(args[0], "-r");
        assert_eq!(args[1], artifact.to_string_lossy());
        assert_eq!(&args[2..], &["-T", "json", "-Y", "ip.src == 192.168.51.172"]);
    }

    #[test]
    fn count_records_handles_empty_array_and_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.json");

        std::fs::write(&path, "").unwrap();
        assert_eq!(count_records(&path).unwrap(), Some(0));

        std::fs::write(&path, "[\n\n]\n").unwrap();
        assert_eq!(count_records(&path).unwrap(), Some(0));

        std::fs::write(&path, r#"[{"a": [1, 2, {"b": null}]}, {"c": "d"}]"#).unwrap();
        assert_eq!(count_records(&path).unwrap(), Some(2));

        std::fs::write(&path, "not json").unwrap();
        assert_eq!(count_records(&path).unwrap(), None);

        assert!(count_records(&dir.path().join("absent.json")).is_err());
    }

    #[test]
    fn complete_empty_succeeds_without_a_process() {
        let dir = tempfile::tempdir().unwrap();
        let job = job_for(dir.path(), &dir.path().join("absent.pcap"), 0);
        let outcome = job.complete_empty();
        assert_eq!(outcome.state(), JobState::Succeeded);
        assert_eq!(outcome.records(), Some(0));
        assert_eq!(
            outcome.result.as_ref().unwrap(),
            &JobCompletion {
                records: Some(0),
                launched: false
            }
        );
        assert_eq!(std::fs::read_to_string(&outcome.report).unwrap(), "[]\n");
    }

    #[tokio::test]
    #[serial]
    async fn missing_tool_fails_the_job_at_launch() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("capture.pcap");
        write_artifact(&artifact, &[("127.0.0.1", "10.0.0.1")]);
        let job = job_for(dir.path(), &artifact, 0);
        let missing = dir.path().join("no-such-filter-tool");

        match job.launch(&missing.to_string_lossy(), None) {
            Err(outcome) => {
                assert_eq!(outcome.state(), JobState::Failed);
                match outcome.result {
                    Err(FilterJobFailure {
                        predicate,
                        cause: FilterJobError::Launch(_),
                    }) => assert_eq!(predicate, FilterPredicate::ALL[0]),
                    other => panic!("expected a launch failure, got {:?}", other),
                }
            }
            Ok(_) => panic!("launch should have failed"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    #[serial]
    async fn launched_job_writes_matching_records_to_its_sink() {
        let dir = tempfile::tempdir().unwrap();
        let tool = write_fake_filter(dir.path(), "");
        let artifact = dir.path().join("capture.pcap");
        write_artifact(
            &artifact,
            &[
                ("127.0.0.1", "10.0.0.1"),
                ("10.0.0.1", "127.0.0.1"),
                ("127.0.0.1", "10.0.0.2"),
            ],
        );

        let running = job_for(dir.path(), &artifact, 0)
            .launch(&tool.to_string_lossy(), None)
            .unwrap();
        assert_eq!(running.state(), JobState::Launched);
        let outcome = running.wait().await;

        assert_eq!(outcome.state(), JobState::Succeeded);
        assert_eq!(outcome.records(), Some(2));
        assert_eq!(outcome.report, dir.path().join("local-send.json"));
        assert_eq!(count_records(&outcome.report).unwrap(), Some(2));
    }

    #[cfg(unix)]
    #[tokio::test]
    #[serial]
    async fn nonzero_exit_is_reported_with_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let tool = write_fake_filter(
            dir.path(),
            "echo \"tshark: invalid capture file\" >&2; exit 2",
        );
        let artifact = dir.path().join("capture.pcap");
        write_artifact(&artifact, &[("127.0.0.1", "10.0.0.1")]);

        let outcome = job_for(dir.path(), &artifact, 1)
            .launch(&tool.to_string_lossy(), None)
            .unwrap()
            .wait()
            .await;
        match outcome.result {
            Err(FilterJobFailure {
                cause: FilterJobError::Exited { status, stderr },
                ..
            }) => {
                assert_eq!(status.code(), Some(2));
                assert!(stderr.contains("invalid capture file"));
            }
            other => panic!("expected an exit failure, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    #[serial]
    async fn non_utf8_stderr_does_not_break_the_job() {
        let dir = tempfile::tempdir().unwrap();
        let tool = write_fake_filter(
            dir.path(),
            r#"printf 'Capturing on \351th0\n' >&2; sleep 1; i=0; while [ $i -lt 50 ]; do echo "progress $i" >&2; i=$((i+1)); done"#,
        );
        let artifact = dir.path().join("capture.pcap");
        write_artifact(
            &artifact,
            &[("127.0.0.1", "10.0.0.1"), ("10.0.0.1", "127.0.0.1")],
        );

        let outcome = job_for(dir.path(), &artifact, 1)
            .launch(&tool.to_string_lossy(), None)
            .unwrap()
            .wait()
            .await;
        assert_eq!(outcome.state(), JobState::Succeeded, "{:?}", outcome.result);
        assert_eq!(outcome.records(), Some(1));
    }

    #[cfg(unix)]
    #[tokio::test]
    #[serial]
    async fn job_past_its_timeout_is_killed() {
        let dir = tempfile::tempdir().unwrap();
        let tool = write_fake_filter(dir.path(), "exec sleep 30");
        let artifact = dir.path().join("capture.pcap");
        write_artifact(&artifact, &[("127.0.0.1", "10.0.0.1")]);

        let started = std::time::Instant::now();
        let outcome = job_for(dir.path(), &artifact, 3)
            .launch(&tool.to_string_lossy(), Some(Duration::from_millis(300)))
            .unwrap()
            .wait()
            .await;
        assert!(started.elapsed() < Duration::from_secs(20));
        match outcome.result {
            Err(FilterJobFailure {
                cause: FilterJobError::Timeout(d),
                ..
            }) => assert_eq!(d, Duration::from_millis(300)),
            other => panic!("expected a timeout, got {:?}", other),
        }
    }
}
