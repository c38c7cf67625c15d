use chrono::Utc;
use log::{debug, error, info, warn};
use std::io;
use std::path::{Path, PathBuf};
use tokio::task::JoinHandle;

use super::filter_job::{FilterJob, FilterJobOutcome};
use super::predicate::FilterPredicate;
use super::report::AnalysisReport;
use super::sink::SinkSet;
use crate::capture_control::types::ArtifactState;
use crate::configuration::types::{AnalysisSettings, ReferenceAddresses};
use crate::error_handling::types::{AnalysisError, FilterJobError};

/// Splits one finished capture artifact into four directional reports.
///
/// The analyzer opens the four sinks up front (all-or-nothing), launches one
/// filter process per [`FilterPredicate`] without waiting in between, then
/// joins every launched job before building the [`AnalysisReport`]. A failing
/// job never stops the others from being awaited.
pub struct FanOutAnalyzer {
    addresses: ReferenceAddresses,
    settings: AnalysisSettings,
}

impl FanOutAnalyzer {
    pub fn new(addresses: ReferenceAddresses, settings: AnalysisSettings) -> Self {
        Self {
            addresses,
            settings,
        }
    }

    /// Report paths this analyzer writes, in predicate order.
    pub fn report_paths(&self) -> Vec<PathBuf> {
        FilterPredicate::ALL
            .iter()
            .map(|p| {
                self.settings
                    .output_dir
                    .join(p.report_file_name(&self.settings.secondary_label))
            })
            .collect()
    }

    /// Runs the four filter jobs against `artifact`.
    ///
    /// Errors only when the output directory or a sink cannot be created; in
    /// that case no job has been launched. Job failures are carried by the
    /// returned report.
    pub async fn run(&self, artifact: &Path) -> Result<AnalysisReport, AnalysisError> {
        info!("Analyzing file {}", artifact.display());

        std::fs::create_dir_all(&self.settings.output_dir).map_err(|cause| {
            error!(
                "Cannot create output directory {}: {}",
                self.settings.output_dir.display(),
                cause
            );
            AnalysisError::OutputDirectory {
                path: self.settings.output_dir.clone(),
                cause,
            }
        })?;

        let sinks = SinkSet::open_all(
            &self.settings.output_dir,
            &FilterPredicate::ALL,
            &self.settings.secondary_label,
        )?
        .into_sinks();
        debug!("Opened {} sinks", sinks.len());

        let jobs: Vec<FilterJob> = sinks
            .into_iter()
            .map(|sink| FilterJob::new(artifact, &self.addresses, sink))
            .collect();

        let artifact_state = match ArtifactState::inspect(artifact) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!(
                    "Cannot inspect artifact {}: {}, leaving it to the filter tool",
                    artifact.display(),
                    e
                );
                None
            }
        };

        let outcomes = match artifact_state {
            Some(state) if !state.has_data() => {
                warn!(
                    "Artifact {} is {}, every report will be empty",
                    artifact.display(),
                    state
                );
                jobs.into_iter().map(FilterJob::complete_empty).collect()
            }
            _ => self.launch_and_join(jobs).await,
        };

        let report = AnalysisReport::new(artifact.to_path_buf(), artifact_state, outcomes);
        if report.is_success() {
            info!(
                "Analysis finished: {} record(s) across {} reports",
                report.total_records(),
                report.outcomes().len()
            );
        } else {
            error!(
                "Analysis finished with {} failed job(s)",
                report.failures().count()
            );
        }
        Ok(report)
    }

    /// Launches every job, then waits on each of them in turn. Since all jobs
    /// run concurrently, the total wait is that of the slowest job.
    async fn launch_and_join(&self, jobs: Vec<FilterJob>) -> Vec<FilterJobOutcome> {
        let timeout = self.settings.job_timeout();
        let mut outcomes = Vec::with_capacity(jobs.len());
        let mut running: Vec<(FilterPredicate, PathBuf, JoinHandle<FilterJobOutcome>)> =
            Vec::with_capacity(jobs.len());

        for job in jobs {
            let predicate = job.predicate();
            match job.launch(&self.settings.tool, timeout) {
                Ok(launched) => {
                    let report = launched.report().to_path_buf();
                    running.push((predicate, report, tokio::spawn(launched.wait())));
                }
                Err(outcome) => outcomes.push(outcome),
            }
        }
        info!("{} filter job(s) running", running.len());

        for (predicate, report, handle) in running {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    error!("[{}] filter job task ended abnormally: {}", predicate, e);
                    outcomes.push(FilterJobOutcome::failed(
                        predicate,
                        report,
                        Utc::now(),
                        FilterJobError::Io(io::Error::other(e.to_string())),
                    ));
                }
            }
        }
        outcomes
    }
}
