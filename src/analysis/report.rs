use std::fmt;
use std::path::{Path, PathBuf};

use super::filter_job::{FilterJobOutcome, JobState};
use crate::capture_control::types::ArtifactState;
use crate::error_handling::types::{AnalysisError, FilterJobFailure};

/// Outcomes of all four filter jobs of one analysis run, in predicate order.
#[derive(Debug)]
pub struct AnalysisReport {
    artifact: PathBuf,
    artifact_state: Option<ArtifactState>,
    outcomes: Vec<FilterJobOutcome>,
}

impl AnalysisReport {
    pub fn new(
        artifact: PathBuf,
        artifact_state: Option<ArtifactState>,
        mut outcomes: Vec<FilterJobOutcome>,
    ) -> Self {
        outcomes.sort_by_key(|o| o.predicate);
        Self {
            artifact,
            artifact_state,
            outcomes,
        }
    }

    pub fn artifact(&self) -> &Path {
        &self.artifact
    }

    /// State of the artifact when analysis started; `None` when it could not be inspected.
    pub fn artifact_state(&self) -> Option<ArtifactState> {
        self.artifact_state
    }

    pub fn outcomes(&self) -> &[FilterJobOutcome] {
        &self.outcomes
    }

    pub fn is_success(&self) -> bool {
        self.outcomes
            .iter()
            .all(|o| o.state() == JobState::Succeeded)
    }

    /// Reports of the jobs that succeeded.
    pub fn produced(&self) -> impl Iterator<Item = &FilterJobOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.state() == JobState::Succeeded)
    }

    pub fn failures(&self) -> impl Iterator<Item = &FilterJobFailure> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().err())
    }

    /// Sum of the record counts of every report that could be counted.
    pub fn total_records(&self) -> usize {
        self.outcomes.iter().filter_map(|o| o.records()).sum()
    }

    /// The four report locations when every job succeeded, otherwise every failure.
    pub fn into_result(self) -> Result<Vec<PathBuf>, AnalysisError> {
        if self.is_success() {
            return Ok(self.outcomes.into_iter().map(|o| o.report).collect());
        }
        let failures = self
            .outcomes
            .into_iter()
            .filter_map(|o| o.result.err())
            .collect();
        Err(AnalysisError::FilterJobFailures(failures))
    }
}

impl fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Analysis of {}", self.artifact.display())?;
        if let Some(state) = self.artifact_state {
            write!(f, " ({})", state)?;
        }
        writeln!(f)?;
        for outcome in &self.outcomes {
            match &outcome.result {
                Ok(completion) => {
                    let records = completion
                        .records
                        .map_or_else(|| "unknown number of".to_string(), |n| n.to_string());
                    writeln!(
                        f,
                        "- '{}' [{}]: {} record(s)",
                        outcome.report.display(),
                        outcome.predicate,
                        records
                    )?;
                }
                Err(failure) => {
                    writeln!(
                        f,
                        "- '{}' [{}]: FAILED, {}",
                        outcome.report.display(),
                        outcome.predicate,
                        failure.cause
                    )?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::filter_job::JobCompletion;
    use crate::analysis::predicate::FilterPredicate;
    use crate::error_handling::types::FilterJobError;
    use chrono::Utc;
    use std::time::Duration;

    fn succeeded(index: usize, records: usize) -> FilterJobOutcome {
        let predicate = FilterPredicate::ALL[index];
        FilterJobOutcome {
            predicate,
            report: PathBuf::from(predicate.report_file_name("secondary")),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            result: Ok(JobCompletion {
                records: Some(records),
                launched: true,
            }),
        }
    }

    fn timed_out(index: usize) -> FilterJobOutcome {
        let predicate = FilterPredicate::ALL[index];
        FilterJobOutcome::failed(
            predicate,
            PathBuf::from(predicate.report_file_name("secondary")),
            Utc::now(),
            FilterJobError::Timeout(Duration::from_secs(1)),
        )
    }

    #[test]
    fn outcomes_are_listed_in_predicate_order() {
        let report = AnalysisReport::new(
            PathBuf::from("capture.pcap"),
            Some(ArtifactState::Ready(10)),
            vec![succeeded(3, 0), succeeded(1, 2), succeeded(0, 3), succeeded(2, 1)],
        );
        let order: Vec<FilterPredicate> = report.outcomes().iter().map(|o| o.predicate).collect();
        assert_eq!(order, FilterPredicate::ALL.to_vec());
        assert!(report.is_success());
        assert_eq!(report.total_records(), 6);
        assert_eq!(report.produced().count(), 4);

        let paths = report.into_result().unwrap();
        assert_eq!(paths[0], PathBuf::from("local-send.json"));
        assert_eq!(paths.len(), 4);
    }

    #[test]
    fn into_result_collects_every_failure() {
        let report = AnalysisReport::new(
            PathBuf::from("capture.pcap"),
            Some(ArtifactState::Ready(10)),
            vec![timed_out(0), succeeded(1, 2), timed_out(3), succeeded(2, 1)],
        );
        assert!(!report.is_success());
        assert_eq!(report.failures().count(), 2);
        assert_eq!(report.produced().count(), 2);

        let summary = report.to_string();
        assert!(summary.contains("local-receive.json' [inbound/local]: 2 record(s)"));
        assert!(summary.contains("[outbound/local]: FAILED, timeout failure"));

        match report.into_result() {
            Err(AnalysisError::FilterJobFailures(failures)) => {
                let predicates: Vec<FilterPredicate> =
                    failures.iter().map(|f| f.predicate).collect();
                assert_eq!(
                    predicates,
                    vec![FilterPredicate::ALL[0], FilterPredicate::ALL[3]]
                );
            }
            other => panic!("expected aggregated failures, got {:?}", other),
        }
    }
}
