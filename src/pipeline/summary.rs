use std::fmt;
use uuid::Uuid;

use crate::analysis::AnalysisReport;
use crate::capture_control::CaptureOutcome;
use crate::error_handling::types::ExitReason;

/// Result of a completed run.
#[derive(Debug)]
pub struct RunSummary {
    pub run_id: Uuid,
    /// `None` in analyze-only mode.
    pub capture: Option<CaptureOutcome>,
    pub report: AnalysisReport,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.report.is_success()
    }

    pub fn exit_reason(&self) -> ExitReason {
        if self.is_success() {
            ExitReason::Success
        } else {
            ExitReason::FilterJobs
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run {}", self.run_id)?;
        match &self.capture {
            Some(capture) => writeln!(
                f,
                "Capture: {} ({}) in {:.1}s",
                capture.artifact.display(),
                capture.artifact_state,
                capture.elapsed.as_secs_f64()
            )?,
            None => writeln!(f, "Capture: skipped")?,
        }
        write!(f, "{}", self.report)?;
        let failed = self.report.failures().count();
        if failed == 0 {
            write!(
                f,
                "All {} reports written, {} record(s) in total",
                self.report.outcomes().len(),
                self.report.total_records()
            )
        } else {
            write!(
                f,
                "{} of {} filter job(s) failed",
                failed,
                self.report.outcomes().len()
            )
        }
    }
}
