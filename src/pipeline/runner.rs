use log::{error, info, warn};
use uuid::Uuid;

use super::summary::RunSummary;
use crate::analysis::FanOutAnalyzer;
use crate::capture_control::{ArtifactState, CaptureController, CaptureOutcome};
use crate::configuration::config::Config;
use crate::configuration::types::ReferenceAddresses;
use crate::error_handling::types::PipelineError;

/// One capture-then-analyze run.
///
/// Phases are strictly sequential: analysis starts only after the capture
/// process has exited, so the artifact has no writer while it is read.
pub struct Pipeline {
    run_id: Uuid,
    config: Config,
    addresses: ReferenceAddresses,
}

impl Pipeline {
    /// Validates `config` and assigns the run id.
    pub fn new(config: Config) -> Result<Self, PipelineError> {
        let addresses = config.validate().map_err(|e| {
            error!("Invalid configuration: {}", e);
            PipelineError::from(e)
        })?;
        let run_id = Uuid::new_v4();
        info!(
            "[{}] New run: local {} / {} {}",
            run_id, addresses.local, config.analysis.secondary_label, addresses.secondary
        );
        Ok(Self {
            run_id,
            config,
            addresses,
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Runs the capture phase (unless analyze-only) and then the analysis phase.
    ///
    /// Failed filter jobs are not an error here: they are carried by the
    /// returned summary, whose [`RunSummary::exit_reason`] reflects them.
    pub async fn run(&self) -> Result<RunSummary, PipelineError> {
        let capture = if self.config.analyze_only {
            info!(
                "[{}] Analyze-only mode, skipping capture of {}",
                self.run_id,
                self.config.capture.artifact_path.display()
            );
            None
        } else {
            Some(self.capture().await?)
        };

        let analyzer = FanOutAnalyzer::new(self.addresses, self.config.analysis.clone());
        info!("[{}] Starting analysis phase", self.run_id);
        let report = analyzer
            .run(&self.config.capture.artifact_path)
            .await
            .map_err(|e| {
                error!("[{}] Analysis aborted: {}", self.run_id, e);
                PipelineError::from(e)
            })?;

        let summary = RunSummary {
            run_id: self.run_id,
            capture,
            report,
        };
        if summary.is_success() {
            info!("[{}] Run completed", self.run_id);
        } else {
            warn!(
                "[{}] Run completed with {} failed filter job(s)",
                self.run_id,
                summary.report.failures().count()
            );
        }
        Ok(summary)
    }

    async fn capture(&self) -> Result<CaptureOutcome, PipelineError> {
        info!("[{}] Starting capture phase", self.run_id);
        let handle = CaptureController::new(self.config.capture.clone())
            .start()
            .map_err(|e| {
                error!("[{}] Capture could not start: {}", self.run_id, e);
                PipelineError::from(e)
            })?;

        let outcome = handle.wait().await.map_err(|e| {
            error!("[{}] Capture failed: {}", self.run_id, e);
            PipelineError::from(e)
        })?;
        if outcome.artifact_state == ArtifactState::Missing {
            warn!(
                "[{}] Capture tool exited cleanly without writing {}",
                self.run_id,
                outcome.artifact.display()
            );
        }
        Ok(outcome)
    }
}
