use std::fmt;
use std::path::PathBuf;
use std::process::{ExitCode, ExitStatus};
use std::time::Duration;

use crate::analysis::predicate::FilterPredicate;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    BadIPFormatting(String),
    IdenticalAddresses(String),
    BadInterface(String),
    BadLabel(String),
    MissingValue(String),
    NotInRange(String),
    PathConflict(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::BadIPFormatting(e) => write!(f, "IP formatting error: {}", e),
            ConfigError::IdenticalAddresses(e) => write!(f, "Reference address error: {}", e),
            ConfigError::BadInterface(e) => write!(f, "Interface selector error: {}", e),
            ConfigError::BadLabel(e) => write!(f, "Scope label error: {}", e),
            ConfigError::MissingValue(e) => write!(f, "Missing configuration value: {}", e),
            ConfigError::NotInRange(e) => write!(f, "Value out of range: {}", e),
            ConfigError::PathConflict(e) => write!(f, "Path conflict: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

/// Failures of the capture phase. Any of them aborts the run.
#[derive(Debug)]
pub enum CaptureError {
    /// The capture tool could not be started at all.
    LaunchFailure(std::io::Error),
    /// The capture tool ran but exited unsuccessfully.
    Exited { status: ExitStatus, stderr: String },
    /// The watchdog deadline passed; the process was killed.
    TimeoutFailure(Duration),
    IoError(std::io::Error),
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::LaunchFailure(e) => write!(f, "Capture launch failure: {}", e),
            CaptureError::Exited { status, stderr } => {
                write!(f, "Capture process exited with {}", status)?;
                if !stderr.is_empty() {
                    write!(f, ": {}", stderr)?;
                }
                Ok(())
            }
            CaptureError::TimeoutFailure(d) => {
                write!(f, "Capture timeout failure after {}s", d.as_secs_f64())
            }
            CaptureError::IoError(e) => write!(f, "Capture IO error: {}", e),
        }
    }
}

impl std::error::Error for CaptureError {}

/// Cause of a single filter job failing.
#[derive(Debug)]
pub enum FilterJobError {
    Launch(std::io::Error),
    Exited { status: ExitStatus, stderr: String },
    Io(std::io::Error),
    Timeout(Duration),
}

impl fmt::Display for FilterJobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterJobError::Launch(e) => write!(f, "launch failure: {}", e),
            FilterJobError::Exited { status, stderr } => {
                write!(f, "filter process exited with {}", status)?;
                if !stderr.is_empty() {
                    write!(f, ": {}", stderr)?;
                }
                Ok(())
            }
            FilterJobError::Io(e) => write!(f, "IO error: {}", e),
            FilterJobError::Timeout(d) => {
                write!(f, "timeout failure after {}s", d.as_secs_f64())
            }
        }
    }
}

impl std::error::Error for FilterJobError {}

/// A failed filter job together with the predicate it was running.
#[derive(Debug)]
pub struct FilterJobFailure {
    pub predicate: FilterPredicate,
    pub cause: FilterJobError,
}

impl fmt::Display for FilterJobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.predicate, self.cause)
    }
}

impl std::error::Error for FilterJobFailure {}

#[derive(Debug)]
pub enum AnalysisError {
    OutputDirectory { path: PathBuf, cause: std::io::Error },
    SinkCreationFailure { sink: PathBuf, cause: std::io::Error },
    FilterJobFailures(Vec<FilterJobFailure>),
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisError::OutputDirectory { path, cause } => write!(
                f,
                "Output directory {} could not be created: {}",
                path.display(),
                cause
            ),
            AnalysisError::SinkCreationFailure { sink, cause } => write!(
                f,
                "Sink creation failure for {}: {}",
                sink.display(),
                cause
            ),
            AnalysisError::FilterJobFailures(failures) => {
                write!(f, "{} filter job(s) failed", failures.len())?;
                for failure in failures {
                    write!(f, "; {}", failure)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for AnalysisError {}

#[derive(Debug)]
pub enum PipelineError {
    ConfigurationError(ConfigError),
    CaptureError(CaptureError),
    AnalysisError(AnalysisError),
}

impl PipelineError {
    pub fn exit_reason(&self) -> ExitReason {
        match self {
            PipelineError::ConfigurationError(_) => ExitReason::Configuration,
            PipelineError::CaptureError(CaptureError::LaunchFailure(_)) => {
                ExitReason::CaptureLaunch
            }
            PipelineError::CaptureError(_) => ExitReason::CaptureFailed,
            PipelineError::AnalysisError(AnalysisError::FilterJobFailures(_)) => {
                ExitReason::FilterJobs
            }
            PipelineError::AnalysisError(_) => ExitReason::SinkCreation,
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::ConfigurationError(e) => write!(f, "Configuration error: {}", e),
            PipelineError::CaptureError(e) => write!(f, "Capture phase error: {}", e),
            PipelineError::AnalysisError(e) => write!(f, "Analysis phase error: {}", e),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<ConfigError> for PipelineError {
    fn from(err: ConfigError) -> Self {
        PipelineError::ConfigurationError(err)
    }
}

impl From<CaptureError> for PipelineError {
    fn from(err: CaptureError) -> Self {
        PipelineError::CaptureError(err)
    }
}

impl From<AnalysisError> for PipelineError {
    fn from(err: AnalysisError) -> Self {
        PipelineError::AnalysisError(err)
    }
}

/// Process exit status of a run, one value per phase failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Success,
    Configuration,
    CaptureLaunch,
    CaptureFailed,
    SinkCreation,
    FilterJobs,
}

impl ExitReason {
    pub fn code(&self) -> u8 {
        match self {
            ExitReason::Success => 0,
            ExitReason::Configuration => 2,
            ExitReason::CaptureLaunch => 3,
            ExitReason::CaptureFailed => 4,
            ExitReason::SinkCreation => 5,
            ExitReason::FilterJobs => 6,
        }
    }
}

impl From<ExitReason> for ExitCode {
    fn from(reason: ExitReason) -> Self {
        ExitCode::from(reason.code())
    }
}
