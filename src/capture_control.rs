//! Capture phase.
//!
//! [`CaptureController`] launches the external capture tool in the background
//! with a packet ceiling (and optionally a duration ceiling). The returned
//! [`CaptureHandle`] is the explicit completion signal: waiting on it returns
//! once the tool has exited and the artifact is final, or fails with a
//! timeout when the watchdog deadline passes.
//!
//! Example (non-running):
//! ```ignore
//! use capsplit::capture_control::CaptureController;
//! use capsplit::configuration::CaptureSettings;
//!
//! let handle = CaptureController::new(CaptureSettings::default()).start()?;
//! let outcome = handle.wait().await?;
//! println!("artifact: {}", outcome.artifact.display());
//! ```

pub mod capture_job;
pub mod types;

pub use capture_job::{CaptureController, CaptureHandle};
pub use types::{ArtifactState, CaptureOutcome};
