//! Orchestration of one run: configuration check, capture phase, analysis phase.
//!
//! ```ignore
//! let pipeline = Pipeline::new(config)?;
//! let summary = pipeline.run().await?;
//! println!("{}", summary);
//! std::process::exit(summary.exit_reason().code() as i32);
//! ```

pub mod runner;
pub mod summary;

pub use runner::Pipeline;
pub use summary::RunSummary;
