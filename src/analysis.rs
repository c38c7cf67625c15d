//! Analysis phase.
//!
//! Components:
//! - `predicate`: the four fixed (direction, scope) filter predicates.
//! - `sink`: report files, each exclusively owned by one filter job.
//! - `filter_job`: one filter process and its state machine.
//! - `fan_out`: the analyzer launching and joining the four jobs.
//! - `report`: the aggregate outcome of an analysis run.

pub mod fan_out;
pub mod filter_job;
pub mod predicate;
pub mod report;
pub mod sink;

pub use fan_out::FanOutAnalyzer;
pub use filter_job::{FilterJob, FilterJobOutcome, JobCompletion, JobState, RunningFilterJob};
pub use predicate::{AddressScope, FilterPredicate, TrafficDirection};
pub use report::AnalysisReport;
pub use sink::{OutputSink, SinkSet};
