//! Streaming analysis engine for logsweep.
//!
//! This crate ties the analyzer to the collaborator traits into a single
//! sweep: [`RunCoordinator`] lists jobs and failed builds, [`BuildProcessor`]
//! turns one console log into failure records, and [`StreamAggregator`]
//! folds them into the bounded [`Report`](logsweep_shared::Report).

pub mod aggregator;
pub mod coordinator;
pub mod processor;

pub use aggregator::{AggregationLimits, StreamAggregator};
pub use coordinator::{
    Collaborators, ProgressReporter, RunCoordinator, RunError, RunOutcome, RunState,
    SilentProgress,
};
pub use processor::BuildProcessor;
