//! Shared types, error model, configuration, and collaborator contracts for logsweep.
//!
//! This crate is the foundation depended on by all other logsweep crates.
//! It provides:
//! - [`LogsweepError`], the unified error type
//! - Domain types ([`FailureRecord`], [`Report`], [`JobRef`], [`BuildRef`])
//! - Configuration ([`AppConfig`], [`AnalysisConfig`], config loading)
//! - The build-server and notifier traits the run coordinator drives

pub mod config;
pub mod error;
pub mod source;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AnalysisConfig, AnalysisSection, AppConfig, DEFAULT_TIMESTAMP_PATTERN, JenkinsSection,
    SlackSection, config_dir, config_file_path, init_config, load_config, load_config_from,
    resolve_secret,
};
pub use error::{LogsweepError, Result};
pub use source::{BuildLister, JobLister, LogFetcher, Notifier};
pub use types::{
    BuildRef, Diagnostic, DiagnosticKind, FailureRecord, JobRef, JobReport, MessageReport,
    Report, ReportId, SignatureReport,
};
