//! Contracts for the build server and the notifier.
//!
//! The run coordinator only talks to these traits; `logsweep-jenkins` and
//! `logsweep-notify` provide the production implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{BuildRef, JobRef, Report};

/// Lists the jobs to sweep.
#[async_trait]
pub trait JobLister: Send + Sync {
    /// Return every job, in server order.
    ///
    /// Fails with [`LogsweepError::Connection`](crate::LogsweepError::Connection)
    /// when the server is unreachable or rejects the credentials.
    async fn list_jobs(&self) -> Result<Vec<JobRef>>;
}

/// Lists the failed builds of one job.
#[async_trait]
pub trait BuildLister: Send + Sync {
    /// Failed or unstable builds started at or after `window_start`, newest first.
    async fn list_failed_builds(
        &self,
        job_name: &str,
        window_start: DateTime<Utc>,
    ) -> Result<Vec<BuildRef>>;
}

/// Fetches raw console output for a build.
#[async_trait]
pub trait LogFetcher: Send + Sync {
    /// Fails with `NotFound`, `Http`, or `Network`.
    async fn fetch_console_text(&self, job_name: &str, build_id: &str) -> Result<String>;
}

/// Delivers a finished report. Retries, if any, are the implementation's concern.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, report: &Report) -> Result<()>;
}
