//! End-to-end run: list jobs → list failed builds → process → aggregate → deliver.
//!
//! The coordinator walks jobs in listing order. Within a job, up to
//! `fetch_concurrency` builds are fetched and parsed in parallel, but their
//! records are ingested strictly in build-listing order, so the report is
//! identical for every concurrency setting.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use logsweep_shared::{
    AnalysisConfig, BuildLister, BuildRef, FailureRecord, JobLister, LogFetcher, LogsweepError,
    Notifier, Report, Result,
};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::aggregator::StreamAggregator;
use crate::processor::BuildProcessor;

// ---------------------------------------------------------------------------
// Run state and errors
// ---------------------------------------------------------------------------

/// Phases of one run. `Failed` is terminal and reachable from any phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    ListingJobs,
    Processing,
    Aggregated,
    Done,
    Failed,
}

/// Errors that abort a run before any report exists.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// The job list could not be obtained.
    #[error("job listing failed: {0}")]
    ListingFailure(#[source] LogsweepError),

    /// The caller cancelled the run.
    #[error("run cancelled")]
    Cancelled,
}

/// A completed run. Delivery failure does not undo the report.
#[derive(Debug)]
pub struct RunOutcome {
    pub report: Report,
    pub delivery_error: Option<LogsweepError>,
}

impl RunOutcome {
    pub fn delivered(&self) -> bool {
        self.delivery_error.is_none()
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting run status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before a job's builds are listed.
    fn job_started(&self, job_name: &str, current: usize, total: usize);
    /// Called after each build is fetched and parsed, or skipped.
    fn build_processed(&self, job_name: &str, build_id: &str, records: Option<usize>);
    /// Called once the report has been handed to the notifier.
    fn done(&self, report: &Report);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn job_started(&self, _job_name: &str, _current: usize, _total: usize) {}
    fn build_processed(&self, _job_name: &str, _build_id: &str, _records: Option<usize>) {}
    fn done(&self, _report: &Report) {}
}

// ---------------------------------------------------------------------------
// RunCoordinator
// ---------------------------------------------------------------------------

/// The external systems a run talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub jobs: Arc<dyn JobLister>,
    pub builds: Arc<dyn BuildLister>,
    pub logs: Arc<dyn LogFetcher>,
    pub notifier: Arc<dyn Notifier>,
}

/// Drives one stateless sweep.
pub struct RunCoordinator {
    config: AnalysisConfig,
    processor: Arc<BuildProcessor>,
    collaborators: Collaborators,
    state: RunState,
}

impl RunCoordinator {
    /// Validate `config` and bind the collaborators.
    pub fn new(config: AnalysisConfig, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;
        let processor = Arc::new(BuildProcessor::new(&config)?);
        Ok(Self {
            config,
            processor,
            collaborators,
            state: RunState::Init,
        })
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Run a sweep whose window ends now.
    pub async fn run(
        &mut self,
        cancel: &CancellationToken,
        progress: &dyn ProgressReporter,
    ) -> std::result::Result<RunOutcome, RunError> {
        self.run_at(Utc::now(), cancel, progress).await
    }

    /// Run a sweep whose window ends at `now`.
    ///
    /// Cancellation abandons in-flight fetches and fails the run without a
    /// report. Once a report exists, delivery is not cancelled.
    #[instrument(skip_all, fields(window_hours = self.config.window_hours))]
    pub async fn run_at(
        &mut self,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
        progress: &dyn ProgressReporter,
    ) -> std::result::Result<RunOutcome, RunError> {
        self.transition(RunState::Init);

        let swept = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RunError::Cancelled),
            swept = self.sweep(now, cancel, progress) => swept,
        };

        let report = match swept {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "run failed");
                self.transition(RunState::Failed);
                return Err(e);
            }
        };

        progress.phase("Delivering report");
        let delivery_error = match self.collaborators.notifier.deliver(&report).await {
            Ok(()) => None,
            Err(e) => {
                warn!(error = %e, "report delivery failed");
                Some(e)
            }
        };

        self.transition(RunState::Done);
        info!(
            report_id = %report.id,
            jobs_with_failures = report.jobs_with_failures,
            builds = report.total_failed_builds_processed,
            skipped = report.skipped_builds,
            delivered = delivery_error.is_none(),
            "run complete"
        );
        progress.done(&report);

        Ok(RunOutcome {
            report,
            delivery_error,
        })
    }

    fn transition(&mut self, next: RunState) {
        debug!(from = ?self.state, to = ?next, "run state");
        self.state = next;
    }

    async fn sweep(
        &mut self,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
        progress: &dyn ProgressReporter,
    ) -> std::result::Result<Report, RunError> {
        self.transition(RunState::ListingJobs);
        progress.phase("Listing jobs");
        let jobs = self
            .collaborators
            .jobs
            .list_jobs()
            .await
            .map_err(RunError::ListingFailure)?;
        info!(jobs = jobs.len(), "jobs listed");

        self.transition(RunState::Processing);
        progress.phase("Processing builds");
        let window_start = now - Duration::hours(i64::from(self.config.window_hours));
        let mut aggregator = StreamAggregator::new(&self.config, now);

        for (i, job) in jobs.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(RunError::Cancelled);
            }
            progress.job_started(&job.name, i + 1, jobs.len());
            self.process_job(&job.name, window_start, &mut aggregator, cancel, progress)
                .await;
        }

        let report = aggregator.snapshot();
        self.transition(RunState::Aggregated);
        Ok(report)
    }

    #[instrument(skip_all, fields(job = job_name))]
    async fn process_job(
        &self,
        job_name: &str,
        window_start: DateTime<Utc>,
        aggregator: &mut StreamAggregator,
        cancel: &CancellationToken,
        progress: &dyn ProgressReporter,
    ) {
        let listed = match self
            .collaborators
            .builds
            .list_failed_builds(job_name, window_start)
            .await
        {
            Ok(builds) => builds,
            Err(e) => {
                warn!(error = %e, "failed to list builds, skipping job");
                aggregator.note_listing_failure(job_name, e.to_string());
                return;
            }
        };

        let mut eligible: Vec<BuildRef> = listed
            .into_iter()
            .filter(|b| b.timestamp >= window_start)
            .collect();
        let cap = self.config.max_builds_per_job;
        if eligible.len() > cap {
            let truncated = eligible.len() - cap;
            eligible.truncate(cap);
            info!(truncated, cap, "build cap reached");
            aggregator.note_truncated(job_name, truncated);
        }
        if eligible.is_empty() {
            debug!("no failed builds in window");
            return;
        }

        let semaphore = Arc::new(Semaphore::new(self.config.fetch_concurrency));
        let mut handles = Vec::with_capacity(eligible.len());
        for build in eligible {
            let build_id = build.build_id.clone();
            let semaphore = Arc::clone(&semaphore);
            let processor = Arc::clone(&self.processor);
            let logs = Arc::clone(&self.collaborators.logs);
            let cancel = cancel.clone();
            let job = job_name.to_string();

            let handle = tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return None;
                };
                tokio::select! {
                    _ = cancel.cancelled() => None,
                    result = processor.process(&job, &build, logs.as_ref()) => Some(result),
                }
            });
            handles.push((build_id, handle));
        }

        for (build_id, handle) in handles {
            let result: Result<Vec<FailureRecord>> = match handle.await {
                Ok(Some(result)) => result,
                // Cancelled; the run is about to fail.
                Ok(None) => return,
                Err(e) => Err(LogsweepError::Network(format!("fetch task failed: {e}"))),
            };

            match result {
                Ok(records) if records.is_empty() => {
                    debug!(build_id = %build_id, "no failure signature found");
                    aggregator.note_without_signature(job_name);
                    progress.build_processed(job_name, &build_id, Some(0));
                }
                Ok(records) => {
                    let count = records.len();
                    for record in records {
                        aggregator.ingest(record);
                    }
                    progress.build_processed(job_name, &build_id, Some(count));
                }
                Err(e) => {
                    warn!(build_id = %build_id, error = %e, "failed to fetch build log, skipping build");
                    aggregator.note_fetch_failure(job_name, &build_id, e.to_string());
                    progress.build_processed(job_name, &build_id, None);
                }
            }
        }
    }
}
