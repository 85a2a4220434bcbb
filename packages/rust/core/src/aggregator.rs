//! Bounded per-job, per-signature aggregation.
//!
//! The aggregator is the only mutable state of a run. It is owned by the
//! coordinator's processing loop and never shared; records are folded in one
//! at a time and [`StreamAggregator::snapshot`] produces the ordered report.
//!
//! Counts are never capped. Caps only bound how much *detail* (distinct
//! message texts, build URLs) is retained, so for every group
//! `occurrence_count == sum(message counts) + overflow_unique_count`.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use logsweep_analyzer::normalize_message;
use logsweep_shared::{
    AnalysisConfig, Diagnostic, DiagnosticKind, FailureRecord, JobReport, MessageReport, Report,
    ReportId, SignatureReport,
};

/// Detail caps applied during ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregationLimits {
    pub max_unique_messages_per_group: usize,
    pub max_urls_per_message: usize,
}

impl From<&AnalysisConfig> for AggregationLimits {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            max_unique_messages_per_group: config.max_unique_messages_per_group,
            max_urls_per_message: config.max_urls_per_message,
        }
    }
}

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct MessageEntry {
    text: String,
    count: usize,
    build_urls: Vec<String>,
    sample_context: Vec<String>,
}

#[derive(Debug, Default)]
struct SignatureGroup {
    occurrence_count: usize,
    /// Tracked messages in first-seen order.
    messages: Vec<MessageEntry>,
    /// Normalized text -> position in `messages`.
    index: HashMap<String, usize>,
    overflow_unique_count: usize,
}

impl SignatureGroup {
    fn ingest(&mut self, record: FailureRecord, limits: AggregationLimits) {
        self.occurrence_count += 1;
        let key = normalize_message(&record.message);

        if let Some(&pos) = self.index.get(&key) {
            let entry = &mut self.messages[pos];
            entry.count += 1;
            if entry.build_urls.len() < limits.max_urls_per_message
                && !entry.build_urls.contains(&record.build_url)
            {
                entry.build_urls.push(record.build_url);
            }
            return;
        }

        if self.messages.len() < limits.max_unique_messages_per_group {
            self.index.insert(key.clone(), self.messages.len());
            let build_urls = if limits.max_urls_per_message > 0 {
                vec![record.build_url]
            } else {
                Vec::new()
            };
            self.messages.push(MessageEntry {
                text: key,
                count: 1,
                build_urls,
                sample_context: record.context,
            });
        } else {
            self.overflow_unique_count += 1;
        }
    }

    fn report(&self, signature: &str) -> SignatureReport {
        let mut messages: Vec<MessageReport> = self
            .messages
            .iter()
            .map(|m| MessageReport {
                text: m.text.clone(),
                count: m.count,
                build_urls: m.build_urls.clone(),
                sample_context: m.sample_context.clone(),
            })
            .collect();
        // Stable: equal counts keep first-seen order.
        messages.sort_by_key(|m| Reverse(m.count));

        SignatureReport {
            signature: signature.to_string(),
            occurrence_count: self.occurrence_count,
            messages,
            overflow_unique_count: self.overflow_unique_count,
        }
    }
}

#[derive(Debug, Default)]
struct JobAggregate {
    seen_builds: HashSet<String>,
    groups: HashMap<String, SignatureGroup>,
    builds_truncated: usize,
    fetch_failures: usize,
    builds_without_signature: usize,
}

impl JobAggregate {
    fn report(&self, job_name: &str) -> JobReport {
        let mut signatures: Vec<SignatureReport> = self
            .groups
            .iter()
            .map(|(sig, group)| group.report(sig))
            .collect();
        signatures.sort_by(|a, b| {
            b.occurrence_count
                .cmp(&a.occurrence_count)
                .then_with(|| a.signature.cmp(&b.signature))
        });

        JobReport {
            job_name: job_name.to_string(),
            total_failed_builds: self.seen_builds.len(),
            builds_truncated: self.builds_truncated,
            fetch_failures: self.fetch_failures,
            builds_without_signature: self.builds_without_signature,
            signatures,
        }
    }
}

// ---------------------------------------------------------------------------
// StreamAggregator
// ---------------------------------------------------------------------------

/// Folds failure records into per-job aggregates for one run.
#[derive(Debug)]
pub struct StreamAggregator {
    id: ReportId,
    generated_at: DateTime<Utc>,
    window_hours: u32,
    max_builds_per_job: usize,
    limits: AggregationLimits,
    jobs: HashMap<String, JobAggregate>,
    skipped_builds: usize,
    diagnostics: Vec<Diagnostic>,
}

impl StreamAggregator {
    /// A fresh aggregator for a run starting at `started_at`.
    pub fn new(config: &AnalysisConfig, started_at: DateTime<Utc>) -> Self {
        Self {
            id: ReportId::new(),
            generated_at: started_at,
            window_hours: config.window_hours,
            max_builds_per_job: config.max_builds_per_job,
            limits: AggregationLimits::from(config),
            jobs: HashMap::new(),
            skipped_builds: 0,
            diagnostics: Vec::new(),
        }
    }

    /// Fold one record into its job and signature group.
    pub fn ingest(&mut self, record: FailureRecord) {
        let limits = self.limits;
        let job = self.jobs.entry(record.job_name.clone()).or_default();
        job.seen_builds.insert(record.build_id.clone());
        job.groups
            .entry(record.signature.clone())
            .or_default()
            .ingest(record, limits);
    }

    /// `count` eligible builds of `job_name` were dropped by the per-job cap.
    pub fn note_truncated(&mut self, job_name: &str, count: usize) {
        self.jobs.entry(job_name.to_string()).or_default().builds_truncated += count;
        self.diagnostics.push(Diagnostic {
            kind: DiagnosticKind::Truncated,
            job_name: job_name.to_string(),
            build_id: None,
            message: format!(
                "{count} more failed build(s) in the window beyond the cap of {}",
                self.max_builds_per_job
            ),
        });
    }

    /// A build's log could not be fetched; the build is skipped.
    pub fn note_fetch_failure(&mut self, job_name: &str, build_id: &str, message: impl Into<String>) {
        self.jobs.entry(job_name.to_string()).or_default().fetch_failures += 1;
        self.skipped_builds += 1;
        self.diagnostics.push(Diagnostic {
            kind: DiagnosticKind::BuildFetchFailure,
            job_name: job_name.to_string(),
            build_id: Some(build_id.to_string()),
            message: message.into(),
        });
    }

    /// The failed builds of `job_name` could not be listed; the job is skipped.
    pub fn note_listing_failure(&mut self, job_name: &str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            kind: DiagnosticKind::BuildListingFailure,
            job_name: job_name.to_string(),
            build_id: None,
            message: message.into(),
        });
    }

    /// A fetched build produced no failure record.
    pub fn note_without_signature(&mut self, job_name: &str) {
        self.jobs
            .entry(job_name.to_string())
            .or_default()
            .builds_without_signature += 1;
    }

    /// Ordered, immutable view of the current state. Repeated calls with no
    /// ingestion in between return equal reports.
    pub fn snapshot(&self) -> Report {
        let mut jobs: Vec<JobReport> = self
            .jobs
            .iter()
            .filter(|(_, job)| !job.seen_builds.is_empty())
            .map(|(name, job)| job.report(name))
            .collect();
        jobs.sort_by(|a, b| {
            b.total_failed_builds
                .cmp(&a.total_failed_builds)
                .then_with(|| a.job_name.cmp(&b.job_name))
        });

        Report {
            id: self.id.clone(),
            generated_at: self.generated_at,
            window_hours: self.window_hours,
            max_builds_per_job: self.max_builds_per_job,
            jobs_with_failures: jobs.len(),
            total_failed_builds_processed: jobs.iter().map(|j| j.total_failed_builds).sum(),
            jobs,
            skipped_builds: self.skipped_builds,
            diagnostics: self.diagnostics.clone(),
        }
    }
}
