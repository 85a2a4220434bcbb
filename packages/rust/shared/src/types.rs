//! Core domain types for logsweep runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Build server references
// ---------------------------------------------------------------------------

/// A job as returned by the job lister.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRef {
    /// Job name, folder segments separated by `/`.
    pub name: String,
    /// Link to the job page, when the server reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Identifier of the most recent build, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_build_ref: Option<String>,
}

/// A failed (or unstable) build inside the sweep window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRef {
    /// Build number, unique within the job.
    pub build_id: String,
    /// Link to the build page.
    pub build_url: String,
    /// When the build started.
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// FailureRecord
// ---------------------------------------------------------------------------

/// One detected failure occurrence in one build log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub job_name: String,
    pub build_id: String,
    pub build_url: String,
    /// Exception type, or a generic marker such as `ERROR` or `Exception`.
    pub signature: String,
    /// Trailing text of the matched line, trimmed. May be empty.
    pub message: String,
    /// Evidence lines ending at the matched line.
    pub context: Vec<String>,
}

// ---------------------------------------------------------------------------
// ReportId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for report identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportId(pub Uuid);

impl ReportId {
    /// Generate a new time-sortable report identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// First eight hex characters, for message footers.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for ReportId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ReportId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Immutable snapshot of one run, handed to the notifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub generated_at: DateTime<Utc>,
    /// Sweep window used for this run.
    pub window_hours: u32,
    /// Per-job build cap used for this run.
    pub max_builds_per_job: usize,
    /// Jobs ordered by failed builds descending, then name ascending.
    pub jobs: Vec<JobReport>,
    pub jobs_with_failures: usize,
    pub total_failed_builds_processed: usize,
    /// Builds whose log could not be fetched.
    pub skipped_builds: usize,
    /// Recoverable problems and informational notes collected during the run.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl Report {
    /// True when no job produced a failure record.
    pub fn is_healthy(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// Aggregated view of one job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub job_name: String,
    /// Distinct builds that produced at least one record.
    pub total_failed_builds: usize,
    /// Eligible builds skipped because the job hit the per-job cap.
    #[serde(default)]
    pub builds_truncated: usize,
    /// Builds of this job whose log fetch failed.
    #[serde(default)]
    pub fetch_failures: usize,
    /// Fetched builds whose log had no recognizable failure.
    #[serde(default)]
    pub builds_without_signature: usize,
    /// Ordered by occurrence count descending, then signature ascending.
    pub signatures: Vec<SignatureReport>,
}

/// Aggregated view of one (job, signature) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureReport {
    pub signature: String,
    pub occurrence_count: usize,
    pub messages: Vec<MessageReport>,
    /// Occurrences of messages beyond the distinct-message cap.
    pub overflow_unique_count: usize,
}

/// One tracked, normalized message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageReport {
    pub text: String,
    pub count: usize,
    /// First-seen build URLs, capped.
    pub build_urls: Vec<String>,
    /// Context lines of the first occurrence.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sample_context: Vec<String>,
}

/// A non-fatal event surfaced in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub job_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A build's log could not be fetched; the build was skipped.
    BuildFetchFailure,
    /// A job's failed builds could not be listed; the job was skipped.
    BuildListingFailure,
    /// A job had more eligible builds than the per-job cap.
    Truncated,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_id_short_is_prefix() {
        let id = ReportId::new();
        let short = id.short();
        assert_eq!(short.len(), 8);
        assert!(id.0.simple().to_string().starts_with(&short));
    }

    #[test]
    fn report_serialization_skips_empty_diagnostics() {
        let report = Report {
            id: ReportId::new(),
            generated_at: Utc::now(),
            window_hours: 24,
            max_builds_per_job: 100,
            jobs: vec![],
            jobs_with_failures: 0,
            total_failed_builds_processed: 0,
            skipped_builds: 0,
            diagnostics: vec![],
        };

        let json = serde_json::to_string(&report).expect("serialize");
        assert!(!json.contains("diagnostics"));
        let parsed: Report = serde_json::from_str(&json).expect("deserialize");
        assert!(parsed.is_healthy());
    }

    #[test]
    fn diagnostic_kind_is_snake_case() {
        let json = serde_json::to_string(&DiagnosticKind::BuildFetchFailure).unwrap();
        assert_eq!(json, "\"build_fetch_failure\"");
    }
}
