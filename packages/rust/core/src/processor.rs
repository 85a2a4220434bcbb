//! Per-build processing: fetch once, extract, select context, drop the text.

use logsweep_analyzer::{ContextSelector, SignatureExtractor};
use logsweep_shared::{AnalysisConfig, BuildRef, FailureRecord, LogFetcher, Result};
use tracing::{debug, instrument};

/// Turns one build's console text into failure records.
#[derive(Debug, Clone)]
pub struct BuildProcessor {
    extractor: SignatureExtractor,
    context: ContextSelector,
}

impl BuildProcessor {
    pub fn new(config: &AnalysisConfig) -> Result<Self> {
        Ok(Self {
            extractor: SignatureExtractor::new(config.ignore_exceptions.clone()),
            context: ContextSelector::new(&config.timestamp_pattern, config.max_context_lines)?,
        })
    }

    /// Fetch the build's log exactly once and extract its records.
    ///
    /// A fetch failure is returned as-is; the caller decides whether it is
    /// fatal. Records come back in log order.
    #[instrument(skip_all, fields(job = job_name, build_id = %build.build_id))]
    pub async fn process(
        &self,
        job_name: &str,
        build: &BuildRef,
        fetcher: &dyn LogFetcher,
    ) -> Result<Vec<FailureRecord>> {
        let text = fetcher
            .fetch_console_text(job_name, &build.build_id)
            .await?;
        let bytes = text.len();
        let records = self.records_from_log(job_name, build, text);
        debug!(bytes, records = records.len(), "build processed");
        Ok(records)
    }

    /// Extract records from already-fetched text. The text is consumed and
    /// released before this returns.
    pub fn records_from_log(
        &self,
        job_name: &str,
        build: &BuildRef,
        text: String,
    ) -> Vec<FailureRecord> {
        let lines: Vec<&str> = text.lines().collect();
        self.extractor
            .extract_lines(&lines)
            .map(|candidate| FailureRecord {
                job_name: job_name.to_string(),
                build_id: build.build_id.clone(),
                build_url: build.build_url.clone(),
                context: self.context.select(&lines, candidate.line_index),
                signature: candidate.signature,
                message: candidate.message,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;
    use logsweep_shared::LogsweepError;

    use super::*;

    fn build(id: &str) -> BuildRef {
        BuildRef {
            build_id: id.into(),
            build_url: format!("https://ci.example.com/job/api/{id}/"),
            timestamp: Utc::now(),
        }
    }

    fn processor(config: AnalysisConfig) -> BuildProcessor {
        BuildProcessor::new(&config).expect("valid config")
    }

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("../../../fixtures/logs/{name}")).expect("read fixture")
    }

    struct CountingFetcher {
        body: Option<String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LogFetcher for CountingFetcher {
        async fn fetch_console_text(&self, job_name: &str, build_id: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.body
                .clone()
                .ok_or_else(|| LogsweepError::Network(format!("{job_name}#{build_id}: reset")))
        }
    }

    #[test]
    fn single_typed_failure_with_timestamp_context() {
        let p = processor(AnalysisConfig {
            max_context_lines: 10,
            ..AnalysisConfig::default()
        });
        let records = p.records_from_log(
            "api",
            &build("1"),
            "2024-01-01T00:00:00 starting\nValueError: bad input\n".into(),
        );

        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.signature, "ValueError");
        assert_eq!(r.message, "bad input");
        assert_eq!(
            r.context,
            vec!["2024-01-01T00:00:00 starting", "ValueError: bad input"]
        );
        assert_eq!(r.job_name, "api");
        assert_eq!(r.build_url, "https://ci.example.com/job/api/1/");
    }

    #[test]
    fn ignored_signature_yields_no_records() {
        let p = processor(AnalysisConfig {
            ignore_exceptions: HashSet::from(["Warning".to_string()]),
            ..AnalysisConfig::default()
        });
        let records = p.records_from_log("api", &build("1"), "Warning: deprecated\n".into());
        assert!(records.is_empty());
    }

    #[test]
    fn records_follow_log_order() {
        let p = processor(AnalysisConfig::default());
        let records = p.records_from_log("payments", &build("9"), fixture("maven-build.log"));
        let sigs: Vec<_> = records.iter().map(|r| r.signature.as_str()).collect();
        assert_eq!(
            sigs,
            vec![
                "java.lang.IllegalStateException",
                "java.io.IOException",
                "ERROR",
                "ERROR"
            ]
        );
        // Window opens at the preceding timestamped test line.
        assert_eq!(records[0].context.len(), 2);
    }

    #[test]
    fn unexplained_trace_uses_catch_all() {
        let p = processor(AnalysisConfig::default());
        let records = p.records_from_log("deploy", &build("3"), fixture("unstructured.log"));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].signature, "Exception");
        assert_eq!(records[0].message, "");
        assert!(records[0].context.last().is_some_and(|l| l.contains("processTicksAndRejections")));
    }

    #[test]
    fn context_is_bounded() {
        let p = processor(AnalysisConfig {
            max_context_lines: 3,
            ..AnalysisConfig::default()
        });
        let records = p.records_from_log("etl", &build("4"), fixture("python-traceback.log"));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].signature, "ConnectionError");
        assert_eq!(records[0].context.len(), 3);
        assert_eq!(records[0].context[2], "ConnectionError: warehouse unreachable");
    }

    #[tokio::test]
    async fn process_fetches_exactly_once() {
        let fetcher = CountingFetcher {
            body: Some("ERROR: tests failed\n".into()),
            calls: AtomicUsize::new(0),
        };
        let p = processor(AnalysisConfig::default());
        let records = p.process("api", &build("2"), &fetcher).await.expect("process");
        assert_eq!(records.len(), 1);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fetch_failure_propagates() {
        let fetcher = CountingFetcher {
            body: None,
            calls: AtomicUsize::new(0),
        };
        let p = processor(AnalysisConfig::default());
        let err = p.process("api", &build("2"), &fetcher).await.unwrap_err();
        assert!(err.is_transient());
    }
}
