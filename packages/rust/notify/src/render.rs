//! Report rendering: Slack Block Kit payloads and a plain-text summary.

use std::fmt::Write as _;

use logsweep_shared::{JobReport, Report, SignatureReport};
use serde_json::{Value, json};

/// Slack rejects section text longer than this.
pub const SECTION_TEXT_LIMIT: usize = 3000;

/// Slack rejects messages with more blocks than this.
pub const MAX_BLOCKS_PER_MESSAGE: usize = 50;

/// Build links shown per signature before "and N more".
pub const LINKS_SHOWN: usize = 3;

/// Longest failure preview placed in a code block.
const PREVIEW_MAX_CHARS: usize = 500;

const HEALTHY_TEXT: &str =
    "*All systems healthy!* No failed builds in the specified time window.";

/// Rendering settings that do not come from the report itself.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// When set, job names link to `{jenkins_url}/job/{name}/`.
    pub jenkins_url: Option<String>,
}

/// `Jenkins Health Report Last 24 Hours`
pub fn header_text(report: &Report) -> String {
    let unit = if report.window_hours == 1 { "Hour" } else { "Hours" };
    format!("Jenkins Health Report Last {} {unit}", report.window_hours)
}

/// Escape the characters Slack treats as markup.
pub fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Cut `text` to at most `max` characters, marking the cut with `...`.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

// ---------------------------------------------------------------------------
// Block Kit
// ---------------------------------------------------------------------------

/// All blocks for `report`, in display order. Split with [`split_messages`].
pub fn render_blocks(report: &Report, opts: &RenderOptions) -> Vec<Value> {
    let mut blocks = vec![
        json!({
            "type": "header",
            "text": {"type": "plain_text", "text": header_text(report)}
        }),
        summary_context(report),
    ];

    if report.is_healthy() {
        blocks.push(divider());
        blocks.push(section(HEALTHY_TEXT));
    } else {
        for job in &report.jobs {
            blocks.push(divider());
            blocks.push(section(&job_section_text(job, opts)));
        }
    }

    blocks.push(json!({
        "type": "context",
        "elements": [{"type": "mrkdwn", "text": format!("Report `{}`", report.id.short())}]
    }));
    blocks
}

/// Chunk blocks into messages Slack will accept.
pub fn split_messages(blocks: Vec<Value>) -> Vec<Vec<Value>> {
    blocks
        .chunks(MAX_BLOCKS_PER_MESSAGE)
        .map(<[Value]>::to_vec)
        .collect()
}

fn summary_context(report: &Report) -> Value {
    let mut elements = vec![
        plain(format!("Failed Jobs: {}", report.jobs_with_failures)),
        plain(format!("Failed Builds: {}", report.total_failed_builds_processed)),
    ];
    if report.skipped_builds > 0 {
        elements.push(plain(format!("Skipped Builds: {}", report.skipped_builds)));
    }
    json!({"type": "context", "elements": elements})
}

fn plain(text: String) -> Value {
    json!({"type": "plain_text", "emoji": true, "text": text})
}

fn divider() -> Value {
    json!({"type": "divider"})
}

fn section(text: &str) -> Value {
    json!({
        "type": "section",
        "text": {"type": "mrkdwn", "text": truncate_chars(text, SECTION_TEXT_LIMIT)}
    })
}

fn job_section_text(job: &JobReport, opts: &RenderOptions) -> String {
    let name = escape(&job.job_name);
    let link = match &opts.jenkins_url {
        Some(base) => format!("<{}/job/{}/|{name}>", base.trim_end_matches('/'), job.job_name),
        None => name,
    };
    // Builds past the per-job cap were never scanned, so every count is a floor.
    let plus = if job.builds_truncated > 0 { "+" } else { "" };
    let mut text = format!("*{link}* ({}{plus} failures)", job.total_failed_builds);

    for sig in &job.signatures {
        text.push_str("\n\n");
        text.push_str(&signature_text(sig, plus));
    }
    text
}

fn signature_text(sig: &SignatureReport, plus: &str) -> String {
    let count = format!("x{}{plus}", sig.occurrence_count);
    let preview = escape(&truncate_chars(&preview_line(sig), PREVIEW_MAX_CHARS));
    let mut text = format!("*{}* ({count})\n```\n{preview}\n```", escape(&sig.signature));

    let urls = signature_urls(sig);
    if !urls.is_empty() {
        let links: Vec<String> = urls
            .iter()
            .take(LINKS_SHOWN)
            .map(|url| format!("<{url}|{}>", build_label(url)))
            .collect();
        let _ = write!(text, "\nAppeared in {}", links.join(", "));
        if urls.len() > LINKS_SHOWN {
            let _ = write!(text, " and {} more", urls.len() - LINKS_SHOWN);
        }
    }
    text
}

/// The matched line of the most frequent message, else its text.
fn preview_line(sig: &SignatureReport) -> String {
    let Some(top) = sig.messages.first() else {
        return sig.signature.clone();
    };
    match top.sample_context.last() {
        Some(line) => line.trim().to_string(),
        None if top.text.is_empty() => sig.signature.clone(),
        None => format!("{}: {}", sig.signature, top.text),
    }
}

/// Distinct build URLs across tracked messages, most frequent message first.
fn signature_urls(sig: &SignatureReport) -> Vec<&str> {
    let mut urls: Vec<&str> = Vec::new();
    for url in sig.messages.iter().flat_map(|m| m.build_urls.iter()) {
        if !urls.contains(&url.as_str()) {
            urls.push(url);
        }
    }
    urls
}

/// Last non-empty path segment: `.../job/api/42/` → `42`.
fn build_label(url: &str) -> &str {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(url)
}

// ---------------------------------------------------------------------------
// Plain text
// ---------------------------------------------------------------------------

/// Human-readable summary for terminals and logs.
pub fn render_text(report: &Report) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== {} ===", header_text(report));
    let _ = writeln!(
        out,
        "Failed jobs: {}  Failed builds: {}  Skipped builds: {}",
        report.jobs_with_failures, report.total_failed_builds_processed, report.skipped_builds
    );

    if report.is_healthy() {
        let _ = writeln!(out, "\nAll systems healthy. No failed builds in the window.");
    }

    for job in &report.jobs {
        let plus = if job.builds_truncated > 0 { "+" } else { "" };
        let _ = writeln!(out, "\n{} ({}{plus} failed builds)", job.job_name, job.total_failed_builds);
        for sig in &job.signatures {
            let _ = writeln!(out, "  {} ({} occurrences)", sig.signature, sig.occurrence_count);
            let _ = writeln!(out, "    Exception: {}", preview_line(sig));
            let urls = signature_urls(sig);
            if urls.is_empty() {
                let _ = writeln!(out, "    Build URLs: none retained");
                continue;
            }
            let _ = writeln!(out, "    Build URLs:");
            for url in urls.iter().take(LINKS_SHOWN) {
                let _ = writeln!(out, "      {url}");
            }
            if urls.len() > LINKS_SHOWN {
                let _ = writeln!(out, "      ... and {} more", urls.len() - LINKS_SHOWN);
            }
            if sig.overflow_unique_count > 0 {
                let _ = writeln!(
                    out,
                    "    {} more occurrence(s) with other messages",
                    sig.overflow_unique_count
                );
            }
        }
    }

    if !report.diagnostics.is_empty() {
        let _ = writeln!(out, "\nNotes:");
        for d in &report.diagnostics {
            match &d.build_id {
                Some(id) => {
                    let _ = writeln!(out, "  [{:?}] {} #{id}: {}", d.kind, d.job_name, d.message);
                }
                None => {
                    let _ = writeln!(out, "  [{:?}] {}: {}", d.kind, d.job_name, d.message);
                }
            }
        }
    }
    out
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::Utc;
    use logsweep_shared::{Diagnostic, DiagnosticKind, MessageReport, ReportId};

    use super::*;

    pub(crate) fn report_with(jobs: Vec<JobReport>) -> Report {
        Report {
            id: ReportId::new(),
            generated_at: Utc::now(),
            window_hours: 24,
            max_builds_per_job: 100,
            jobs_with_failures: jobs.len(),
            total_failed_builds_processed: jobs.iter().map(|j| j.total_failed_builds).sum(),
            jobs,
            skipped_builds: 0,
            diagnostics: vec![],
        }
    }

    pub(crate) fn job(name: &str, builds: usize, urls: usize) -> JobReport {
        JobReport {
            job_name: name.into(),
            total_failed_builds: builds,
            builds_truncated: 0,
            fetch_failures: 0,
            builds_without_signature: 0,
            signatures: vec![SignatureReport {
                signature: "KeyError".into(),
                occurrence_count: builds,
                messages: vec![MessageReport {
                    text: "'x'".into(),
                    count: builds,
                    build_urls: (1..=urls)
                        .map(|n| format!("https://ci.example.com/job/{name}/{n}/"))
                        .collect(),
                    sample_context: vec!["step".into(), "KeyError: 'x' <map>".into()],
                }],
                overflow_unique_count: 0,
            }],
        }
    }

    fn section_texts(blocks: &[Value]) -> Vec<String> {
        blocks
            .iter()
            .filter(|b| b["type"] == "section")
            .map(|b| b["text"]["text"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn header_pluralizes_hours() {
        let mut report = report_with(vec![]);
        assert_eq!(header_text(&report), "Jenkins Health Report Last 24 Hours");
        report.window_hours = 1;
        assert_eq!(header_text(&report), "Jenkins Health Report Last 1 Hour");
    }

    #[test]
    fn healthy_report_says_so() {
        let blocks = render_blocks(&report_with(vec![]), &RenderOptions::default());
        assert_eq!(blocks[0]["type"], "header");
        let texts = section_texts(&blocks);
        assert_eq!(texts, vec![HEALTHY_TEXT.to_string()]);
    }

    #[test]
    fn job_section_lists_links_and_more() {
        let report = report_with(vec![job("api", 5, 5)]);
        let opts = RenderOptions {
            jenkins_url: Some("https://ci.example.com/".into()),
        };
        let texts = section_texts(&render_blocks(&report, &opts));
        let text = &texts[0];
        assert!(text.starts_with("*<https://ci.example.com/job/api/|api>* (5 failures)"));
        assert!(text.contains("*KeyError* (x5)"));
        assert!(text.contains("KeyError: 'x' &lt;map&gt;"));
        assert!(text.contains(
            "Appeared in <https://ci.example.com/job/api/1/|1>, <https://ci.example.com/job/api/2/|2>, <https://ci.example.com/job/api/3/|3> and 2 more"
        ));
    }

    #[test]
    fn capped_counts_get_plus() {
        let mut j = job("api", 3, 1);
        j.builds_truncated = 4;
        let mut report = report_with(vec![j]);
        report.max_builds_per_job = 3;
        let text = &section_texts(&render_blocks(&report, &RenderOptions::default()))[0];
        assert!(text.starts_with("*api* (3+ failures)"));
        assert!(text.contains("(x3+)"));
    }

    #[test]
    fn counts_show_real_occurrences() {
        // One build with 150 matching lines, well past the build cap of 100.
        let mut j = job("api", 1, 1);
        j.signatures[0].occurrence_count = 150;
        j.signatures[0].messages[0].count = 150;
        let report = report_with(vec![j.clone()]);
        let text = &section_texts(&render_blocks(&report, &RenderOptions::default()))[0];
        assert!(text.starts_with("*api* (1 failures)"));
        assert!(text.contains("*KeyError* (x150)\n"));

        j.builds_truncated = 2;
        let report = report_with(vec![j]);
        let text = &section_texts(&render_blocks(&report, &RenderOptions::default()))[0];
        assert!(text.contains("*KeyError* (x150+)\n"));
    }

    #[test]
    fn sections_respect_slack_limit() {
        let mut j = job("api", 1, 1);
        for i in 0..200 {
            let mut sig = j.signatures[0].clone();
            sig.signature = format!("pkg.Error{i:03}");
            j.signatures.push(sig);
        }
        let blocks = render_blocks(&report_with(vec![j]), &RenderOptions::default());
        for text in section_texts(&blocks) {
            assert!(text.chars().count() <= SECTION_TEXT_LIMIT);
        }
    }

    #[test]
    fn many_jobs_split_into_messages() {
        let jobs: Vec<_> = (0..40).map(|i| job(&format!("job-{i:02}"), 1, 1)).collect();
        let blocks = render_blocks(&report_with(jobs), &RenderOptions::default());
        // header + context + 40 * (divider + section) + footer
        assert_eq!(blocks.len(), 83);
        let messages = split_messages(blocks);
        assert_eq!(messages.len(), 2);
        assert!(messages.iter().all(|m| m.len() <= MAX_BLOCKS_PER_MESSAGE));
    }

    #[test]
    fn skipped_builds_appear_in_context() {
        let mut report = report_with(vec![job("api", 1, 1)]);
        report.skipped_builds = 2;
        let blocks = render_blocks(&report, &RenderOptions::default());
        let context = blocks[1].to_string();
        assert!(context.contains("Skipped Builds: 2"));
    }

    #[test]
    fn escape_and_truncate() {
        assert_eq!(escape("a < b && c > d"), "a &lt; b &amp;&amp; c &gt; d");
        assert_eq!(truncate_chars("abcdef", 5), "ab...");
        assert_eq!(truncate_chars("abc", 5), "abc");
        assert_eq!(build_label("https://ci/job/api/42/"), "42");
        assert_eq!(build_label("https://ci/job/api/42"), "42");
    }

    #[test]
    fn text_summary_lists_jobs_and_notes() {
        let mut report = report_with(vec![job("api", 4, 4)]);
        report.skipped_builds = 1;
        report.diagnostics.push(Diagnostic {
            kind: DiagnosticKind::BuildFetchFailure,
            job_name: "api".into(),
            build_id: Some("5".into()),
            message: "network error: reset".into(),
        });
        let text = render_text(&report);
        assert!(text.contains("api (4 failed builds)"));
        assert!(text.contains("KeyError (4 occurrences)"));
        assert!(text.contains("... and 1 more"));
        assert!(text.contains("[BuildFetchFailure] api #5: network error: reset"));
    }
}
