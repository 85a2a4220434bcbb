//! Application configuration for logsweep.
//!
//! User config lives at `~/.logsweep/logsweep.toml`.
//! CLI flags override config file values, which override defaults.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LogsweepError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "logsweep.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".logsweep";

/// Lines starting with an ISO-ish date and time mark the start of a log step.
pub const DEFAULT_TIMESTAMP_PATTERN: &str = r"^\[?\d{4}-\d{2}-\d{2}[ T]\d{2}:\d{2}:\d{2}";

// ---------------------------------------------------------------------------
// Config structs (matching logsweep.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Sweep and aggregation bounds.
    #[serde(default)]
    pub analysis: AnalysisSection,

    /// Build server connection.
    #[serde(default)]
    pub jenkins: JenkinsSection,

    /// Slack delivery.
    #[serde(default)]
    pub slack: SlackSection,
}

/// `[analysis]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSection {
    /// Only builds newer than this many hours are considered.
    #[serde(default = "default_window_hours")]
    pub window_hours: u32,

    /// Maximum failed builds processed per job.
    #[serde(default = "default_max_builds_per_job")]
    pub max_builds_per_job: usize,

    /// Exception signatures that are never reported.
    #[serde(default)]
    pub ignore_exceptions: Vec<String>,

    /// Maximum evidence lines kept per failure.
    #[serde(default = "default_max_context_lines")]
    pub max_context_lines: usize,

    /// Distinct messages tracked per (job, signature) before overflow counting.
    #[serde(default = "default_max_unique_messages")]
    pub max_unique_messages_per_group: usize,

    /// Build URLs kept per tracked message.
    #[serde(default = "default_max_urls_per_message")]
    pub max_urls_per_message: usize,

    /// Regex recognizing timestamp lines that open a context window.
    #[serde(default = "default_timestamp_pattern")]
    pub timestamp_pattern: String,

    /// Build logs fetched in parallel. `1` keeps one build in flight.
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
}

impl Default for AnalysisSection {
    fn default() -> Self {
        Self {
            window_hours: default_window_hours(),
            max_builds_per_job: default_max_builds_per_job(),
            ignore_exceptions: Vec::new(),
            max_context_lines: default_max_context_lines(),
            max_unique_messages_per_group: default_max_unique_messages(),
            max_urls_per_message: default_max_urls_per_message(),
            timestamp_pattern: default_timestamp_pattern(),
            fetch_concurrency: default_fetch_concurrency(),
        }
    }
}

fn default_window_hours() -> u32 {
    24
}
fn default_max_builds_per_job() -> usize {
    100
}
fn default_max_context_lines() -> usize {
    30
}
fn default_max_unique_messages() -> usize {
    10
}
fn default_max_urls_per_message() -> usize {
    3
}
fn default_timestamp_pattern() -> String {
    DEFAULT_TIMESTAMP_PATTERN.into()
}
fn default_fetch_concurrency() -> usize {
    1
}

/// `[jenkins]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JenkinsSection {
    /// Jenkins base URL. Usually supplied through `JENKINS_URL`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// API user. Usually supplied through `JENKINS_USER`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Name of the env var holding the API token (never store the token itself).
    #[serde(default = "default_jenkins_token_env")]
    pub token_env: String,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Stop listing a job's failed builds after this many. Unset scans the
    /// whole window, so builds beyond the per-job cap are still counted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_failed_builds: Option<usize>,
}

impl Default for JenkinsSection {
    fn default() -> Self {
        Self {
            url: None,
            user: None,
            token_env: default_jenkins_token_env(),
            timeout_secs: default_timeout_secs(),
            max_failed_builds: None,
        }
    }
}

fn default_jenkins_token_env() -> String {
    "JENKINS_TOKEN".into()
}
fn default_timeout_secs() -> u64 {
    60
}

/// `[slack]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackSection {
    /// Target channel for the health report.
    #[serde(default = "default_slack_channel")]
    pub channel: String,

    /// Name of the env var holding the bot token.
    #[serde(default = "default_slack_token_env")]
    pub token_env: String,
}

impl Default for SlackSection {
    fn default() -> Self {
        Self {
            channel: default_slack_channel(),
            token_env: default_slack_token_env(),
        }
    }
}

fn default_slack_channel() -> String {
    "#jenkins-health".into()
}
fn default_slack_token_env() -> String {
    "SLACK_BOT_TOKEN".into()
}

// ---------------------------------------------------------------------------
// Analysis config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime sweep configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Lower bound on build timestamp eligibility, in hours before now.
    pub window_hours: u32,
    /// Failed builds processed per job; the rest are reported as truncated.
    pub max_builds_per_job: usize,
    /// Signatures dropped at extraction (case-sensitive exact match).
    pub ignore_exceptions: HashSet<String>,
    /// Context window bound.
    pub max_context_lines: usize,
    /// Distinct messages tracked per signature group.
    pub max_unique_messages_per_group: usize,
    /// Build URLs retained per tracked message.
    pub max_urls_per_message: usize,
    /// Timestamp line regex.
    pub timestamp_pattern: String,
    /// Parallel log fetches.
    pub fetch_concurrency: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for AnalysisConfig {
    fn from(config: &AppConfig) -> Self {
        let a = &config.analysis;
        Self {
            window_hours: a.window_hours,
            max_builds_per_job: a.max_builds_per_job,
            ignore_exceptions: a.ignore_exceptions.iter().cloned().collect(),
            max_context_lines: a.max_context_lines,
            max_unique_messages_per_group: a.max_unique_messages_per_group,
            max_urls_per_message: a.max_urls_per_message,
            timestamp_pattern: a.timestamp_pattern.clone(),
            fetch_concurrency: a.fetch_concurrency,
        }
    }
}

impl AnalysisConfig {
    /// Reject bounds that would make the sweep meaningless.
    pub fn validate(&self) -> Result<()> {
        let caps = [
            ("max_builds_per_job", self.max_builds_per_job),
            ("max_context_lines", self.max_context_lines),
            (
                "max_unique_messages_per_group",
                self.max_unique_messages_per_group,
            ),
            ("max_urls_per_message", self.max_urls_per_message),
            ("fetch_concurrency", self.fetch_concurrency),
        ];
        for (name, value) in caps {
            if value == 0 {
                return Err(LogsweepError::config(format!("{name} must be at least 1")));
            }
        }

        regex::Regex::new(&self.timestamp_pattern).map_err(|e| {
            LogsweepError::config(format!(
                "invalid timestamp_pattern '{}': {e}",
                self.timestamp_pattern
            ))
        })?;

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.logsweep/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| LogsweepError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.logsweep/logsweep.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| LogsweepError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| LogsweepError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| LogsweepError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| LogsweepError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| LogsweepError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read a secret from the env var named in config; missing or empty is a config error.
pub fn resolve_secret(var_name: &str, purpose: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(LogsweepError::config(format!(
            "{purpose} not found. Set the {var_name} environment variable."
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("window_hours"));
        assert!(toml_str.contains("JENKINS_TOKEN"));
        assert!(toml_str.contains("SLACK_BOT_TOKEN"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.analysis.window_hours, 24);
        assert_eq!(parsed.analysis.max_builds_per_job, 100);
        assert_eq!(parsed.slack.channel, "#jenkins-health");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[analysis]
window_hours = 1
ignore_exceptions = ["Warning", "DeprecationWarning"]

[jenkins]
url = "https://ci.example.com"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        let analysis = AnalysisConfig::from(&config);
        assert_eq!(analysis.window_hours, 1);
        assert_eq!(analysis.max_urls_per_message, 3);
        assert!(analysis.ignore_exceptions.contains("Warning"));
        assert_eq!(config.jenkins.url.as_deref(), Some("https://ci.example.com"));
        assert_eq!(config.jenkins.timeout_secs, 60);
        assert_eq!(config.jenkins.max_failed_builds, None);
    }

    #[test]
    fn jenkins_listing_bound_is_optional() {
        let config: AppConfig = toml::from_str("[jenkins]\nmax_failed_builds = 500\n").expect("parse");
        assert_eq!(config.jenkins.max_failed_builds, Some(500));

        let toml_str = toml::to_string_pretty(&AppConfig::default()).expect("serialize");
        assert!(!toml_str.contains("max_failed_builds"));
    }

    #[test]
    fn validate_rejects_zero_caps() {
        let config = AnalysisConfig {
            max_urls_per_message: 0,
            ..AnalysisConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_urls_per_message"));
    }

    #[test]
    fn validate_rejects_bad_timestamp_regex() {
        let config = AnalysisConfig {
            timestamp_pattern: "([".into(),
            ..AnalysisConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(AnalysisConfig::default().validate().is_ok());
    }

    #[test]
    fn missing_secret_is_config_error() {
        // Use a unique env var name to avoid interfering with other tests
        let result = resolve_secret("LOGSWEEP_TEST_NONEXISTENT_TOKEN_12345", "Jenkins API token");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Jenkins API token not found"));
    }
}
