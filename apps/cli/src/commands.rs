//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use logsweep_core::{
    BuildProcessor, Collaborators, ProgressReporter, RunCoordinator, RunOutcome,
};
use logsweep_jenkins::{JenkinsClient, JenkinsOptions};
use logsweep_notify::{ConsoleNotifier, MultiNotifier, RenderOptions, SlackNotifier, SlackOptions};
use logsweep_shared::{
    AnalysisConfig, AppConfig, BuildRef, FailureRecord, Notifier, Report, init_config,
    load_config, resolve_secret,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// logsweep: aggregate recent CI build failures into one report.
#[derive(Parser)]
#[command(
    name = "logsweep",
    version,
    about = "Scan failed Jenkins builds, group their failures, and report to Slack.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Sweep the build server and deliver the report.
    Run(RunArgs),

    /// Extract failures from a local log file (no network).
    Analyze {
        /// Console log to scan.
        file: PathBuf,

        /// Print records as JSON.
        #[arg(long)]
        json: bool,

        /// Extra signatures to ignore (repeatable).
        #[arg(long = "ignore", value_name = "SIG")]
        ignore: Vec<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Flags for `logsweep run`. Each overrides the config file.
#[derive(Args, Debug, Default)]
pub(crate) struct RunArgs {
    /// Only builds from the last N hours.
    #[arg(long, env = "WINDOW_HOURS")]
    pub window_hours: Option<u32>,

    /// Failed builds processed per job.
    #[arg(long, env = "MAX_FAILURES_COUNT_PER_JOB")]
    pub max_builds: Option<usize>,

    /// Signatures to ignore, added to the configured list (repeatable).
    #[arg(long = "ignore", value_name = "SIG")]
    pub ignore: Vec<String>,

    /// Build logs fetched in parallel.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Print the report instead of posting it to Slack.
    #[arg(long)]
    pub dry_run: bool,

    /// Jenkins base URL.
    #[arg(long, env = "JENKINS_URL")]
    pub jenkins_url: Option<String>,

    /// Jenkins API user.
    #[arg(long, env = "JENKINS_USER")]
    pub jenkins_user: Option<String>,

    /// Slack channel for the report.
    #[arg(long, env = "SLACK_CHANNEL")]
    pub slack_channel: Option<String>,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

const LOG_TARGETS: &[&str] = &[
    "logsweep",
    "logsweep_core",
    "logsweep_jenkins",
    "logsweep_notify",
    "logsweep_shared",
];

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",");

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run(args) => cmd_run(args).await,
        Command::Analyze { file, json, ignore } => cmd_analyze(&file, json, ignore).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

/// Merge `run` flags over the file config.
fn analysis_config(config: &AppConfig, args: &RunArgs) -> AnalysisConfig {
    let mut analysis = AnalysisConfig::from(config);
    if let Some(hours) = args.window_hours {
        analysis.window_hours = hours;
    }
    if let Some(max) = args.max_builds {
        analysis.max_builds_per_job = max;
    }
    if let Some(n) = args.concurrency {
        analysis.fetch_concurrency = n;
    }
    analysis.ignore_exceptions.extend(args.ignore.iter().cloned());
    analysis
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(args: RunArgs) -> Result<()> {
    let config = load_config()?;
    let analysis = analysis_config(&config, &args);

    let jenkins_url = args
        .jenkins_url
        .clone()
        .or_else(|| config.jenkins.url.clone())
        .ok_or_else(|| eyre!("Jenkins URL not set. Pass --jenkins-url or set JENKINS_URL."))?;
    let base_url = Url::parse(&jenkins_url)
        .map_err(|e| eyre!("invalid Jenkins URL '{jenkins_url}': {e}"))?;
    let user = args
        .jenkins_user
        .clone()
        .or_else(|| config.jenkins.user.clone())
        .ok_or_else(|| eyre!("Jenkins user not set. Pass --jenkins-user or set JENKINS_USER."))?;
    let token = resolve_secret(&config.jenkins.token_env, "Jenkins API token")?;

    let jenkins = Arc::new(JenkinsClient::new(JenkinsOptions {
        base_url,
        user,
        token,
        timeout_secs: config.jenkins.timeout_secs,
        max_failed_builds: config.jenkins.max_failed_builds,
    })?);

    let console: Arc<dyn Notifier> = Arc::new(ConsoleNotifier::new());
    let notifier: Arc<dyn Notifier> = if args.dry_run {
        console
    } else {
        let channel = args
            .slack_channel
            .clone()
            .unwrap_or_else(|| config.slack.channel.clone());
        let slack_token = resolve_secret(&config.slack.token_env, "Slack bot token")?;
        let mut opts = SlackOptions::new(slack_token, channel)?;
        opts.render = RenderOptions {
            jenkins_url: Some(jenkins_url.clone()),
        };
        Arc::new(MultiNotifier::new(vec![
            console,
            Arc::new(SlackNotifier::new(opts)?),
        ]))
    };

    let collaborators = Collaborators {
        jobs: jenkins.clone(),
        builds: jenkins.clone(),
        logs: jenkins,
        notifier,
    };
    let mut coordinator = RunCoordinator::new(analysis.clone(), collaborators)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling run");
            on_interrupt.cancel();
        }
    });

    info!(
        jenkins = %jenkins_url,
        window_hours = analysis.window_hours,
        max_builds = analysis.max_builds_per_job,
        concurrency = analysis.fetch_concurrency,
        dry_run = args.dry_run,
        "starting sweep"
    );

    let reporter = CliProgress::new();
    let outcome = coordinator.run(&cancel, &reporter).await;
    reporter.finish();

    let RunOutcome {
        report,
        delivery_error,
    } = outcome.map_err(|e| eyre!("run failed: {e}"))?;

    eprintln!();
    eprintln!("  Sweep complete.");
    eprintln!("  Report:        {}", report.id);
    eprintln!("  Jobs failing:  {}", report.jobs_with_failures);
    eprintln!("  Failed builds: {}", report.total_failed_builds_processed);
    eprintln!("  Skipped:       {}", report.skipped_builds);
    eprintln!();

    match delivery_error {
        Some(e) => Err(eyre!("report delivery failed: {e}")),
        None => Ok(()),
    }
}

async fn cmd_analyze(file: &Path, json: bool, ignore: Vec<String>) -> Result<()> {
    let config = load_config()?;
    let mut analysis = AnalysisConfig::from(&config);
    analysis.ignore_exceptions.extend(ignore);
    analysis.validate()?;

    let text = tokio::fs::read(file)
        .await
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .map_err(|e| eyre!("cannot read '{}': {e}", file.display()))?;

    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "log".to_string());
    let build = BuildRef {
        build_id: name.clone(),
        build_url: file.display().to_string(),
        timestamp: Utc::now(),
    };

    info!(file = %file.display(), "analyzing local log");
    let records = BuildProcessor::new(&analysis)?.records_from_log(&name, &build, text);

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        print!("{}", format_records(&records));
    }
    Ok(())
}

/// Human-readable listing of extracted records.
fn format_records(records: &[FailureRecord]) -> String {
    if records.is_empty() {
        return "No failures found.\n".to_string();
    }

    let mut out = String::new();
    for (i, record) in records.iter().enumerate() {
        out.push_str(&format!("#{} {}", i + 1, record.signature));
        if !record.message.is_empty() {
            out.push_str(&format!(": {}", record.message));
        }
        out.push('\n');
        for line in &record.context {
            out.push_str(&format!("    | {line}\n"));
        }
        out.push('\n');
    }
    out.push_str(&format!("{} failure(s)\n", records.len()));
    out
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn job_started(&self, job_name: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Scanning [{current}/{total}] {job_name}"));
    }

    fn build_processed(&self, job_name: &str, build_id: &str, records: Option<usize>) {
        let status = match records {
            Some(n) => format!("{n} failure(s)"),
            None => "skipped".to_string(),
        };
        self.spinner
            .set_message(format!("{job_name} #{build_id}: {status}"));
    }

    fn done(&self, _report: &Report) {
        self.spinner.finish_and_clear();
    }
}
