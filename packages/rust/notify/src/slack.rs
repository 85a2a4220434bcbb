//! Slack delivery through `chat.postMessage`.

use std::time::Duration;

use async_trait::async_trait;
use logsweep_shared::{LogsweepError, Notifier, Report, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, instrument};
use url::Url;

use crate::render::{self, RenderOptions};

/// User-Agent string for Slack requests.
const USER_AGENT: &str = concat!("logsweep/", env!("CARGO_PKG_VERSION"));

/// Slack Web API root.
pub const DEFAULT_SLACK_API: &str = "https://slack.com/api/";

/// Spacing between consecutive posts (Slack allows about one per second per channel).
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(1100);

/// Settings for [`SlackNotifier`].
#[derive(Debug, Clone)]
pub struct SlackOptions {
    /// Bot token (`xoxb-...`).
    pub token: String,
    pub channel: String,
    pub api_base: Url,
    pub min_interval: Duration,
    pub timeout_secs: u64,
    pub render: RenderOptions,
}

impl SlackOptions {
    /// Options for the public Slack API with default spacing.
    pub fn new(token: impl Into<String>, channel: impl Into<String>) -> Result<Self> {
        let api_base = Url::parse(DEFAULT_SLACK_API)
            .map_err(|e| LogsweepError::config(format!("invalid Slack API URL: {e}")))?;
        Ok(Self {
            token: token.into(),
            channel: channel.into(),
            api_base,
            min_interval: DEFAULT_MIN_INTERVAL,
            timeout_secs: 30,
            render: RenderOptions::default(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    ts: Option<String>,
}

/// Posts the report as one or more Block Kit messages. Does not retry.
#[derive(Debug)]
pub struct SlackNotifier {
    client: Client,
    endpoint: Url,
    token: String,
    channel: String,
    min_interval: Duration,
    render: RenderOptions,
    last_post: Mutex<Option<Instant>>,
}

impl SlackNotifier {
    pub fn new(opts: SlackOptions) -> Result<Self> {
        if opts.token.is_empty() {
            return Err(LogsweepError::config("Slack bot token is empty"));
        }
        if opts.channel.is_empty() {
            return Err(LogsweepError::config("Slack channel is empty"));
        }

        let endpoint = opts
            .api_base
            .join("chat.postMessage")
            .map_err(|e| LogsweepError::config(format!("invalid Slack API URL: {e}")))?;
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(opts.timeout_secs))
            .build()
            .map_err(|e| LogsweepError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            token: opts.token,
            channel: opts.channel,
            min_interval: opts.min_interval,
            render: opts.render,
            last_post: Mutex::new(None),
        })
    }

    /// Payloads that [`Notifier::deliver`] would post, in order.
    pub fn payloads(&self, report: &Report) -> Vec<Value> {
        let fallback = render::header_text(report);
        render::split_messages(render::render_blocks(report, &self.render))
            .into_iter()
            .map(|blocks| {
                json!({
                    "channel": self.channel,
                    "text": fallback,
                    "blocks": blocks,
                })
            })
            .collect()
    }

    /// Wait until `min_interval` has passed since the previous post.
    async fn pace(&self) {
        let mut last = self.last_post.lock().await;
        if let Some(prev) = *last {
            let ready_at = prev + self.min_interval;
            if ready_at > Instant::now() {
                debug!("pacing Slack post");
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn post(&self, payload: &Value) -> Result<Option<String>> {
        self.pace().await;

        let url = self.endpoint.as_str();
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.token)
            .json(payload)
            .send()
            .await
            .map_err(|e| LogsweepError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LogsweepError::Delivery(format!("{url}: HTTP {status}")));
        }

        let body: PostMessageResponse = response
            .json()
            .await
            .map_err(|e| LogsweepError::parse(format!("{url}: invalid response: {e}")))?;
        if !body.ok {
            return Err(LogsweepError::Delivery(format!(
                "Slack API error: {}",
                body.error.as_deref().unwrap_or("unknown error")
            )));
        }
        Ok(body.ts)
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    #[instrument(skip_all, fields(channel = %self.channel, report_id = %report.id))]
    async fn deliver(&self, report: &Report) -> Result<()> {
        let payloads = self.payloads(report);
        let total = payloads.len();
        for (i, payload) in payloads.iter().enumerate() {
            let ts = self.post(payload).await?;
            debug!(part = i + 1, total, ts = ts.as_deref().unwrap_or(""), "Slack message posted");
        }
        info!(messages = total, "report delivered to Slack");
        Ok(())
    }
}
