//! HTTP client for the Jenkins JSON API.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use logsweep_shared::{BuildLister, BuildRef, JobLister, JobRef, LogFetcher, LogsweepError, Result};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::api::{BuildEntry, BuildsResponse, JobsResponse};

/// User-Agent string for Jenkins requests.
const USER_AGENT: &str = concat!("logsweep/", env!("CARGO_PKG_VERSION"));

/// Builds requested per `allBuilds` page.
pub const BUILD_PAGE_SIZE: usize = 1000;

/// Stop paginating after this many builds, whatever the window says.
pub const MAX_BUILDS_SCANNED: usize = 10_000;

/// Range used when `allBuilds` is unavailable.
const FALLBACK_TREE: &str = "builds[number,result,timestamp,url]{0,100}";

/// Connection settings for [`JenkinsClient`].
#[derive(Debug, Clone)]
pub struct JenkinsOptions {
    pub base_url: Url,
    pub user: String,
    pub token: String,
    pub timeout_secs: u64,
    /// Stop listing a job's failed builds after this many.
    pub max_failed_builds: Option<usize>,
}

/// Jenkins REST client. Cheap to clone.
#[derive(Debug, Clone)]
pub struct JenkinsClient {
    client: Client,
    base_url: Url,
    user: String,
    token: String,
    max_failed_builds: Option<usize>,
    page_size: usize,
}

impl JenkinsClient {
    pub fn new(opts: JenkinsOptions) -> Result<Self> {
        if !matches!(opts.base_url.scheme(), "http" | "https") || opts.base_url.cannot_be_a_base() {
            return Err(LogsweepError::config(format!(
                "Jenkins URL must be an http(s) URL, got '{}'",
                opts.base_url
            )));
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(opts.timeout_secs))
            .build()
            .map_err(|e| LogsweepError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: opts.base_url,
            user: opts.user,
            token: opts.token,
            max_failed_builds: opts.max_failed_builds,
            page_size: BUILD_PAGE_SIZE,
        })
    }

    /// `{base}/job/a/job/b/` followed by `extra` segments. Every segment is
    /// percent-encoded.
    fn job_url(&self, job_name: &str, extra: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                LogsweepError::config(format!("invalid Jenkins URL '{}'", self.base_url))
            })?;
            segments.pop_if_empty();
            for part in job_name.split('/').filter(|p| !p.is_empty()) {
                segments.push("job").push(part);
            }
            segments.extend(extra);
        }
        Ok(url)
    }

    fn api_url(&self, extra: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| LogsweepError::config(format!("invalid Jenkins URL '{}'", self.base_url)))?
            .pop_if_empty()
            .extend(extra);
        Ok(url)
    }

    fn get(&self, url: Url) -> RequestBuilder {
        self.client
            .get(url)
            .basic_auth(&self.user, Some(&self.token))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, tree: &str) -> Result<T> {
        let shown = format!("{url}?tree={tree}");
        let response = self
            .get(url)
            .query(&[("tree", tree)])
            .send()
            .await
            .map_err(|e| send_error(&shown, e))?;
        let response = check_status(&shown, response)?;

        let body = response
            .text()
            .await
            .map_err(|e| LogsweepError::Network(format!("{shown}: failed to read body: {e}")))?;
        serde_json::from_str(&body)
            .map_err(|e| LogsweepError::parse(format!("{shown}: invalid JSON: {e}")))
    }

    /// Failed builds from one `tree` page, plus whether the window was exhausted.
    fn collect_page(
        &self,
        builds: Vec<BuildEntry>,
        job_url: &Url,
        cutoff_ms: i64,
        failures: &mut Vec<BuildRef>,
    ) -> Result<bool> {
        for entry in builds {
            if entry.timestamp < cutoff_ms {
                return Ok(true);
            }
            if !entry.is_failed() {
                continue;
            }
            failures.push(to_build_ref(entry, job_url)?);
            if self.max_failed_builds.is_some_and(|max| failures.len() >= max) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

// ---------------------------------------------------------------------------
// Collaborator contracts
// ---------------------------------------------------------------------------

#[async_trait]
impl JobLister for JenkinsClient {
    #[instrument(skip_all)]
    async fn list_jobs(&self) -> Result<Vec<JobRef>> {
        let url = self.api_url(&["api", "json"])?;
        let parsed: JobsResponse = self
            .get_json(url, "jobs[name,url,lastBuild[number]]")
            .await?;
        debug!(jobs = parsed.jobs.len(), "listed jobs");

        Ok(parsed
            .jobs
            .into_iter()
            .map(|job| JobRef {
                name: job.name,
                url: job.url,
                last_build_ref: job.last_build.map(|b| b.number.to_string()),
            })
            .collect())
    }
}

#[async_trait]
impl BuildLister for JenkinsClient {
    /// Pages through `allBuilds` newest first until a build predates the
    /// window. Falls back once to the last 100 `builds` if the first page
    /// fails; a failure on a later page keeps what was already collected.
    #[instrument(skip_all, fields(job = job_name))]
    async fn list_failed_builds(
        &self,
        job_name: &str,
        window_start: DateTime<Utc>,
    ) -> Result<Vec<BuildRef>> {
        let job_url = self.job_url(job_name, &[])?;
        let api = self.job_url(job_name, &["api", "json"])?;
        let cutoff_ms = window_start.timestamp_millis();
        let mut failures = Vec::new();
        let mut offset = 0;

        while offset < MAX_BUILDS_SCANNED {
            let tree = format!(
                "allBuilds[number,result,timestamp,url]{{{offset},{}}}",
                offset + self.page_size - 1
            );
            let page: BuildsResponse = match self.get_json(api.clone(), &tree).await {
                Ok(page) => page,
                Err(e) if offset == 0 => {
                    warn!(error = %e, "allBuilds unavailable, falling back to recent builds");
                    let page: BuildsResponse = self.get_json(api.clone(), FALLBACK_TREE).await?;
                    self.collect_page(page.all_builds, &job_url, cutoff_ms, &mut failures)?;
                    return Ok(failures);
                }
                Err(e) => {
                    warn!(offset, error = %e, "build page failed, keeping partial listing");
                    break;
                }
            };

            let returned = page.all_builds.len();
            if self.collect_page(page.all_builds, &job_url, cutoff_ms, &mut failures)? {
                break;
            }
            if returned < self.page_size {
                break;
            }
            offset += self.page_size;
        }

        debug!(failed = failures.len(), "listed failed builds");
        Ok(failures)
    }
}

#[async_trait]
impl LogFetcher for JenkinsClient {
    #[instrument(skip_all, fields(job = job_name, build_id = build_id))]
    async fn fetch_console_text(&self, job_name: &str, build_id: &str) -> Result<String> {
        let url = self.job_url(job_name, &[build_id, "consoleText"])?;
        let shown = url.to_string();

        let response = self
            .get(url)
            .send()
            .await
            .map_err(|e| send_error(&shown, e))?;
        let response = check_status(&shown, response)?;

        response
            .text()
            .await
            .map_err(|e| LogsweepError::Network(format!("{shown}: failed to read body: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn send_error(url: &str, e: reqwest::Error) -> LogsweepError {
    if e.is_connect() {
        LogsweepError::Connection(format!("{url}: {e}"))
    } else {
        LogsweepError::Network(format!("{url}: {e}"))
    }
}

fn check_status(url: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LogsweepError::Connection(format!(
            "{url}: authentication failed (HTTP {status}); check JENKINS_USER and the API token"
        )),
        StatusCode::NOT_FOUND => LogsweepError::NotFound(url.to_string()),
        StatusCode::BAD_GATEWAY => LogsweepError::Network(format!(
            "Jenkins server error (502 Bad Gateway) for URL: {url}"
        )),
        _ => LogsweepError::Http {
            status: status.as_u16(),
            url: url.to_string(),
        },
    })
}

fn to_build_ref(entry: BuildEntry, job_url: &Url) -> Result<BuildRef> {
    let timestamp = DateTime::from_timestamp_millis(entry.timestamp).ok_or_else(|| {
        LogsweepError::parse(format!(
            "build {} has out-of-range timestamp {}",
            entry.number, entry.timestamp
        ))
    })?;
    let build_url = match entry.url {
        Some(url) => url,
        None => format!("{}{}/", ensure_trailing_slash(job_url), entry.number),
    };
    Ok(BuildRef {
        build_id: entry.number.to_string(),
        build_url,
        timestamp,
    })
}

fn ensure_trailing_slash(url: &Url) -> String {
    let s = url.as_str();
    if s.ends_with('/') {
        s.to_string()
    } else {
        format!("{s}/")
    }
}
