//! Response shapes of the Jenkins JSON API, trimmed to the `tree` we request.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct JobsResponse {
    #[serde(default)]
    pub jobs: Vec<JobEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JobEntry {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub last_build: Option<BuildNumber>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BuildNumber {
    pub number: u64,
}

/// `allBuilds[...]` or `builds[...]`, whichever was requested.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BuildsResponse {
    #[serde(default, alias = "builds")]
    pub all_builds: Vec<BuildEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BuildEntry {
    pub number: u64,
    /// `null` while the build is still running.
    #[serde(default)]
    pub result: Option<String>,
    /// Start time, milliseconds since the epoch.
    pub timestamp: i64,
    #[serde(default)]
    pub url: Option<String>,
}

impl BuildEntry {
    /// `FAILURE` and `UNSTABLE` count as failed.
    pub fn is_failed(&self) -> bool {
        matches!(self.result.as_deref(), Some("FAILURE" | "UNSTABLE"))
    }
}
