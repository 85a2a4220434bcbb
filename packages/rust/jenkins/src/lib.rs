//! Jenkins REST collaborator for logsweep.
//!
//! [`JenkinsClient`] implements the job lister, build lister, and log
//! fetcher contracts against the Jenkins JSON API (`/api/json?tree=...`)
//! and the plain-text `consoleText` endpoint.

mod api;
mod client;

pub use client::{BUILD_PAGE_SIZE, JenkinsClient, JenkinsOptions, MAX_BUILDS_SCANNED};
