//! HTTP snapshot source for one CI master.
//!
//! Talks to the master's JSON API with a shared [`reqwest::Client`]. Builds
//! that the master does not expose yet return `Ok(None)` rather than an
//! error, and commit lookups are memoized per (slug, build number) since a
//! build's commit never changes once resolved.

use std::time::Duration;

use anyhow::{Context, Result};
use buildmon_core::{
    config::MasterConfig,
    models::{BuildDetail, BuildState, CommitRef, RepositorySnapshot},
    traits::SnapshotSource,
};
use moka::future::Cache;
use reqwest::{
    StatusCode,
    header::{AUTHORIZATION, HeaderMap, HeaderValue},
};
use serde::Deserialize;
use time::UtcDateTime;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const COMMIT_CACHE_CAPACITY: u64 = 4096;

#[derive(Clone)]
pub struct CiClient {
    master: String,
    base_url: String,
    client: reqwest::Client,
    commit_cache: Cache<(String, u64), CommitRef>,
}

#[derive(Debug, Deserialize)]
struct RepoPayload {
    slug: String,
    last_build_number: u64,
    last_build_state: String,
    last_build_started_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct BuildPayload {
    id: u64,
    number: u64,
    state: Option<String>,
    duration: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct CommitPayload {
    sha: String,
    branch: Option<String>,
}

impl CiClient {
    pub fn new(config: &MasterConfig) -> Result<Self> {
        Url::parse(&config.base_url)
            .with_context(|| format!("Invalid base URL for master {}", config.name))?;
        let mut headers = HeaderMap::new();
        if let Some(token) = &config.token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .context("Invalid API token")?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            master: config.name.clone(),
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            client,
            commit_cache: Cache::builder().max_capacity(COMMIT_CACHE_CAPACITY).build(),
        })
    }

    pub fn master(&self) -> &str { &self.master }

    async fn get_optional<T: serde::de::DeserializeOwned>(&self, url: String) -> Result<Option<T>> {
        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(response.error_for_status()?.json().await?))
    }
}

impl SnapshotSource for CiClient {
    async fn list_repositories(&self) -> Result<Vec<RepositorySnapshot>> {
        let url = format!("{}/api/repos", self.base_url);
        let payloads: Vec<RepoPayload> = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch repositories from {}", self.master))?
            .error_for_status()?
            .json()
            .await
            .context("Failed to parse repository listing")?;
        let mut snapshots = Vec::with_capacity(payloads.len());
        for payload in payloads {
            match snapshot_from_payload(payload) {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(e) => tracing::warn!("Skipping repository on {}: {}", self.master, e),
            }
        }
        Ok(snapshots)
    }

    async fn fetch_build_detail(&self, slug: &str, number: u64) -> Result<Option<BuildDetail>> {
        let url = format!("{}/api/repos/{}/builds/{}", self.base_url, slug, number);
        let Some(payload) = self
            .get_optional::<BuildPayload>(url)
            .await
            .with_context(|| format!("Failed to fetch build {slug}#{number}"))?
        else {
            return Ok(None);
        };
        Ok(Some(BuildDetail {
            id: payload.id,
            number: payload.number,
            state: payload.state.as_deref().and_then(|s| s.parse().ok()),
            duration_secs: payload.duration,
        }))
    }

    async fn resolve_commit(&self, slug: &str, number: u64) -> Result<Option<CommitRef>> {
        let key = (slug.to_owned(), number);
        if let Some(commit) = self.commit_cache.get(&key).await {
            return Ok(Some(commit));
        }
        let url = format!("{}/api/repos/{}/builds/{}/commit", self.base_url, slug, number);
        let Some(payload) = self
            .get_optional::<CommitPayload>(url)
            .await
            .with_context(|| format!("Failed to resolve commit for {slug}#{number}"))?
        else {
            return Ok(None);
        };
        let commit = CommitRef { sha: payload.sha, branch: payload.branch };
        self.commit_cache.insert(key, commit.clone()).await;
        Ok(Some(commit))
    }

    async fn resync_repository_list(&self) -> Result<()> {
        let url = format!("{}/api/sync", self.base_url);
        self.client
            .post(&url)
            .send()
            .await
            .with_context(|| format!("Failed to trigger resync on {}", self.master))?
            .error_for_status()?;
        Ok(())
    }

    fn build_url(&self, slug: &str, build_id: u64) -> String {
        format!("{}/{}/builds/{}", self.base_url, slug, build_id)
    }
}

fn snapshot_from_payload(payload: RepoPayload) -> Result<RepositorySnapshot> {
    let state = payload
        .last_build_state
        .parse::<BuildState>()
        .map_err(|()| anyhow::anyhow!("{}: unknown state {:?}", payload.slug, payload.last_build_state))?;
    Ok(RepositorySnapshot {
        slug: payload.slug,
        last_build_number: payload.last_build_number,
        last_build_state: state,
        last_build_started_at: payload
            .last_build_started_at
            .and_then(|t| UtcDateTime::from_unix_timestamp(t).ok()),
    })
}
