use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::external::price_feed::FeedError;

const GITHUB_API_BASE: &str = "https://api.github.com";
const RAW_CONTENT_BASE: &str = "https://raw.githubusercontent.com";
const COMMITS_PER_PAGE: usize = 100;

/// One revision of the feed file in the upstream repository.
#[derive(Debug, Clone)]
pub struct RevisionInfo {
    pub sha: String,
    pub committed_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct CommitItem {
    sha: String,
    commit: CommitMeta,
}

#[derive(Debug, Deserialize)]
struct CommitMeta {
    committer: Option<CommitSigner>,
    author: Option<CommitSigner>,
}

#[derive(Debug, Deserialize)]
struct CommitSigner {
    date: Option<DateTime<Utc>>,
}

/// Read-only client for the repository hosting the price feed file. Lists
/// the feed file's commit history and fetches its content at a revision.
pub struct FeedRepo {
    client: reqwest::Client,
    owner: String,
    repo: String,
    path: String,
    token: Option<String>,
    page_delay: Duration,
}

impl FeedRepo {
    pub fn new(config: &Config) -> Result<Self, FeedError> {
        let (owner, repo) = config
            .feed_repo
            .split_once('/')
            .ok_or_else(|| FeedError::BadResponse(format!(
                "FEED_REPO must be owner/repo, got '{}'",
                config.feed_repo
            )))?;

        // GitHub rejects requests without a User-Agent.
        let client = reqwest::Client::builder()
            .user_agent("tradepost-backfill")
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| FeedError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            owner: owner.to_string(),
            repo: repo.to_string(),
            path: config.feed_path.clone(),
            token: config.github_token.clone(),
            page_delay: config.backfill_page_delay,
        })
    }

    /// Lists revisions touching the feed file, newest first, walking the
    /// commit pages until one comes back short.
    pub async fn list_revisions(
        &self,
        since: DateTime<Utc>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<RevisionInfo>, FeedError> {
        let url = format!(
            "{}/repos/{}/{}/commits",
            GITHUB_API_BASE, self.owner, self.repo
        );
        let mut revisions = Vec::new();
        let mut page = 1;

        loop {
            let per_page = COMMITS_PER_PAGE.to_string();
            let page_param = page.to_string();
            let since_param = since.to_rfc3339_opts(SecondsFormat::Secs, true);
            let mut request = self
                .client
                .get(&url)
                .header("Accept", "application/vnd.github+json")
                .query(&[
                    ("path", self.path.as_str()),
                    ("per_page", per_page.as_str()),
                    ("page", page_param.as_str()),
                    ("since", since_param.as_str()),
                ]);
            if let Some(until) = until {
                request = request.query(&[(
                    "until",
                    until.to_rfc3339_opts(SecondsFormat::Secs, true),
                )]);
            }
            if let Some(token) = &self.token {
                request = request.bearer_auth(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| FeedError::Network(e.to_string()))?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(FeedError::BadResponse(format!(
                    "GitHub commits API returned {}: {}",
                    status,
                    body.chars().take(200).collect::<String>()
                )));
            }

            let items: Vec<CommitItem> = response
                .json()
                .await
                .map_err(|e| FeedError::Parse(e.to_string()))?;
            let batch_len = items.len();
            debug!("Commits page {}: {} entries", page, batch_len);

            for item in items {
                let date = item
                    .commit
                    .committer
                    .as_ref()
                    .and_then(|s| s.date)
                    .or_else(|| item.commit.author.as_ref().and_then(|s| s.date));
                match date {
                    Some(committed_at) => revisions.push(RevisionInfo {
                        sha: item.sha,
                        committed_at,
                    }),
                    None => warn!("Commit {} has no date; ignoring", item.sha),
                }
            }

            if batch_len < COMMITS_PER_PAGE {
                break;
            }
            page += 1;
            tokio::time::sleep(self.page_delay).await;
        }

        info!(
            "{} revisions of {} since {}",
            revisions.len(),
            self.path,
            since
        );
        Ok(revisions)
    }

    /// Fetches the feed file content as it was at `sha`.
    pub async fn fetch_content(&self, sha: &str) -> Result<Value, FeedError> {
        let url = format!(
            "{}/{}/{}/{}/{}",
            RAW_CONTENT_BASE, self.owner, self.repo, sha, self.path
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FeedError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FeedError::BadResponse(format!(
                "HTTP {} fetching {}",
                response.status(),
                url
            )));
        }

        response
            .json()
            .await
            .map_err(|e| FeedError::Parse(e.to_string()))
    }
}
