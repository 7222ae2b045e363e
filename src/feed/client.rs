use crate::feed::auth::{FeedAuthError, basic_auth_header};
use crate::feed::config::ROOT;
use crate::feed::models::{CandidateProduct, RawFeedItem};
use crate::http::build_client;
use crate::models::FeedType;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Auth(#[from] FeedAuthError),
    #[error("feed request failed: {0}")]
    Request(String),
    #[error("invalid feed response: {0}")]
    Deserialize(String),
}

#[derive(Debug, Deserialize)]
struct FeedPage {
    #[serde(default, alias = "products")]
    items: Vec<RawFeedItem>,
}

#[derive(Debug, Clone)]
pub struct FeedClient {
    http: Client,
}

impl FeedClient {
    pub fn new() -> Self {
        Self {
            http: build_client(),
        }
    }

    /// Fetches one page of candidates for `feed`, already normalized.
    /// An upstream page with no matches is an empty list, not an error.
    pub async fn fetch(&self, feed: FeedType, limit: u32) -> Result<Vec<CandidateProduct>, FeedError> {
        match feed {
            FeedType::Mixed => self.fetch_mixed(limit).await,
            other => self.fetch_single(other, limit).await,
        }
    }

    async fn fetch_single(
        &self,
        feed: FeedType,
        limit: u32,
    ) -> Result<Vec<CandidateProduct>, FeedError> {
        let Some(name) = feed.feed_name() else {
            return Err(FeedError::Request("mixed feed has no upstream name".into()));
        };
        let url = format!("{}/ds/feeds/{}/items", *ROOT, name);
        let response = self
            .http
            .get(url)
            .header("Authorization", basic_auth_header()?)
            .query(&[("page_size", limit.to_string())])
            .send()
            .await
            .map_err(|err| FeedError::Request(err.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(FeedError::Request(format!("HTTP {}", response.status())));
        }

        let page: FeedPage = response
            .json()
            .await
            .map_err(|err| FeedError::Deserialize(err.to_string()))?;

        let raw_count = page.items.len();
        let candidates: Vec<CandidateProduct> = page
            .items
            .into_iter()
            .filter_map(|item| item.normalize(feed))
            .collect();
        if candidates.len() < raw_count {
            debug!(
                target = "jomion.feed",
                feed = feed.as_str(),
                skipped = (raw_count - candidates.len()) as u64,
                "dropped unmappable feed items"
            );
        }
        crate::metrics::feed_items_fetched(feed.as_str(), candidates.len());
        Ok(candidates)
    }

    /// Aggregates the concrete feeds sequentially, splitting the limit. A
    /// sub-feed failure degrades the mix instead of failing it.
    async fn fetch_mixed(&self, limit: u32) -> Result<Vec<CandidateProduct>, FeedError> {
        let per_feed = (limit / FeedType::concrete().len() as u32).max(1);
        let mut pages = Vec::new();

        for feed in FeedType::concrete() {
            match self.fetch_single(feed, per_feed).await {
                Ok(candidates) => pages.push(candidates),
                Err(err) => {
                    warn!(
                        target = "jomion.feed",
                        feed = feed.as_str(),
                        error = %err,
                        "mixed_feed_partial_failure"
                    );
                }
            }
        }

        Ok(merge_pages(pages, limit))
    }
}

/// Flattens feed pages into one mix, deduplicated by external id, capped at
/// `limit`. The same item often rides several feeds at once.
fn merge_pages(pages: Vec<Vec<CandidateProduct>>, limit: u32) -> Vec<CandidateProduct> {
    let mut seen = HashSet::new();
    let mut collected = Vec::new();
    for candidate in pages.into_iter().flatten() {
        if seen.insert(candidate.external_id.clone()) {
            collected.push(candidate);
        }
        if collected.len() == limit as usize {
            break;
        }
    }
    collected
}

impl Default for FeedClient {
    fn default() -> Self {
        Self::new()
    }
}
