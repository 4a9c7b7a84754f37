//! Source fetcher: reads ranked posts from public discussion feeds.
//!
//! A feed failing in any way (network, status, payload) yields an empty list for that source;
//! nothing here returns an error to the orchestrator.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::config::FetchConfig;
use crate::contract::{ContentItem, FeedClient};
use crate::error::FetchError;

/// Describes one feed to read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub name: String,
    pub url: String,
    pub topic: String,
}

/// HTTP feed reader for reddit-style `top.json` listings.
pub struct RedditFeed {
    http: reqwest::Client,
}

impl RedditFeed {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent.to_string())
            .timeout(timeout)
            .build()?;
        Ok(Self { http })
    }

    pub fn from_config(config: &FetchConfig) -> Result<Self, reqwest::Error> {
        Self::new(&config.user_agent, config.timeout)
    }
}

#[async_trait]
impl FeedClient for RedditFeed {
    async fn fetch_listing(&self, source: &SourceDescriptor) -> Result<Value, FetchError> {
        let response = self
            .http
            .get(&source.url)
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                url: source.url.clone(),
                source: e,
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(FetchError::Status {
                url: source.url.clone(),
                status: status.as_u16(),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| FetchError::Malformed(e.to_string()))
    }
}

/// Keeps at most `max` characters, never splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

fn is_removed_marker(body: &str) -> bool {
    let lowered = body.to_lowercase();
    lowered.starts_with("[removed]") || lowered.starts_with("[deleted]")
}

/// The quality filter every fetched item must pass.
pub fn passes_quality_filter(body: &str, score: i64, config: &FetchConfig) -> bool {
    body.chars().count() >= config.min_content_length
        && score > config.score_floor
        && !is_removed_marker(body)
}

/// Extract qualifying items from a `{"data": {"children": [{"data": {...}}]}}` listing.
pub fn parse_listing(
    payload: &Value,
    source: &SourceDescriptor,
    config: &FetchConfig,
    fetched_at: DateTime<Utc>,
) -> Result<Vec<ContentItem>, FetchError> {
    let children = payload
        .get("data")
        .and_then(|d| d.get("children"))
        .and_then(|c| c.as_array())
        .ok_or_else(|| FetchError::Malformed("missing data.children array".to_string()))?;

    let mut items = Vec::new();
    for child in children {
        let Some(post) = child.get("data") else {
            debug!(source = %source.name, "Skipping listing entry without data");
            continue;
        };
        let title = post
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim();
        let body = post
            .get("selftext")
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim();
        let score = post.get("score").and_then(Value::as_i64).unwrap_or(0);

        if !passes_quality_filter(body, score, config) {
            continue;
        }

        items.push(ContentItem {
            title: truncate_chars(title, config.title_cap),
            body: truncate_chars(body, config.body_cap),
            popularity_score: score,
            source_name: source.name.clone(),
            topic: source.topic.clone(),
            fetched_at,
        });
    }
    Ok(items)
}

/// Fetch and filter a single source. Any failure is logged and yields an empty list.
pub async fn fetch_source<F>(
    client: &F,
    source: &SourceDescriptor,
    config: &FetchConfig,
) -> Vec<ContentItem>
where
    F: FeedClient + ?Sized,
{
    info!(source = %source.name, url = %source.url, "[FETCH] Reading feed");

    let payload = match client.fetch_listing(source).await {
        Ok(payload) => payload,
        Err(e) => {
            error!(source = %source.name, error = %e, "[FETCH] Feed request failed");
            return Vec::new();
        }
    };

    match parse_listing(&payload, source, config, Utc::now()) {
        Ok(items) => {
            info!(source = %source.name, count = items.len(), "[FETCH] Qualifying posts");
            items
        }
        Err(e) => {
            error!(source = %source.name, error = %e, "[FETCH] Could not parse feed payload");
            Vec::new()
        }
    }
}

/// Fetch every configured source in order, pausing between requests.
pub async fn fetch_all<F>(client: &F, config: &FetchConfig) -> Vec<ContentItem>
where
    F: FeedClient + ?Sized,
{
    let sources: Vec<&SourceDescriptor> = config.sources.iter().take(config.max_sources).collect();
    if sources.is_empty() {
        warn!("[FETCH] No sources configured");
    }

    let mut all = Vec::new();
    for (idx, source) in sources.iter().enumerate() {
        if idx > 0 && !config.politeness_delay.is_zero() {
            tokio::time::sleep(config.politeness_delay).await;
        }
        all.extend(fetch_source(client, source, config).await);
    }

    info!(total = all.len(), "[FETCH] Aggregated posts from all sources");
    all
}
