//! Content curator: ranks fetched items and cuts them down to a working set.

use rand::seq::IndexedRandom;
use tracing::debug;

use crate::config::CurateConfig;
use crate::contract::{ContentItem, CuratedSet};

/// Stable sort, highest `popularity_score` first.
pub fn rank(mut items: Vec<ContentItem>) -> Vec<ContentItem> {
    items.sort_by(|a, b| b.popularity_score.cmp(&a.popularity_score));
    items
}

/// Pick the topic that seeds synthesis: one of the distinct topics in `items`, at random.
pub fn main_topic(items: &[ContentItem], default_topic: &str) -> String {
    let mut topics: Vec<&str> = Vec::new();
    for item in items {
        if !item.topic.is_empty() && !topics.contains(&item.topic.as_str()) {
            topics.push(&item.topic);
        }
    }
    topics
        .choose(&mut rand::rng())
        .map(|t| t.to_string())
        .unwrap_or_else(|| default_topic.to_string())
}

/// Take the top `max_items` of an already ranked slice.
pub fn select(ranked: &[ContentItem], config: &CurateConfig) -> CuratedSet {
    let items: Vec<ContentItem> = ranked.iter().take(config.max_items).cloned().collect();
    let main_topic = main_topic(&items, &config.default_topic);
    debug!(count = items.len(), topic = %main_topic, "Curated working set");
    CuratedSet { items, main_topic }
}

pub fn curate(items: Vec<ContentItem>, config: &CurateConfig) -> CuratedSet {
    select(&rank(items), config)
}
