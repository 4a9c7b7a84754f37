#![allow(dead_code)]

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Value};
use threadpress::config::{PipelineConfig, Variant};
use threadpress::contract::{ContentItem, CuratedSet, ProductRecord};

/// Preset with every wait set to zero and all output under `dir`.
pub fn quiet_config(variant: Variant, dir: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::for_variant(variant);
    config.output_dir = dir.to_path_buf();
    config.render.output_dir = dir.to_path_buf();
    config.fetch.politeness_delay = Duration::ZERO;
    config.synthesis.rate_limit_cooldown = Duration::ZERO;
    config.synthesis.error_backoff = Duration::ZERO;
    config.publish.retry_wait = Duration::ZERO;
    config
}

pub fn post(title: &str, body: &str, score: i64) -> Value {
    json!({ "data": { "title": title, "selftext": body, "score": score } })
}

pub fn listing(posts: Vec<Value>) -> Value {
    json!({ "data": { "children": posts } })
}

pub fn long_body(seed: &str) -> String {
    format!("{seed}. ").repeat(20)
}

pub fn item(title: &str, score: i64, topic: &str) -> ContentItem {
    ContentItem {
        title: title.to_string(),
        body: long_body(title),
        popularity_score: score,
        source_name: "Test".to_string(),
        topic: topic.to_string(),
        fetched_at: Utc::now(),
    }
}

pub fn curated(count: usize) -> CuratedSet {
    CuratedSet {
        items: (0..count)
            .map(|i| item(&format!("Tip number {i}"), 100 - i as i64, "startups"))
            .collect(),
        main_topic: "startups".to_string(),
    }
}

pub fn product() -> ProductRecord {
    ProductRecord {
        title: "Bootstrapping Without Burnout".to_string(),
        description: "How small teams grow revenue without losing their weekends.".to_string(),
        price: 1800,
        body: format!(
            "CHAPTER 1: Start small\n\n{}\n\n\nCHAPTER 2: Sell early\n\n{}",
            long_body("Validate the idea with ten paying customers"),
            long_body("Charge from day one and listen to objections")
        ),
        tags: vec!["startups".to_string(), "bootstrapping".to_string()],
        category: "startups".to_string(),
        period: "October 2026".to_string(),
    }
}

/// A generator answer that passes validation.
pub fn valid_answer(title: &str, price: i64) -> String {
    json!({
        "title": title,
        "description": "A practical playbook for first-time founders.",
        "price": price,
        "body": format!("CHAPTER 1: Focus\n\n{}", long_body("Pick one customer segment and serve it well")),
        "tags": ["startups", "founders", "growth"],
        "category": "startups",
        "period": "October 2026"
    })
    .to_string()
}
