//! Template product used when the generative service cannot deliver.
//!
//! No network access; the only randomness is the topic label (when no hint is given) and
//! the price, which is drawn from the narrower fallback range.

use rand::seq::IndexedRandom;
use rand::Rng;

use crate::config::SynthesisConfig;
use crate::contract::{CuratedSet, ProductRecord};
use crate::download::truncate_chars;
use crate::synthesise::repair_title;

const FALLBACK_TOPICS: [&str; 5] = ["Entrepreneurship", "Business", "Startups", "Marketing", "Sales"];

const KEY_POINTS: &str = "Key points:\n\
- Put this strategy into practice step by step\n\
- Measure your results regularly\n\
- Adjust it to your specific situation";

fn capitalise(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn pick_topic(hint: Option<&str>) -> String {
    match hint.map(str::trim).filter(|h| !h.is_empty()) {
        Some(hint) => capitalise(hint),
        None => FALLBACK_TOPICS
            .choose(&mut rand::rng())
            .copied()
            .unwrap_or("Business")
            .to_string(),
    }
}

fn fallback_body(curated: &CuratedSet, topic: &str, config: &SynthesisConfig) -> String {
    let lowered = topic.to_lowercase();
    let mut sections = vec![format!(
        "ABOUT THIS GUIDE\n\n\
This guide gathers practical {lowered} strategies drawn from the real experience of founders, \
operators and small business owners. Each chapter takes one proven idea, explains it plainly \
and closes with concrete points you can act on right away. Read it front to back or jump to \
the chapter that matches the challenge in front of you today."
    )];

    for (i, item) in curated.items.iter().take(config.fallback_items).enumerate() {
        sections.push(format!(
            "CHAPTER {}: {}\n\n{}\n\n{}",
            i + 1,
            item.title,
            truncate_chars(&item.body, config.fallback_body_chars),
            KEY_POINTS
        ));
    }

    sections.push(format!(
        "NEXT STEPS\n\n\
You now have a set of tested {lowered} ideas and a checklist for each of them. Pick one \
chapter, apply it this week and write down what changes. Consistent action beats perfect \
plans, so come back to this guide whenever you need the next idea to try."
    ));

    sections.join("\n\n")
}

/// Build a product from the curated items alone.
pub fn fallback_product(
    curated: &CuratedSet,
    hint: Option<&str>,
    config: &SynthesisConfig,
    period: &str,
) -> ProductRecord {
    let topic = pick_topic(hint);
    let lowered = topic.to_lowercase();

    let mut tags: Vec<String> = Vec::new();
    for tag in [lowered.as_str(), "guide", "strategies", "business", "success"] {
        let tag = tag.to_string();
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }

    let price = &config.price;
    // Narrower range, clipped to the overall bounds.
    let low = price.fallback_min.max(price.min);
    let high = price.fallback_max.min(price.max);
    let (low, high) = if low <= high { (low, high) } else { (price.min, price.max) };

    ProductRecord {
        title: repair_title(
            &format!("The Complete {topic} Guide {period}"),
            config.title_max_chars,
        ),
        description: format!(
            "A complete guide to {lowered} with proven strategies and real cases. Practical \
advice gathered from experts and successful entrepreneurs. Perfect for anyone who wants real \
results in {lowered}."
        ),
        price: rand::rng().random_range(low..=high),
        body: fallback_body(curated, &topic, config),
        tags,
        category: lowered,
        period: period.to_string(),
    }
}
