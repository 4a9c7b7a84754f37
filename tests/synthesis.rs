mod common;

use common::{curated, quiet_config, valid_answer};
use serde_json::json;
use tempfile::tempdir;
use threadpress::config::Variant;
use threadpress::contract::{CuratedSet, MockTextGenerator};
use threadpress::error::{GenerationError, SynthesisError};
use threadpress::fallback::fallback_product;
use threadpress::synthesise::{
    build_request, parse_product, repair_price, repair_title, PromptContext, SynthesisOrigin,
    Synthesizer,
};

fn context() -> PromptContext {
    PromptContext {
        topic: "startups".to_string(),
        period: "October 2026".to_string(),
    }
}

#[tokio::test]
async fn generator_failing_every_attempt_yields_fallback_in_fallback_price_range() {
    let dir = tempdir().unwrap();
    let config = quiet_config(Variant::Full, dir.path());
    let mut generator = MockTextGenerator::new();
    generator
        .expect_complete()
        .times(3)
        .returning(|_| Err(GenerationError::Transport("connection reset".to_string())));

    let synthesis = Synthesizer::new(&generator, &config.synthesis)
        .create_product(&curated(12))
        .await;

    assert_eq!(synthesis.origin, SynthesisOrigin::Fallback);
    let product = synthesis.product;
    assert!((1500..=2200).contains(&product.price));
    assert!(product.body.chars().count() >= 500);
    assert!(product.body.contains("CHAPTER 10:"));
    assert!(!product.body.contains("CHAPTER 11:"));
    assert_eq!(product.category, "startups");
    assert!(product.title.contains("Startups"));
}

#[tokio::test]
async fn invalid_json_on_every_attempt_falls_back_after_three_calls() {
    let dir = tempdir().unwrap();
    let config = quiet_config(Variant::Full, dir.path());
    let mut generator = MockTextGenerator::new();
    generator
        .expect_complete()
        .times(3)
        .returning(|_| Ok("Sorry, I cannot help with that.".to_string()));

    let synthesis = Synthesizer::new(&generator, &config.synthesis)
        .create_product(&curated(3))
        .await;
    assert_eq!(synthesis.origin, SynthesisOrigin::Fallback);
}

#[tokio::test]
async fn missing_credential_goes_straight_to_fallback() {
    let dir = tempdir().unwrap();
    let config = quiet_config(Variant::Simple, dir.path());
    let mut generator = MockTextGenerator::new();
    generator
        .expect_complete()
        .times(1)
        .returning(|_| Err(GenerationError::MissingCredential));

    let synthesis = Synthesizer::new(&generator, &config.synthesis)
        .create_product(&curated(4))
        .await;

    assert_eq!(synthesis.origin, SynthesisOrigin::Fallback);
    assert!((15..=25).contains(&synthesis.product.price));
}

#[tokio::test]
async fn short_body_is_retried_and_second_answer_is_used() {
    let dir = tempdir().unwrap();
    let config = quiet_config(Variant::Full, dir.path());
    let mut generator = MockTextGenerator::new();
    let mut calls = 0;
    generator.expect_complete().times(2).returning(move |_| {
        calls += 1;
        if calls == 1 {
            Ok(json!({
                "title": "Too thin",
                "description": "d",
                "price": 1500,
                "body": "Only a sentence.",
                "tags": ["a"]
            })
            .to_string())
        } else {
            Ok(format!("```json\n{}\n```", valid_answer("Founder Focus", 1999)))
        }
    });

    let synthesis = Synthesizer::new(&generator, &config.synthesis)
        .create_product(&curated(5))
        .await;

    assert_eq!(synthesis.origin, SynthesisOrigin::Generated { attempt: 2 });
    assert_eq!(synthesis.product.title, "Founder Focus");
    assert_eq!(synthesis.product.price, 1999);
}

#[tokio::test]
async fn rate_limit_then_success_uses_the_generated_product() {
    let dir = tempdir().unwrap();
    let config = quiet_config(Variant::Full, dir.path());
    let mut generator = MockTextGenerator::new();
    let mut calls = 0;
    generator.expect_complete().times(2).returning(move |_| {
        calls += 1;
        if calls == 1 {
            Err(GenerationError::RateLimited)
        } else {
            Ok(valid_answer("Second Wind", 2000))
        }
    });

    let synthesis = Synthesizer::new(&generator, &config.synthesis)
        .create_product(&curated(5))
        .await;
    assert_eq!(synthesis.origin, SynthesisOrigin::Generated { attempt: 2 });
}

#[test]
fn long_title_and_out_of_range_price_are_repaired() {
    let dir = tempdir().unwrap();
    let config = quiet_config(Variant::Full, dir.path());
    let title = "A".repeat(120);

    let product = parse_product(&valid_answer(&title, 99), &context(), &config.synthesis).unwrap();

    assert_eq!(product.title.chars().count(), 80);
    assert!(product.title.ends_with("..."));
    assert!((1200..=2500).contains(&product.price));
}

#[test]
fn missing_category_and_period_default_from_the_prompt() {
    let dir = tempdir().unwrap();
    let config = quiet_config(Variant::Full, dir.path());
    let raw = json!({
        "title": "Lean Launch",
        "description": "Ship faster.",
        "price": 1500,
        "body": "Lean launch advice. ".repeat(40),
        "tags": "launch, lean, launch"
    })
    .to_string();

    let product = parse_product(&raw, &context(), &config.synthesis).unwrap();
    assert_eq!(product.category, "startups");
    assert_eq!(product.period, "October 2026");
    assert_eq!(product.tags, vec!["launch", "lean"]);
}

#[test]
fn missing_required_field_is_reported_by_name() {
    let dir = tempdir().unwrap();
    let config = quiet_config(Variant::Full, dir.path());
    let raw = json!({ "title": "x", "price": 1500, "body": "y", "tags": ["z"] }).to_string();

    let err = parse_product(&raw, &context(), &config.synthesis).unwrap_err();
    assert!(matches!(err, SynthesisError::MissingField("description")));
}

#[test]
fn repair_helpers_keep_valid_values() {
    let dir = tempdir().unwrap();
    let price = quiet_config(Variant::Simple, dir.path()).synthesis.price;

    assert_eq!(repair_title("Short title", 80), "Short title");
    assert_eq!(repair_price(&json!(20), &price), 20);
    for bad in [json!(500), json!("20"), json!(-3), json!(20.5)] {
        let repaired = repair_price(&bad, &price);
        assert!((15..=25).contains(&repaired), "{bad} repaired to {repaired}");
    }
}

#[test]
fn request_lists_tips_and_price_range() {
    let dir = tempdir().unwrap();
    let config = quiet_config(Variant::Simple, dir.path());
    let request = build_request(&curated(10), &context(), &config.synthesis);

    assert_eq!(request.messages.len(), 2);
    assert_eq!(request.max_tokens, 2000);
    let prompt = &request.messages[1].content;
    assert!(prompt.contains("TIP 8:"));
    assert!(!prompt.contains("TIP 9:"));
    assert!(prompt.contains("between 15 and 25"));
}

#[test]
fn fallback_for_empty_set_is_still_a_complete_product() {
    let dir = tempdir().unwrap();
    let config = quiet_config(Variant::Full, dir.path());
    let empty = CuratedSet {
        items: Vec::new(),
        main_topic: String::new(),
    };

    let product = fallback_product(&empty, None, &config.synthesis, "October 2026");

    assert!(product.body.chars().count() >= 500);
    assert!(product.title.chars().count() <= 80);
    assert!(!product.tags.is_empty());
    assert!((1500..=2200).contains(&product.price));
    assert_eq!(product.period, "October 2026");
}

#[test]
fn fallback_price_stays_within_configured_bounds() {
    let dir = tempdir().unwrap();
    let mut config = quiet_config(Variant::Full, dir.path());
    config.synthesis.price.min = 1200;
    config.synthesis.price.max = 1400;

    for _ in 0..50 {
        let product = fallback_product(&curated(3), Some("sales"), &config.synthesis, "October 2026");
        assert!(config.synthesis.price.contains(i64::from(product.price)), "price {}", product.price);
    }
}
