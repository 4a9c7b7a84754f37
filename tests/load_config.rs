use std::env;
use std::fs::write;
use std::path::PathBuf;
use std::time::Duration;

use serial_test::serial;
use tempfile::NamedTempFile;
use threadpress::config::{PriceScale, Variant};
use threadpress::load_config::{load_config, load_config_with_secrets, ConfigOverrides, Secrets};

fn clear_env() {
    env::remove_var("OPENAI_API_KEY");
    env::remove_var("GUMROAD_ACCESS_TOKEN");
    env::remove_var("TEST_MODE");
}

fn config_file(yaml: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("temp file");
    write(file.path(), yaml).expect("write config");
    file
}

/// Secrets come only from the environment and are injected into the presets.
#[test]
#[serial]
fn env_secrets_are_injected_without_a_file() {
    clear_env();
    env::set_var("OPENAI_API_KEY", "sk-test");
    env::set_var("GUMROAD_ACCESS_TOKEN", "gum-test");
    env::set_var("TEST_MODE", "TRUE");

    let config = load_config(None, &ConfigOverrides::default()).expect("Config should load");

    assert_eq!(config.variant, Variant::Full);
    assert_eq!(config.synthesis.api_key.as_deref(), Some("sk-test"));
    assert_eq!(config.publish.access_token.as_deref(), Some("gum-test"));
    assert!(config.publish.test_mode);
    assert_eq!(config.output_dir, PathBuf::from("output"));
    clear_env();
}

#[test]
#[serial]
fn blank_env_values_count_as_missing() {
    clear_env();
    env::set_var("OPENAI_API_KEY", "   ");
    env::set_var("TEST_MODE", "yes");

    let config = load_config(None, &ConfigOverrides::default()).expect("Config should load");

    assert!(config.synthesis.api_key.is_none());
    assert!(config.publish.access_token.is_none());
    assert!(!config.publish.test_mode);
    clear_env();
}

#[test]
#[serial]
fn file_values_overlay_the_variant_preset() {
    clear_env();
    let file = config_file(
        r#"
variant: simple
output_dir: ./tmp/products
max_products_per_run: 1
fetch:
  politeness_delay_secs: 0
  sources:
    - name: Indie Hackers
      url: https://feeds.test/indie.json
      topic: indie hacking
curate:
  max_items: 5
synthesis:
  model: gpt-4o-mini
  price:
    min: 10
    max: 30
publish:
  retry_wait_secs: 1
"#,
    );

    let config = load_config(Some(file.path()), &ConfigOverrides::default()).expect("Config should load");

    assert_eq!(config.variant, Variant::Simple);
    assert_eq!(config.output_dir, PathBuf::from("./tmp/products"));
    assert_eq!(config.render.output_dir, config.output_dir);
    assert_eq!(config.max_products_per_run, 1);
    assert_eq!(config.fetch.politeness_delay, Duration::ZERO);
    assert_eq!(config.fetch.sources.len(), 1);
    assert_eq!(config.fetch.sources[0].topic, "indie hacking");
    assert_eq!(config.curate.max_items, 5);
    assert_eq!(config.synthesis.prompt_items, 5);
    assert_eq!(config.synthesis.model, "gpt-4o-mini");
    assert_eq!(config.synthesis.price.min, 10);
    assert_eq!(config.synthesis.price.max, 30);
    assert_eq!(config.synthesis.price.scale, PriceScale::Major);
    assert_eq!(config.publish.retry_wait, Duration::from_secs(1));
}

#[test]
#[serial]
fn command_line_overrides_win_over_the_file() {
    clear_env();
    let file = config_file("variant: simple\noutput_dir: ./from-file\n");
    let overrides = ConfigOverrides {
        variant: Some(Variant::Full),
        output_dir: Some(PathBuf::from("./from-cli")),
        test_mode: true,
    };

    let config = load_config(Some(file.path()), &overrides).expect("Config should load");

    assert_eq!(config.variant, Variant::Full);
    assert_eq!(config.curate.max_items, 15);
    assert_eq!(config.output_dir, PathBuf::from("./from-cli"));
    assert!(config.publish.test_mode);
}

#[test]
#[serial]
fn missing_file_is_an_error() {
    clear_env();
    let result = load_config(
        Some(std::path::Path::new("/definitely/not/here.yaml")),
        &ConfigOverrides::default(),
    );
    assert!(result.is_err());
}

#[test]
fn unknown_keys_are_rejected() {
    let file = config_file("fetch:\n  sourcez: []\n");
    let result = load_config_with_secrets(Some(file.path()), Secrets::default(), &ConfigOverrides::default());
    assert!(result.is_err());
}

#[test]
fn inverted_price_range_is_rejected() {
    let file = config_file("synthesis:\n  price:\n    min: 3000\n    max: 1000\n");
    let result = load_config_with_secrets(Some(file.path()), Secrets::default(), &ConfigOverrides::default());
    let err = result.expect_err("inverted range must fail");
    assert!(err.to_string().contains("greater than max"));
}

#[test]
fn explicit_secrets_bypass_the_environment() {
    let secrets = Secrets {
        openai_api_key: Some("sk-explicit".to_string()),
        gumroad_access_token: None,
        test_mode: false,
    };
    let config = load_config_with_secrets(None, secrets, &ConfigOverrides::default()).unwrap();
    assert_eq!(config.synthesis.api_key.as_deref(), Some("sk-explicit"));
    assert!(config.publish.access_token.is_none());
}

#[test]
fn fallback_range_outside_main_range_is_rejected() {
    let file = config_file("synthesis:\n  price:\n    min: 1200\n    max: 1400\n");
    let result = load_config_with_secrets(Some(file.path()), Secrets::default(), &ConfigOverrides::default());
    let err = result.expect_err("fallback range above max must fail");
    assert!(err.to_string().contains("must lie within"));
}

#[test]
fn narrowed_ranges_that_nest_are_accepted() {
    let file = config_file(
        "synthesis:\n  price:\n    min: 1200\n    max: 1400\n    fallback_min: 1250\n    fallback_max: 1350\n",
    );
    let config = load_config_with_secrets(Some(file.path()), Secrets::default(), &ConfigOverrides::default())
        .expect("nested ranges are valid");
    assert_eq!(config.synthesis.price.fallback_min, 1250);
    assert_eq!(config.synthesis.price.fallback_max, 1350);
}
