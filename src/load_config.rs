use crate::config::{PipelineConfig, PriceScale, Variant};
use crate::download::SourceDescriptor;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct StaticConfig {
    variant: Option<Variant>,
    output_dir: Option<PathBuf>,
    max_products_per_run: Option<usize>,
    fetch: FetchSection,
    curate: CurateSection,
    synthesis: SynthesisSection,
    render: RenderSection,
    publish: PublishSection,
}

#[derive(Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct FetchSection {
    sources: Option<Vec<SourceDescriptor>>,
    max_sources: Option<usize>,
    min_content_length: Option<usize>,
    score_floor: Option<i64>,
    politeness_delay_secs: Option<u64>,
    timeout_secs: Option<u64>,
    user_agent: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct CurateSection {
    max_items: Option<usize>,
    default_topic: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct SynthesisSection {
    endpoint: Option<String>,
    model: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    max_attempts: Option<u32>,
    prompt_items: Option<usize>,
    price: PriceSection,
    rate_limit_cooldown_secs: Option<u64>,
    error_backoff_secs: Option<u64>,
    timeout_secs: Option<u64>,
}

#[derive(Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct PriceSection {
    min: Option<u32>,
    max: Option<u32>,
    fallback_min: Option<u32>,
    fallback_max: Option<u32>,
    scale: Option<PriceScale>,
}

#[derive(Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct RenderSection {
    max_blocks: Option<usize>,
    fallback_word_cap: Option<usize>,
    fallback_chars_per_line: Option<usize>,
}

#[derive(Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct PublishSection {
    endpoint: Option<String>,
    max_attempts: Option<u32>,
    retry_wait_secs: Option<u64>,
    timeout_secs: Option<u64>,
    test_mode: Option<bool>,
}

/// Credentials and switches that only ever come from the environment.
#[derive(Default)]
pub struct Secrets {
    pub openai_api_key: Option<String>,
    pub gumroad_access_token: Option<String>,
    pub test_mode: bool,
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Secrets {
    /// Reads `OPENAI_API_KEY`, `GUMROAD_ACCESS_TOKEN` and `TEST_MODE`.
    pub fn from_env() -> Self {
        let secrets = Secrets {
            openai_api_key: non_empty_env("OPENAI_API_KEY"),
            gumroad_access_token: non_empty_env("GUMROAD_ACCESS_TOKEN"),
            test_mode: non_empty_env("TEST_MODE")
                .map(|v| v.trim().eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        };
        if secrets.openai_api_key.is_none() {
            warn!("OPENAI_API_KEY not set, products will come from the fallback generator");
        }
        if secrets.gumroad_access_token.is_none() {
            warn!("GUMROAD_ACCESS_TOKEN not set, publication will be skipped");
        }
        secrets
    }
}

/// Command-line switches that take precedence over the file.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub variant: Option<Variant>,
    pub output_dir: Option<PathBuf>,
    pub test_mode: bool,
}

fn read_static(path: &Path) -> Result<StaticConfig> {
    info!(config_path = ?path, "Loading configuration from file");
    let content = fs::read_to_string(path).map_err(|e| {
        error!(error = ?e, config_path = ?path, "Failed to read config file");
        e
    })
    .with_context(|| format!("Failed to read config file {}", path.display()))?;

    let parsed: StaticConfig = serde_yaml::from_str(&content).map_err(|e| {
        error!(error = ?e, config_path = ?path, "Failed to parse config YAML");
        e
    })
    .context("Failed to parse config YAML")?;
    info!(config_path = ?path, "Parsed config YAML successfully");
    Ok(parsed)
}

fn secs(value: Option<u64>, current: Duration) -> Duration {
    value.map(Duration::from_secs).unwrap_or(current)
}

fn merge(file: StaticConfig, secrets: Secrets, overrides: &ConfigOverrides) -> Result<PipelineConfig> {
    let variant = overrides.variant.or(file.variant).unwrap_or_default();
    let mut config = PipelineConfig::for_variant(variant);

    if let Some(dir) = overrides.output_dir.clone().or(file.output_dir) {
        config.output_dir = dir;
    }
    config.render.output_dir = config.output_dir.clone();
    if let Some(n) = file.max_products_per_run {
        config.max_products_per_run = n;
    }

    let fetch = file.fetch;
    if let Some(sources) = fetch.sources {
        config.fetch.sources = sources;
    }
    let f = &mut config.fetch;
    f.max_sources = fetch.max_sources.unwrap_or(f.max_sources);
    f.min_content_length = fetch.min_content_length.unwrap_or(f.min_content_length);
    f.score_floor = fetch.score_floor.unwrap_or(f.score_floor);
    f.politeness_delay = secs(fetch.politeness_delay_secs, f.politeness_delay);
    f.timeout = secs(fetch.timeout_secs, f.timeout);
    if let Some(agent) = fetch.user_agent {
        f.user_agent = agent;
    }

    if let Some(max_items) = file.curate.max_items {
        config.curate.max_items = max_items;
        config.synthesis.prompt_items = max_items;
    }
    if let Some(topic) = file.curate.default_topic {
        config.curate.default_topic = topic;
    }

    let synth = file.synthesis;
    let s = &mut config.synthesis;
    s.api_key = secrets.openai_api_key;
    if let Some(endpoint) = synth.endpoint {
        s.endpoint = endpoint;
    }
    if let Some(model) = synth.model {
        s.model = model;
    }
    s.max_tokens = synth.max_tokens.unwrap_or(s.max_tokens);
    s.temperature = synth.temperature.unwrap_or(s.temperature);
    s.max_attempts = synth.max_attempts.unwrap_or(s.max_attempts);
    s.prompt_items = synth.prompt_items.unwrap_or(s.prompt_items);
    s.rate_limit_cooldown = secs(synth.rate_limit_cooldown_secs, s.rate_limit_cooldown);
    s.error_backoff = secs(synth.error_backoff_secs, s.error_backoff);
    s.timeout = secs(synth.timeout_secs, s.timeout);
    let p = &mut s.price;
    p.min = synth.price.min.unwrap_or(p.min);
    p.max = synth.price.max.unwrap_or(p.max);
    p.fallback_min = synth.price.fallback_min.unwrap_or(p.fallback_min);
    p.fallback_max = synth.price.fallback_max.unwrap_or(p.fallback_max);
    p.scale = synth.price.scale.unwrap_or(p.scale);
    if p.min > p.max {
        bail!("synthesis.price.min ({}) is greater than max ({})", p.min, p.max);
    }
    if p.fallback_min > p.fallback_max {
        bail!(
            "synthesis.price.fallback_min ({}) is greater than fallback_max ({})",
            p.fallback_min,
            p.fallback_max
        );
    }
    if p.fallback_min < p.min || p.fallback_max > p.max {
        bail!(
            "synthesis.price fallback range {}..={} must lie within {}..={}",
            p.fallback_min,
            p.fallback_max,
            p.min,
            p.max
        );
    }

    let r = &mut config.render;
    r.max_blocks = file.render.max_blocks.unwrap_or(r.max_blocks);
    r.fallback_word_cap = file.render.fallback_word_cap.unwrap_or(r.fallback_word_cap);
    r.fallback_chars_per_line = file
        .render
        .fallback_chars_per_line
        .unwrap_or(r.fallback_chars_per_line);

    let publish = file.publish;
    let pb = &mut config.publish;
    pb.access_token = secrets.gumroad_access_token;
    if let Some(endpoint) = publish.endpoint {
        pb.endpoint = endpoint;
    }
    pb.max_attempts = publish.max_attempts.unwrap_or(pb.max_attempts);
    pb.retry_wait = secs(publish.retry_wait_secs, pb.retry_wait);
    pb.timeout = secs(publish.timeout_secs, pb.timeout);
    pb.test_mode = overrides.test_mode || secrets.test_mode || publish.test_mode.unwrap_or(false);

    Ok(config)
}

/// Build the run configuration from an optional YAML file, the environment and CLI overrides.
pub fn load_config(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<PipelineConfig> {
    let file = match path {
        Some(path) => read_static(path)?,
        None => {
            info!("No config file given, using variant defaults");
            StaticConfig::default()
        }
    };
    let config = merge(file, Secrets::from_env(), overrides)?;
    config.trace_loaded();
    Ok(config)
}

/// Same as [`load_config`] with explicit secrets, for callers that do not use the environment.
pub fn load_config_with_secrets(
    path: Option<&Path>,
    secrets: Secrets,
    overrides: &ConfigOverrides,
) -> Result<PipelineConfig> {
    let file = match path {
        Some(path) => read_static(path)?,
        None => StaticConfig::default(),
    };
    merge(file, secrets, overrides)
}
