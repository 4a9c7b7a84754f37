use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

use crate::download::SourceDescriptor;

/// Which product preset the pipeline runs with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Rich ebook: 15 curated items, detailed prompt, prices in minor units.
    #[default]
    Full,
    /// Minimal ebook: fewer items, terse prompt, prices in major units.
    Simple,
}

impl std::str::FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(Variant::Full),
            "simple" => Ok(Variant::Simple),
            other => Err(format!("unknown variant '{other}', expected 'full' or 'simple'")),
        }
    }
}

/// The complete, immutable configuration for one process invocation.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub variant: Variant,
    pub output_dir: PathBuf,
    pub max_products_per_run: usize,
    pub fetch: FetchConfig,
    pub curate: CurateConfig,
    pub synthesis: SynthesisConfig,
    pub render: RenderConfig,
    pub publish: PublishConfig,
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub sources: Vec<SourceDescriptor>,
    pub max_sources: usize,
    pub min_content_length: usize,
    /// Items must score strictly above this.
    pub score_floor: i64,
    pub title_cap: usize,
    pub body_cap: usize,
    pub politeness_delay: Duration,
    pub timeout: Duration,
    pub user_agent: String,
}

#[derive(Debug, Clone)]
pub struct CurateConfig {
    pub max_items: usize,
    pub default_topic: String,
}

/// Unit the product price is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceScale {
    /// Cents: 1500 means 15.00.
    Minor,
    /// Whole currency units: 15 means 15.00.
    Major,
}

#[derive(Debug, Clone)]
pub struct PriceConfig {
    pub min: u32,
    pub max: u32,
    pub fallback_min: u32,
    pub fallback_max: u32,
    pub scale: PriceScale,
}

impl PriceConfig {
    pub fn contains(&self, price: i64) -> bool {
        price >= i64::from(self.min) && price <= i64::from(self.max)
    }

    pub fn to_minor_units(&self, price: u32) -> u32 {
        match self.scale {
            PriceScale::Minor => price,
            PriceScale::Major => price.saturating_mul(100),
        }
    }

    pub fn to_major_units(&self, price: u32) -> f64 {
        match self.scale {
            PriceScale::Minor => f64::from(price) / 100.0,
            PriceScale::Major => f64::from(price),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SynthesisConfig {
    pub api_key: Option<String>,
    pub endpoint: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub max_attempts: u32,
    pub prompt_items: usize,
    pub prompt_body_chars: usize,
    pub detailed_prompt: bool,
    pub min_body_chars: usize,
    pub title_max_chars: usize,
    pub fallback_items: usize,
    pub fallback_body_chars: usize,
    pub price: PriceConfig,
    pub rate_limit_cooldown: Duration,
    pub error_backoff: Duration,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub output_dir: PathBuf,
    pub max_blocks: usize,
    pub fallback_word_cap: usize,
    pub fallback_chars_per_line: usize,
}

#[derive(Debug, Clone)]
pub struct PublishConfig {
    pub access_token: Option<String>,
    pub endpoint: String,
    pub test_mode: bool,
    pub max_attempts: u32,
    /// Wait before retry `n` is `n * retry_wait`.
    pub retry_wait: Duration,
    pub timeout: Duration,
    pub upload_timeout: Duration,
}

pub fn default_sources() -> Vec<SourceDescriptor> {
    [
        ("Entrepreneur", "https://www.reddit.com/r/entrepreneur/top.json?limit=25&t=week", "entrepreneurship"),
        ("Small Business", "https://www.reddit.com/r/smallbusiness/top.json?limit=20&t=week", "small business"),
        ("Startups", "https://www.reddit.com/r/startups/top.json?limit=20&t=week", "startups"),
        ("Business", "https://www.reddit.com/r/business/top.json?limit=15&t=week", "business tips"),
    ]
    .into_iter()
    .map(|(name, url, topic)| SourceDescriptor {
        name: name.to_string(),
        url: url.to_string(),
        topic: topic.to_string(),
    })
    .collect()
}

impl PipelineConfig {
    /// Preset for a variant, with no credentials and test mode off.
    pub fn for_variant(variant: Variant) -> Self {
        let output_dir = PathBuf::from("output");
        let (max_items, price, detailed_prompt, max_tokens, temperature) = match variant {
            Variant::Full => (
                15,
                PriceConfig {
                    min: 1200,
                    max: 2500,
                    fallback_min: 1500,
                    fallback_max: 2200,
                    scale: PriceScale::Minor,
                },
                true,
                3500,
                0.8,
            ),
            Variant::Simple => (
                8,
                PriceConfig {
                    min: 15,
                    max: 25,
                    fallback_min: 15,
                    fallback_max: 25,
                    scale: PriceScale::Major,
                },
                false,
                2000,
                0.7,
            ),
        };

        PipelineConfig {
            variant,
            output_dir: output_dir.clone(),
            max_products_per_run: 2,
            fetch: FetchConfig {
                sources: default_sources(),
                max_sources: 3,
                min_content_length: 200,
                score_floor: 5,
                title_cap: 200,
                body_cap: 1500,
                politeness_delay: Duration::from_secs(2),
                timeout: Duration::from_secs(10),
                user_agent: "threadpress/0.1 (content research bot)".to_string(),
            },
            curate: CurateConfig {
                max_items,
                default_topic: "entrepreneurship".to_string(),
            },
            synthesis: SynthesisConfig {
                api_key: None,
                endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
                model: "gpt-3.5-turbo".to_string(),
                max_tokens,
                temperature,
                max_attempts: 3,
                prompt_items: max_items,
                prompt_body_chars: 600,
                detailed_prompt,
                min_body_chars: 500,
                title_max_chars: 80,
                fallback_items: 10,
                fallback_body_chars: 500,
                price,
                rate_limit_cooldown: Duration::from_secs(60),
                error_backoff: Duration::from_secs(5),
                timeout: Duration::from_secs(60),
            },
            render: RenderConfig {
                output_dir,
                max_blocks: 50,
                fallback_word_cap: 1000,
                fallback_chars_per_line: 85,
            },
            publish: PublishConfig {
                access_token: None,
                endpoint: "https://api.gumroad.com/v2".to_string(),
                test_mode: false,
                max_attempts: 3,
                retry_wait: Duration::from_secs(10),
                timeout: Duration::from_secs(30),
                upload_timeout: Duration::from_secs(60),
            },
        }
    }

    pub fn trace_loaded(&self) {
        info!(
            variant = ?self.variant,
            output_dir = %self.output_dir.display(),
            sources_count = self.fetch.sources.len(),
            max_products = self.max_products_per_run,
            test_mode = self.publish.test_mode,
            generator_key_set = self.synthesis.api_key.is_some(),
            marketplace_token_set = self.publish.access_token.is_some(),
            "Loaded PipelineConfig"
        );
        debug!(
            price_min = self.synthesis.price.min,
            price_max = self.synthesis.price.max,
            max_items = self.curate.max_items,
            "PipelineConfig limits"
        );
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig::for_variant(Variant::Full)
    }
}
