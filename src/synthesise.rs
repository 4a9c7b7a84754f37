//! Product synthesis: turn a curated set into a validated [`ProductRecord`].
//!
//! The generative service is asked at most `max_attempts` times. Each answer is unfenced,
//! parsed, validated and repaired; whatever cannot be repaired is retried, and once the
//! attempts run out the deterministic generator in [`crate::fallback`] takes over. The public
//! entry point, [`Synthesizer::create_product`], therefore never fails.

use rand::Rng;
use serde_json::{Map, Value};
use tracing::{error, info, warn};

use crate::config::{PriceConfig, SynthesisConfig};
use crate::contract::{ChatMessage, CompletionRequest, CuratedSet, ProductRecord, TextGenerator};
use crate::download::truncate_chars;
use crate::error::{GenerationError, SynthesisError};
use crate::fallback::fallback_product;

const SYSTEM_PROMPT: &str = "You are an expert at creating sellable digital products. \
You always return valid JSON and content that is fully rewritten in your own words.";

/// Where a product came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisOrigin {
    /// The generative service produced it on this attempt (1-based).
    Generated { attempt: u32 },
    Fallback,
}

#[derive(Debug, Clone)]
pub struct Synthesis {
    pub product: ProductRecord,
    pub origin: SynthesisOrigin,
}

/// Values the prompt promised the service, used to fill gaps in its answer.
#[derive(Debug, Clone)]
pub struct PromptContext {
    pub topic: String,
    pub period: String,
}

/// Month and year, e.g. "October 2026".
pub fn current_period() -> String {
    chrono::Local::now().format("%B %Y").to_string()
}

pub fn build_request(
    curated: &CuratedSet,
    context: &PromptContext,
    config: &SynthesisConfig,
) -> CompletionRequest {
    let tips = curated
        .items
        .iter()
        .take(config.prompt_items)
        .enumerate()
        .map(|(i, item)| {
            format!(
                "TIP {}: {}\n{}",
                i + 1,
                item.title,
                truncate_chars(&item.body, config.prompt_body_chars)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let topic = &context.topic;
    let period = &context.period;
    let (min, max) = (config.price.min, config.price.max);

    let prompt = if config.detailed_prompt {
        format!(
            "Write a professional ebook about {topic} using these real tips from practitioners:\n\n\
{tips}\n\n\
IMPORTANT:\n\
- Transform and paraphrase ALL of the material, never copy sentences verbatim\n\
- Add value by organising and structuring the ideas\n\
- Write an original introduction and conclusion\n\
- Make it a premium product people want to buy\n\n\
Return ONLY a valid JSON object with exactly this structure:\n\
{{\n\
    \"title\": \"Compelling sales title (max 60 characters)\",\n\
    \"description\": \"Persuasive sales description of 150-200 words\",\n\
    \"price\": integer between {min} and {max},\n\
    \"body\": \"Complete ebook with 8-10 chapters, each starting with 'CHAPTER n:', plus an introduction and a conclusion\",\n\
    \"tags\": [\"tag1\", \"tag2\", \"tag3\", \"tag4\", \"tag5\"],\n\
    \"category\": \"{topic}\",\n\
    \"period\": \"{period}\"\n\
}}\n\n\
The content must be completely rewritten and professional."
        )
    } else {
        format!(
            "Write a short ebook about \"{topic}\" based on these tips:\n\n\
{tips}\n\n\
Return ONLY a JSON object with this structure:\n\
{{\n\
    \"title\": \"Catchy title, max 60 characters\",\n\
    \"price\": integer between {min} and {max},\n\
    \"body\": \"Ebook of 8 chapters with introduction and conclusion, at least 1000 words\",\n\
    \"description\": \"Sales description of about 100 words\",\n\
    \"tags\": [\"tag1\", \"tag2\", \"tag3\"],\n\
    \"category\": \"{topic}\",\n\
    \"period\": \"{period}\"\n\
}}\n\n\
Only the JSON, nothing else."
        )
    };

    CompletionRequest {
        messages: vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)],
        max_tokens: config.max_tokens,
        temperature: config.temperature,
    }
}

/// Remove a surrounding ```` ```json ```` / ```` ``` ```` fence, if any.
pub fn strip_code_fence(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

fn parse_json(raw: &str) -> Result<Value, SynthesisError> {
    let unfenced = strip_code_fence(raw);
    match serde_json::from_str::<Value>(unfenced) {
        Ok(value) => Ok(value),
        Err(first_err) => {
            // Prose around the object: retry on the outermost braces.
            match (unfenced.find('{'), unfenced.rfind('}')) {
                (Some(start), Some(end)) if start < end => {
                    Ok(serde_json::from_str::<Value>(&unfenced[start..=end])?)
                }
                _ => Err(SynthesisError::Parse(first_err)),
            }
        }
    }
}

/// Truncate to `max_chars`, ending in "..." when anything was cut.
pub fn repair_title(title: &str, max_chars: usize) -> String {
    if title.chars().count() <= max_chars {
        return title.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    format!("{}...", truncate_chars(title, keep))
}

/// Keep an in-range integer price, otherwise draw one from the configured range.
pub fn repair_price(value: &Value, price: &PriceConfig) -> u32 {
    match value.as_i64() {
        Some(p) if price.contains(p) => p as u32,
        _ => rand::rng().random_range(price.min..=price.max),
    }
}

fn required_str<'a>(
    object: &'a Map<String, Value>,
    key: &'static str,
) -> Result<&'a str, SynthesisError> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(SynthesisError::MissingField(key))
}

fn optional_str(object: &Map<String, Value>, key: &str, default: &str) -> String {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(default)
        .to_string()
}

fn parse_tags(value: Option<&Value>) -> Vec<String> {
    let raw: Vec<String> = match value {
        Some(Value::Array(entries)) => entries
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(joined)) => joined.split(',').map(str::to_string).collect(),
        _ => Vec::new(),
    };

    let mut tags: Vec<String> = Vec::new();
    for tag in raw {
        let tag = tag.trim().to_string();
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

/// Parse, validate and repair one raw answer from the generative service.
pub fn parse_product(
    raw: &str,
    context: &PromptContext,
    config: &SynthesisConfig,
) -> Result<ProductRecord, SynthesisError> {
    let value = parse_json(raw)?;
    let object = value.as_object().ok_or(SynthesisError::NotAnObject)?;

    let title = required_str(object, "title")?;
    let description = required_str(object, "description")?;
    let price_value = object
        .get("price")
        .filter(|p| !p.is_null())
        .ok_or(SynthesisError::MissingField("price"))?;
    let body = required_str(object, "body")?;
    let tags = parse_tags(object.get("tags"));
    if tags.is_empty() {
        return Err(SynthesisError::MissingField("tags"));
    }

    let body_len = body.chars().count();
    if body_len < config.min_body_chars {
        return Err(SynthesisError::BodyTooShort {
            len: body_len,
            min: config.min_body_chars,
        });
    }

    Ok(ProductRecord {
        title: repair_title(title, config.title_max_chars),
        description: description.to_string(),
        price: repair_price(price_value, &config.price),
        body: body.to_string(),
        tags,
        category: optional_str(object, "category", &context.topic),
        period: optional_str(object, "period", &context.period),
    })
}

/// Drives the generative service with bounded retries and a fallback.
pub struct Synthesizer<'a, G: ?Sized> {
    generator: &'a G,
    config: &'a SynthesisConfig,
}

impl<'a, G> Synthesizer<'a, G>
where
    G: TextGenerator + ?Sized,
{
    pub fn new(generator: &'a G, config: &'a SynthesisConfig) -> Self {
        Self { generator, config }
    }

    pub async fn create_product(&self, curated: &CuratedSet) -> Synthesis {
        let context = PromptContext {
            topic: curated.main_topic.clone(),
            period: current_period(),
        };
        let request = build_request(curated, &context, self.config);
        let max_attempts = self.config.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            info!(attempt, max_attempts, topic = %context.topic, "[SYNTH] Requesting product");
            let retries_left = attempt < max_attempts;

            match self.generator.complete(&request).await {
                Ok(raw) => match parse_product(&raw, &context, self.config) {
                    Ok(product) => {
                        info!(attempt, title = %product.title, price = product.price, "[SYNTH] Product generated");
                        return Synthesis {
                            product,
                            origin: SynthesisOrigin::Generated { attempt },
                        };
                    }
                    Err(e) => {
                        warn!(attempt, error = %e, "[SYNTH] Unusable response, retrying immediately");
                    }
                },
                Err(GenerationError::MissingCredential) => {
                    warn!("[SYNTH] No generative service credential, using fallback");
                    break;
                }
                Err(GenerationError::RateLimited) => {
                    warn!(attempt, cooldown = ?self.config.rate_limit_cooldown, "[SYNTH] Rate limited");
                    if retries_left {
                        tokio::time::sleep(self.config.rate_limit_cooldown).await;
                    }
                }
                Err(e) => {
                    error!(attempt, error = %e, "[SYNTH] Generative service error");
                    if retries_left {
                        tokio::time::sleep(self.config.error_backoff).await;
                    }
                }
            }
        }

        warn!(items = curated.len(), "[SYNTH] Falling back to template product");
        Synthesis {
            product: fallback_product(curated, Some(&context.topic), self.config, &context.period),
            origin: SynthesisOrigin::Fallback,
        }
    }
}
