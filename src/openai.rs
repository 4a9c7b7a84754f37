//! Chat-completions client for the generative text service.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::SynthesisConfig;
use crate::contract::{ChatMessage, CompletionRequest, TextGenerator};
use crate::error::GenerationError;

pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl OpenAiClient {
    pub fn from_config(config: &SynthesisConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        info!(
            api_key_set = config.api_key.is_some(),
            model = %config.model,
            "Initialised generative service client"
        );
        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(GenerationError::MissingCredential);
        };

        let body = ChatRequest {
            model: &self.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        debug!(
            model = %self.model,
            messages = request.messages.len(),
            max_tokens = request.max_tokens,
            "Sending chat completion request"
        );

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                String::new()
            } else {
                response
                    .text()
                    .await
                    .unwrap_or_else(|_| String::from("<failed to decode response body>"))
            };
            return Err(status_error(status.as_u16(), body));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;
        first_content(parsed)
    }
}

/// 429 is the rate-limit signal; any other non-success status is reported with its body.
fn status_error(status: u16, body: String) -> GenerationError {
    if status == 429 {
        warn!("Generative service returned 429");
        GenerationError::RateLimited
    } else {
        GenerationError::Status { status, body }
    }
}

fn first_content(response: ChatResponse) -> Result<String, GenerationError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .ok_or(GenerationError::EmptyResponse)
}

/// Ask the service for a one-word answer to check the credential and connectivity.
pub async fn probe<G>(generator: &G) -> Result<String, GenerationError>
where
    G: TextGenerator + ?Sized,
{
    let request = CompletionRequest {
        messages: vec![ChatMessage::user("Reply with the single word: ok")],
        max_tokens: 10,
        temperature: 0.0,
    };
    generator.complete(&request).await
}
