//! Error types for each pipeline stage.
//!
//! Stage boundaries (fetch, synthesis, render, publish) never let these escape to the caller
//! for recoverable conditions; they are logged and turned into an empty result, a fallback, or
//! `None`. Only [`PipelineError`] reaches the orchestrator, which writes it to an error log.

use thiserror::Error;

/// Failure while reading a single content feed.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
    #[error("malformed listing payload: {0}")]
    Malformed(String),
}

/// Failure reported by the generative text service.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("no credential configured for the generative service")]
    MissingCredential,
    #[error("generative service is rate limiting requests")]
    RateLimited,
    #[error("generative service answered with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("generative service request failed: {0}")]
    Transport(String),
    #[error("generative service returned no content")]
    EmptyResponse,
}

/// A response from the generative service that could not be turned into a product.
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("response is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("response JSON is not an object")]
    NotAnObject,
    #[error("required field '{0}' is missing or empty")]
    MissingField(&'static str),
    #[error("body has {len} characters, at least {min} required")]
    BodyTooShort { len: usize, min: usize },
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("io error while writing document: {0}")]
    Io(#[from] std::io::Error),
    #[error("product body has no renderable text")]
    EmptyBody,
    #[error("layout failed: {0}")]
    Layout(String),
}

#[derive(Debug, Error)]
pub enum MarketplaceError {
    #[error("no marketplace access token configured")]
    MissingToken,
    #[error("marketplace answered with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("marketplace request failed: {0}")]
    Transport(String),
    #[error("unexpected marketplace response: {0}")]
    UnexpectedResponse(String),
    #[error("could not read document for upload: {0}")]
    Io(#[from] std::io::Error),
}

impl MarketplaceError {
    /// Rate limiting, server-side failures and dropped connections are worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            MarketplaceError::Status { status, .. } => *status == 429 || (500..=599).contains(status),
            MarketplaceError::Transport(_) => true,
            MarketplaceError::MissingToken
            | MarketplaceError::UnexpectedResponse(_)
            | MarketplaceError::Io(_) => false,
        }
    }
}

/// Anything that stops a whole run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no qualifying content was fetched from any source")]
    NoContent,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not serialise run summary: {0}")]
    Serialize(#[from] serde_json::Error),
}
