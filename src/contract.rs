//! # contract: data passed between pipeline stages and the seams to external services
//!
//! Every collaborator the pipeline talks to sits behind a trait here:
//! - [`FeedClient`]: reads one content feed and returns its raw JSON listing.
//! - [`TextGenerator`]: one prompt in, free-form text out.
//! - [`Layout`]: turns a [`ProductRecord`] into PDF bytes.
//! - [`Marketplace`]: creates a listing and attaches a file to it.
//!
//! The traits are annotated for `mockall`, so tests (and downstream crates with the
//! `test-export-mocks` feature) get `MockFeedClient`, `MockTextGenerator`, `MockLayout` and
//! `MockMarketplace` for free.
//!
//! Data types flow strictly forward: [`ContentItem`] → [`CuratedSet`] → [`ProductRecord`] →
//! [`RenderedDocument`] → [`ListingResult`] → [`RunSummary`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[allow(unused_imports)]
use mockall::{automock, predicate::*};
use serde::{Deserialize, Serialize};

use crate::download::SourceDescriptor;
use crate::error::{FetchError, GenerationError, MarketplaceError, RenderError};

/// One filtered post, ready to be used as raw material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub title: String,
    pub body: String,
    pub popularity_score: i64,
    pub source_name: String,
    pub topic: String,
    pub fetched_at: DateTime<Utc>,
}

/// Ranked, bounded working set fed to synthesis.
#[derive(Debug, Clone)]
pub struct CuratedSet {
    /// Sorted by `popularity_score`, highest first.
    pub items: Vec<ContentItem>,
    pub main_topic: String,
}

impl CuratedSet {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

/// The validated description of the sellable artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub title: String,
    pub description: String,
    /// Expressed in the unit given by `PriceConfig::scale`.
    pub price: u32,
    pub body: String,
    pub tags: Vec<String>,
    pub category: String,
    pub period: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutKind {
    Flow,
    PlainText,
}

/// A PDF on disk produced for one product.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub path: PathBuf,
    pub filename: String,
    pub layout: LayoutKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Published,
    Draft,
}

/// Confirmation that a listing exists on the marketplace.
#[derive(Debug, Clone, Serialize)]
pub struct ListingResult {
    pub remote_id: String,
    pub url: String,
    pub title: String,
    pub price_major_units: f64,
    pub created_at: DateTime<Utc>,
    pub status: ListingStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    Completed,
    Failed,
}

/// Written once per product run, never modified afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub timestamp: DateTime<Utc>,
    pub product_title: String,
    pub price: u32,
    pub artifact_paths: Vec<String>,
    pub outcome: RunOutcome,
    pub listing_url: Option<String>,
}

/// A role-tagged chat message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Fields sent to the marketplace when creating a listing.
#[derive(Debug, Clone, PartialEq)]
pub struct NewListing {
    pub name: String,
    pub price_minor_units: u32,
    pub description: String,
    /// Comma-joined.
    pub tags: String,
    pub published: bool,
    pub require_shipping: bool,
    pub content_type: String,
}

/// What the marketplace returns after a listing is created.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedListing {
    pub id: String,
    pub short_url: Option<String>,
}

/// Reads one feed and returns the raw listing payload.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait FeedClient: Send + Sync {
    async fn fetch_listing(
        &self,
        source: &SourceDescriptor,
    ) -> Result<serde_json::Value, FetchError>;
}

/// The generative text service.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError>;
}

/// A document-layout engine.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait Layout: Send + Sync {
    /// Lay out the product and return the encoded PDF.
    fn layout(&self, product: &ProductRecord) -> Result<Vec<u8>, RenderError>;
}

/// Trait for creating listings on a marketplace and attaching their deliverable.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Marketplace: Send + Sync {
    async fn create_listing(&self, listing: &NewListing) -> Result<CreatedListing, MarketplaceError>;

    /// Upload `file` as the downloadable content of listing `listing_id`.
    async fn attach_content(&self, listing_id: &str, file: &Path) -> Result<(), MarketplaceError>;
}
