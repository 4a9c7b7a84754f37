//! # Marketplace publishing
//!
//! [`GumroadClient`] implements the [`Marketplace`] trait against a Gumroad-style v2 API:
//! listings are created with a form-encoded POST and the PDF is attached with a multipart POST.
//!
//! [`Publisher`] owns the policy around it:
//! - no access token, no network call;
//! - listing creation is retried on 429/5xx and dropped connections, waiting
//!   `attempt * retry_wait` between attempts;
//! - a failed attachment is logged and the listing is kept.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::config::{PriceConfig, PublishConfig};
use crate::contract::{
    CreatedListing, ListingResult, ListingStatus, Marketplace, NewListing, ProductRecord,
    RenderedDocument,
};
use crate::error::MarketplaceError;

pub struct GumroadClient {
    http: reqwest::Client,
    endpoint: String,
    access_token: Option<String>,
    upload_timeout: Duration,
}

impl GumroadClient {
    pub fn new(
        endpoint: &str,
        access_token: Option<&str>,
        timeout: Duration,
        upload_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        info!(
            endpoint = %endpoint,
            token_set = access_token.is_some(),
            "Initialised marketplace client"
        );
        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            access_token: access_token.map(str::to_string),
            upload_timeout,
        })
    }

    pub fn from_config(config: &PublishConfig) -> Result<Self, reqwest::Error> {
        Self::new(
            &config.endpoint,
            config.access_token.as_deref(),
            config.timeout,
            config.upload_timeout,
        )
    }

    fn token(&self) -> Result<&str, MarketplaceError> {
        self.access_token
            .as_deref()
            .ok_or(MarketplaceError::MissingToken)
    }

    async fn error_from(response: reqwest::Response) -> MarketplaceError {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<failed to decode response body>"));
        MarketplaceError::Status { status, body }
    }
}

#[async_trait]
impl Marketplace for GumroadClient {
    async fn create_listing(&self, listing: &NewListing) -> Result<CreatedListing, MarketplaceError> {
        let token = self.token()?;
        let url = format!("{}/products", self.endpoint);
        let form = [
            ("name", listing.name.clone()),
            ("price", listing.price_minor_units.to_string()),
            ("description", listing.description.clone()),
            ("tags", listing.tags.clone()),
            ("published", listing.published.to_string()),
            ("require_shipping", listing.require_shipping.to_string()),
            ("content_type", listing.content_type.clone()),
        ];

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&form)
            .send()
            .await
            .map_err(|e| MarketplaceError::Transport(e.to_string()))?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(Self::error_from(response).await);
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| MarketplaceError::UnexpectedResponse(e.to_string()))?;
        parse_created_listing(&payload)
    }

    async fn attach_content(&self, listing_id: &str, file: &Path) -> Result<(), MarketplaceError> {
        let token = self.token()?;
        let url = format!("{}/products/{}/content", self.endpoint, listing_id);
        let bytes = tokio::fs::read(file).await?;
        let filename = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "ebook.pdf".to_string());

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename)
            .mime_str("application/pdf")
            .map_err(|e| MarketplaceError::Transport(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("content_file", part);

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .timeout(self.upload_timeout)
            .multipart(form)
            .send()
            .await
            .map_err(|e| MarketplaceError::Transport(e.to_string()))?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(Self::error_from(response).await);
        }
        Ok(())
    }
}

/// Read `product.id` (string or number) and `product.short_url` from a create response.
pub fn parse_created_listing(payload: &Value) -> Result<CreatedListing, MarketplaceError> {
    let product = payload
        .get("product")
        .ok_or_else(|| MarketplaceError::UnexpectedResponse(payload.to_string()))?;
    let id = match product.get("id") {
        Some(Value::String(id)) if !id.is_empty() => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        _ => return Err(MarketplaceError::UnexpectedResponse(payload.to_string())),
    };
    let short_url = product
        .get("short_url")
        .and_then(Value::as_str)
        .filter(|u| !u.is_empty())
        .map(str::to_string);

    Ok(CreatedListing { id, short_url })
}

/// Build the form payload for a product.
pub fn listing_payload(product: &ProductRecord, price: &PriceConfig, test_mode: bool) -> NewListing {
    NewListing {
        name: product.title.clone(),
        price_minor_units: price.to_minor_units(product.price),
        description: product.description.clone(),
        tags: product.tags.join(","),
        published: !test_mode,
        require_shipping: false,
        content_type: "digital".to_string(),
    }
}

pub struct Publisher<'a, M: ?Sized> {
    marketplace: &'a M,
    config: &'a PublishConfig,
    price: &'a PriceConfig,
}

impl<'a, M> Publisher<'a, M>
where
    M: Marketplace + ?Sized,
{
    pub fn new(marketplace: &'a M, config: &'a PublishConfig, price: &'a PriceConfig) -> Self {
        Self {
            marketplace,
            config,
            price,
        }
    }

    async fn create_with_retry(&self, listing: &NewListing) -> Option<CreatedListing> {
        let max_attempts = self.config.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            info!(attempt, max_attempts, name = %listing.name, "[PUBLISH] Creating listing");
            match self.marketplace.create_listing(listing).await {
                Ok(created) => return Some(created),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let wait = self.config.retry_wait * attempt;
                    warn!(attempt, error = %e, wait = ?wait, "[PUBLISH] Transient failure, retrying");
                    tokio::time::sleep(wait).await;
                }
                Err(e) => {
                    error!(attempt, error = %e, "[PUBLISH] Listing creation failed");
                    return None;
                }
            }
        }
        None
    }

    /// Create the listing and attach the document when one exists on disk.
    pub async fn publish(
        &self,
        product: &ProductRecord,
        document: Option<&RenderedDocument>,
    ) -> Option<ListingResult> {
        if self.config.access_token.is_none() {
            error!("[PUBLISH] No marketplace access token configured, skipping publication");
            return None;
        }

        let listing = listing_payload(product, self.price, self.config.test_mode);
        let created = self.create_with_retry(&listing).await?;
        let url = created
            .short_url
            .clone()
            .unwrap_or_else(|| "unavailable".to_string());
        info!(listing_id = %created.id, url = %url, "[PUBLISH] Listing created");

        match document {
            Some(doc) if doc.path.exists() => {
                match self.marketplace.attach_content(&created.id, &doc.path).await {
                    Ok(()) => info!(file = %doc.filename, "[PUBLISH] Document attached"),
                    Err(e) => warn!(
                        listing_id = %created.id,
                        file = %doc.filename,
                        error = %e,
                        "[PUBLISH] Listing created but document upload failed"
                    ),
                }
            }
            Some(doc) => warn!(path = %doc.path.display(), "[PUBLISH] Document missing on disk, listing has no file"),
            None => warn!("[PUBLISH] No document rendered, listing has no file"),
        }

        Some(ListingResult {
            remote_id: created.id,
            url,
            title: product.title.clone(),
            price_major_units: self.price.to_major_units(product.price),
            created_at: Utc::now(),
            status: if self.config.test_mode {
                ListingStatus::Draft
            } else {
                ListingStatus::Published
            },
        })
    }
}
