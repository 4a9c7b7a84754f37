//! High-level pipeline: fetch → curate → synthesise → render → publish, once per product.
//!
//! Content is fetched and ranked once per invocation. Product `k` is built from the curated
//! window starting at `k * max_items`, so two products in the same run never share source
//! posts; production stops early once the ranked list is exhausted.
//!
//! Each product run ends with a `run_summary_*.json` file. Its outcome is `completed` only
//! when a listing was created. Errors that stop the whole invocation (no content, unwritable
//! output directory) are written to an `error_log_*.txt` and returned as
//! [`PipelineOutcome::Failed`]; nothing propagates out of [`run_pipeline`].

use std::path::PathBuf;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::config::PipelineConfig;
use crate::contract::{
    FeedClient, ListingResult, Marketplace, RenderedDocument, RunOutcome, RunSummary,
    TextGenerator,
};
use crate::curate;
use crate::download::fetch_all;
use crate::error::PipelineError;
use crate::render::Renderer;
use crate::report::{write_error_log, write_listing_notes, write_summary};
use crate::synthesise::{SynthesisOrigin, Synthesizer};
use crate::upload::Publisher;

/// Everything produced for one product.
#[derive(Debug)]
pub struct ProductRun {
    pub summary: RunSummary,
    pub summary_path: PathBuf,
    pub origin: SynthesisOrigin,
    pub document: Option<RenderedDocument>,
    pub listing: Option<ListingResult>,
}

#[derive(Debug)]
pub struct PipelineReport {
    pub runs: Vec<ProductRun>,
}

#[derive(Debug)]
pub enum PipelineOutcome {
    Completed(PipelineReport),
    Failed {
        error: String,
        error_log: Option<PathBuf>,
    },
}

pub async fn run_pipeline<F, G, M>(
    config: &PipelineConfig,
    feed: &F,
    generator: &G,
    marketplace: &M,
) -> PipelineOutcome
where
    F: FeedClient + ?Sized,
    G: TextGenerator + ?Sized,
    M: Marketplace + ?Sized,
{
    info!(variant = ?config.variant, "[PIPELINE] Starting run");
    match execute(config, feed, generator, marketplace).await {
        Ok(report) => {
            let published = report
                .runs
                .iter()
                .filter(|r| r.summary.outcome == RunOutcome::Completed)
                .count();
            info!(products = report.runs.len(), published, "[PIPELINE] Run finished");
            PipelineOutcome::Completed(report)
        }
        Err(e) => {
            error!(error = %e, "[PIPELINE] Run aborted");
            let error_log = write_error_log(&config.output_dir, &e.to_string());
            PipelineOutcome::Failed {
                error: e.to_string(),
                error_log,
            }
        }
    }
}

async fn execute<F, G, M>(
    config: &PipelineConfig,
    feed: &F,
    generator: &G,
    marketplace: &M,
) -> Result<PipelineReport, PipelineError>
where
    F: FeedClient + ?Sized,
    G: TextGenerator + ?Sized,
    M: Marketplace + ?Sized,
{
    let items = fetch_all(feed, &config.fetch).await;
    if items.is_empty() {
        return Err(PipelineError::NoContent);
    }
    let ranked = curate::rank(items);

    let synthesizer = Synthesizer::new(generator, &config.synthesis);
    let renderer = Renderer::new(&config.render);
    let price = &config.synthesis.price;
    let publisher = Publisher::new(marketplace, &config.publish, price);
    let window = config.curate.max_items.max(1);

    let mut runs = Vec::new();
    for index in 0..config.max_products_per_run {
        let offset = index * window;
        if offset >= ranked.len() {
            info!(produced = index, "[PIPELINE] No content left for further products");
            break;
        }

        let curated = curate::select(&ranked[offset..], &config.curate);
        info!(
            product = index + 1,
            items = curated.len(),
            topic = %curated.main_topic,
            "[PIPELINE] Building product"
        );

        let synthesis = synthesizer.create_product(&curated).await;
        let product = &synthesis.product;
        let document = renderer.render(product);
        let listing = publisher.publish(product, document.as_ref()).await;

        let mut artifact_paths = Vec::new();
        if let Some(doc) = &document {
            artifact_paths.push(doc.path.display().to_string());
        }
        match write_listing_notes(
            &config.output_dir,
            product,
            price,
            document.as_ref(),
            listing.as_ref(),
        ) {
            Ok(path) => artifact_paths.push(path.display().to_string()),
            Err(e) => warn!(error = %e, "[PIPELINE] Could not write listing notes"),
        }

        let summary = RunSummary {
            timestamp: Utc::now(),
            product_title: product.title.clone(),
            price: product.price,
            artifact_paths,
            outcome: if listing.is_some() {
                RunOutcome::Completed
            } else {
                RunOutcome::Failed
            },
            listing_url: listing.as_ref().map(|l| l.url.clone()),
        };
        let summary_path = write_summary(&config.output_dir, &summary)?;

        runs.push(ProductRun {
            summary,
            summary_path,
            origin: synthesis.origin,
            document,
            listing,
        });
    }

    Ok(PipelineReport { runs })
}
