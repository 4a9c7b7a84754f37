//! Files left behind by a run: the JSON summary, the listing notes and the error log.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, Utc};
use tracing::{error, info};

use crate::config::PriceConfig;
use crate::contract::{ListingResult, ProductRecord, RenderedDocument, RunSummary};
use crate::error::PipelineError;
use crate::render::unique_filename;

/// Write `summary` to a new `run_summary_*.json` in `dir`.
pub fn write_summary(dir: &Path, summary: &RunSummary) -> Result<PathBuf, PipelineError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(unique_filename("run_summary", "json"));
    let json = serde_json::to_string_pretty(summary)?;
    fs::write(&path, json)?;
    info!(path = %path.display(), outcome = ?summary.outcome, "[PIPELINE] Run summary written");
    Ok(path)
}

/// Plain-text sheet describing the product, for whoever lists or audits it.
pub fn write_listing_notes(
    dir: &Path,
    product: &ProductRecord,
    price: &PriceConfig,
    document: Option<&RenderedDocument>,
    listing: Option<&ListingResult>,
) -> std::io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(unique_filename("listing_notes", "txt"));

    let file = document
        .map(|d| d.path.display().to_string())
        .unwrap_or_else(|| "none (rendering failed)".to_string());
    let listing_line = match listing {
        Some(l) => format!("{} ({:?})", l.url, l.status),
        None => "not published".to_string(),
    };

    let notes = format!(
        "PRODUCT READY TO SELL\n\
=====================\n\n\
Title:       {title}\n\
Price:       {price:.2}\n\
File:        {file}\n\
Created:     {created}\n\
Category:    {category}\n\
Tags:        {tags}\n\
Listing:     {listing_line}\n\n\
Description:\n{description}\n",
        title = product.title,
        price = price.to_major_units(product.price),
        created = Local::now().format("%d/%m/%Y %H:%M"),
        category = product.category,
        tags = product.tags.join(", "),
        description = product.description,
    );

    fs::write(&path, notes)?;
    Ok(path)
}

/// Record a fatal error. Returns `None` if even that fails.
pub fn write_error_log(dir: &Path, message: &str) -> Option<PathBuf> {
    let attempt = || -> std::io::Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!(
            "error_log_{}.txt",
            Local::now().format("%Y%m%d_%H%M%S")
        ));
        fs::write(&path, format!("Error: {message}\nDate: {}\n", Utc::now().to_rfc3339()))?;
        Ok(path)
    };

    match attempt() {
        Ok(path) => {
            info!(path = %path.display(), "[PIPELINE] Error log written");
            Some(path)
        }
        Err(e) => {
            error!(error = %e, dir = %dir.display(), "[PIPELINE] Could not write error log");
            None
        }
    }
}
