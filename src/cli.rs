use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::{PipelineConfig, Variant};
use crate::download::RedditFeed;
use crate::load_config::{load_config, ConfigOverrides};
use crate::openai::{probe, OpenAiClient};
use crate::pipeline::{run_pipeline, PipelineOutcome};
use crate::report::write_error_log;
use crate::upload::GumroadClient;

/// CLI for threadpress: turn trending discussions into a sellable ebook.
#[derive(Parser)]
#[clap(
    name = "threadpress",
    version,
    about = "Fetch trending discussions, synthesise an ebook, render it to PDF and list it for sale"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full fetch, synthesise, render and publish pipeline
    Run {
        /// Path to an optional YAML config file
        #[clap(long)]
        config: Option<PathBuf>,
        /// Product preset: full or simple
        #[clap(long)]
        variant: Option<Variant>,
        /// Create listings unpublished
        #[clap(long)]
        test_mode: bool,
        /// Directory for PDFs, notes and run summaries
        #[clap(long)]
        output_dir: Option<PathBuf>,
    },
    /// Check that the generative service credential works
    Probe {
        /// Path to an optional YAML config file
        #[clap(long)]
        config: Option<PathBuf>,
    },
}

/// Load the configuration and build every client the run needs.
fn prepare(
    path: Option<&Path>,
    overrides: &ConfigOverrides,
) -> Result<(PipelineConfig, RedditFeed, OpenAiClient, GumroadClient)> {
    let config = load_config(path, overrides)?;
    let feed = RedditFeed::from_config(&config.fetch).context("Failed to build feed client")?;
    let generator =
        OpenAiClient::from_config(&config.synthesis).context("Failed to build generator client")?;
    let marketplace =
        GumroadClient::from_config(&config.publish).context("Failed to build marketplace client")?;
    Ok((config, feed, generator, marketplace))
}

/// Async CLI entrypoint shared by main() and the integration tests.
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Run {
            config,
            variant,
            test_mode,
            output_dir,
        } => {
            let fallback_dir = output_dir
                .clone()
                .unwrap_or_else(|| PipelineConfig::default().output_dir);
            let overrides = ConfigOverrides {
                variant,
                output_dir,
                test_mode,
            };
            let (config, feed, generator, marketplace) =
                match prepare(config.as_deref(), &overrides) {
                    Ok(prepared) => prepared,
                    Err(e) => {
                        eprintln!("[ERROR] Could not start pipeline: {:#}", e);
                        write_error_log(&fallback_dir, &format!("{:#}", e));
                        return Err(e);
                    }
                };

            println!("Pipeline starting...");
            match run_pipeline(&config, &feed, &generator, &marketplace).await {
                PipelineOutcome::Completed(report) => {
                    println!("Pipeline complete.");
                    for run in &report.runs {
                        println!(
                            "- {} ({:?}) -> {}",
                            run.summary.product_title,
                            run.summary.outcome,
                            run.summary
                                .listing_url
                                .as_deref()
                                .unwrap_or("not published")
                        );
                        println!("  summary: {}", run.summary_path.display());
                    }
                    Ok(())
                }
                PipelineOutcome::Failed { error, error_log } => {
                    eprintln!("[ERROR] Pipeline failed: {}", error);
                    if let Some(path) = error_log {
                        eprintln!("[ERROR] Details written to {}", path.display());
                    }
                    Err(anyhow::Error::msg(error))
                }
            }
        }
        Commands::Probe { config } => {
            let config = load_config(config.as_deref(), &ConfigOverrides::default())?;
            let generator =
                OpenAiClient::from_config(&config.synthesis).context("Failed to build generator client")?;
            let reply = probe(&generator)
                .await
                .context("Generative service probe failed")?;
            println!("Generative service reachable, replied: {}", reply);
            Ok(())
        }
    }
}
