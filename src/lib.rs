//! threadpress: fetch popular discussion threads, curate them, have a language model write an
//! ebook from them, render it to PDF and list it on a digital-goods marketplace.
//!
//! Every external service sits behind a trait in [`contract`]; [`pipeline::run_pipeline`]
//! wires the stages together and never panics or propagates errors past a run summary.

pub mod cli;
pub mod config;
pub mod contract;
pub mod curate;
pub mod download;
pub mod error;
pub mod fallback;
pub mod load_config;
pub mod openai;
pub mod pipeline;
pub mod render;
pub mod report;
pub mod synthesise;
pub mod upload;

pub use cli::{run, Cli, Commands};
