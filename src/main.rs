use anyhow::Result;
use clap::Parser;
use threadpress::{run, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    run(cli).await
}
