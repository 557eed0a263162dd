use anyhow::Result;
use healthgpt::cli;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run().await
}
