use crate::client::ExtractionClient;
use crate::config::Config;
use anyhow::{Context, Result};
use std::path::Path;

pub async fn run(config: &Config, path: &Path) -> Result<()> {
    let client = ExtractionClient::new(config).context("Failed to build HTTP client")?;
    let document = client.upload(path).await?;

    println!("Uploaded {}", path.display());
    println!("Document: {}", document);

    Ok(())
}
