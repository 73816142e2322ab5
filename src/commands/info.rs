use crate::client::ExtractionClient;
use crate::config::Config;
use crate::guard::NavigationBoundary;
use crate::render::RemoteRenderer;
use crate::viewport::{load_document, DocumentId, Viewport};
use anyhow::{Context, Result};
use std::sync::Mutex;

pub async fn run(config: &Config, document: DocumentId) -> Result<()> {
    let client = ExtractionClient::new(config).context("Failed to build HTTP client")?;
    let renderer = RemoteRenderer::new(client);
    let viewport = Mutex::new(Viewport::new(NavigationBoundary::new()));

    let page_count = load_document(&viewport, &renderer, document.clone())
        .await
        .with_context(|| format!("Failed to load document {}", document))?;

    println!("Document: {}", document);
    println!("Pages: {}", page_count);

    Ok(())
}
