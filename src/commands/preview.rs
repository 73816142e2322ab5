use crate::client::ExtractionClient;
use crate::config::Config;
use crate::guard::NavigationBoundary;
use crate::page_range::expand_page_ranges;
use crate::render::RemoteRenderer;
use crate::viewport::{load_document, render_tile, DocumentId, Viewport};
use anyhow::{Context, Result};
use std::sync::Mutex;

pub async fn run(config: &Config, document: DocumentId, pages: &str) -> Result<()> {
    let client = ExtractionClient::new(config).context("Failed to build HTTP client")?;
    let renderer = RemoteRenderer::new(client);
    let viewport = Mutex::new(Viewport::new(NavigationBoundary::new()));

    let total = load_document(&viewport, &renderer, document.clone())
        .await
        .with_context(|| format!("Failed to load document {}", document))?;
    let page_list = expand_page_ranges(pages, Some(total))?;

    // One page failing to render does not stop the others
    for page in page_list {
        println!("--- Page {} ---", page);
        match render_tile(&viewport, &renderer, page).await {
            Ok(rendered) => println!("{}", rendered.text),
            Err(e) => println!("(could not render: {})", e),
        }
        println!();
    }

    Ok(())
}
