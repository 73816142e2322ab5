use crate::client::ExtractionClient;
use crate::config::Config;
use crate::error::ExtractError;
use crate::guard::NavigationBoundary;
use crate::orchestrator::{ExtractOutcome, Orchestrator};
use crate::page_range::expand_page_ranges;
use crate::render::RemoteRenderer;
use crate::save::DownloadDir;
use crate::viewport::{load_document, lock, DocumentId, Viewport};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Mutex;

pub async fn run(
    config: &Config,
    document: DocumentId,
    pages: &str,
    output_dir: PathBuf,
) -> Result<()> {
    let client = ExtractionClient::new(config).context("Failed to build HTTP client")?;
    let renderer = RemoteRenderer::new(client.clone());
    let viewport = Mutex::new(Viewport::new(NavigationBoundary::new()));

    let total = load_document(&viewport, &renderer, document)
        .await
        .map_err(ExtractError::from)?;
    let page_list = expand_page_ranges(pages, Some(total))?;

    lock(&viewport).toggle_all(&page_list);

    let orchestrator = Orchestrator::new(client, DownloadDir::new(output_dir));
    let outcome = orchestrator.extract(&viewport).await;
    let notice = outcome.notice();

    match outcome {
        ExtractOutcome::Saved { .. } => {
            println!("{}", notice);
            Ok(())
        }
        _ => anyhow::bail!("{}", notice.message),
    }
}
