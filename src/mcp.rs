use anyhow::{Context, Result};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router, ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::client::ExtractionClient;
use crate::config::Config;
use crate::guard::NavigationBoundary;
use crate::notice::Notice;
use crate::orchestrator::{ExtractOutcome, Orchestrator};
use crate::page_range::expand_page_ranges;
use crate::render::RemoteRenderer;
use crate::save::DownloadDir;
use crate::viewport::{load_document, lock, render_tile, DocumentId, Viewport};

// Request structs for tools

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UploadRequest {
    #[schemars(description = "Path to the PDF file to upload")]
    pub path: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct OpenRequest {
    #[schemars(description = "Document id returned by upload_pdf")]
    pub document_id: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ToggleRequest {
    #[schemars(description = "Page ranges to toggle (e.g., '1-5,10,15-end')")]
    pub pages: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct PreviewRequest {
    #[schemars(description = "1-indexed page number to render as text")]
    pub page: u32,
}

/// One selection session shared by every tool call.
#[derive(Clone)]
pub struct PagePickServer {
    tool_router: ToolRouter<Self>,
    client: ExtractionClient,
    renderer: Arc<RemoteRenderer>,
    viewport: Arc<Mutex<Viewport>>,
    orchestrator: Arc<Orchestrator<ExtractionClient, DownloadDir>>,
}

impl PagePickServer {
    pub fn new(client: ExtractionClient, output_dir: PathBuf) -> Self {
        Self {
            tool_router: Self::tool_router(),
            renderer: Arc::new(RemoteRenderer::new(client.clone())),
            viewport: Arc::new(Mutex::new(Viewport::new(NavigationBoundary::new()))),
            orchestrator: Arc::new(Orchestrator::new(
                client.clone(),
                DownloadDir::new(output_dir),
            )),
            client,
        }
    }

    fn selection_result(&self) -> SelectionResult {
        let viewport = lock(&self.viewport);
        SelectionResult {
            document_id: viewport.document().map(|d| d.to_string()),
            state: viewport.state().name(),
            page_count: viewport.page_count(),
            selected: viewport.selection().snapshot(),
        }
    }
}

#[tool_router]
impl PagePickServer {
    #[tool(description = "Upload a local PDF, open it, and return its id and page count")]
    async fn upload_pdf(
        &self,
        Parameters(UploadRequest { path }): Parameters<UploadRequest>,
    ) -> String {
        let document = match self.client.upload(Path::new(&path)).await {
            Ok(d) => d,
            Err(e) => return format!("Error: {}", e),
        };
        self.open(document).await
    }

    #[tool(description = "Open an uploaded document by id. Clears any previous selection.")]
    async fn open_document(
        &self,
        Parameters(OpenRequest { document_id }): Parameters<OpenRequest>,
    ) -> String {
        self.open(DocumentId::from(document_id)).await
    }

    #[tool(description = "Toggle pages in the selection, e.g. '1-5,10,15-end'")]
    async fn toggle_pages(
        &self,
        Parameters(ToggleRequest { pages }): Parameters<ToggleRequest>,
    ) -> String {
        let result = {
            let mut viewport = lock(&self.viewport);
            if !viewport.accepts_toggles() {
                return "Error: open a document before selecting pages".to_string();
            }
            expand_page_ranges(&pages, viewport.page_count())
                .map(|pages| viewport.toggle_all(&pages))
        };

        match result {
            Ok(rejected) if rejected.is_empty() => to_json(&self.selection_result()),
            Ok(rejected) => format!("Error: no such page(s): {:?}", rejected),
            Err(e) => format!("Error: {:#}", e),
        }
    }

    #[tool(description = "Clear the page selection")]
    async fn clear_selection(&self) -> String {
        lock(&self.viewport).clear_selection();
        to_json(&self.selection_result())
    }

    #[tool(description = "Get the open document, its state, page count, and selected pages")]
    async fn get_selection(&self) -> String {
        to_json(&self.selection_result())
    }

    #[tool(description = "Render one page of the open document as text")]
    async fn preview_page(
        &self,
        Parameters(PreviewRequest { page }): Parameters<PreviewRequest>,
    ) -> String {
        match render_tile(&self.viewport, self.renderer.as_ref(), page).await {
            Ok(rendered) => to_json(&rendered),
            Err(e) => format!("Error: {}", e),
        }
    }

    #[tool(description = "Extract the selected pages into a new PDF saved in the output directory")]
    async fn extract_selection(&self) -> String {
        let outcome = self.orchestrator.extract(&self.viewport).await;
        let result = ExtractResult {
            output_path: match &outcome {
                ExtractOutcome::Saved { path, .. } => Some(path.display().to_string()),
                _ => None,
            },
            pages: match &outcome {
                ExtractOutcome::Saved { pages, .. } => pages.clone(),
                _ => Vec::new(),
            },
            notice: outcome.notice(),
        };
        to_json(&result)
    }
}

impl PagePickServer {
    async fn open(&self, document: DocumentId) -> String {
        match load_document(&self.viewport, self.renderer.as_ref(), document).await {
            Ok(_) => to_json(&self.selection_result()),
            Err(e) => format!("Error: {}", e),
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("Error: {}", e))
}

// Result types for MCP tools

#[derive(Debug, Serialize)]
pub struct SelectionResult {
    pub document_id: Option<String>,
    pub state: &'static str,
    pub page_count: Option<u32>,
    pub selected: Vec<u32>,
}

#[derive(Debug, Serialize)]
pub struct ExtractResult {
    pub output_path: Option<String>,
    pub pages: Vec<u32>,
    pub notice: Notice,
}

#[tool_handler]
impl ServerHandler for PagePickServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Pick pages out of a PDF. Use upload_pdf or open_document to load a document, \
                 toggle_pages and clear_selection to edit the selection, get_selection to inspect \
                 it, preview_page to read a page, and extract_selection to save the selected \
                 pages as a new PDF."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

pub async fn run_server(config: &Config, output_dir: PathBuf) -> Result<()> {
    let client = ExtractionClient::new(config).context("Failed to build HTTP client")?;
    let server = PagePickServer::new(client, output_dir);

    // Serve using stdin/stdout as a tuple
    let service = server.serve((tokio::io::stdin(), tokio::io::stdout())).await?;

    service.waiting().await?;

    Ok(())
}
