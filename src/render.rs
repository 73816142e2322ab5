//! The rendering side: page counts and page contents for a document id.

use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::client::ExtractionClient;
use crate::error::{LoadError, RenderError};
use crate::pdf::{page_texts, PdfDocument};
use crate::selection::PageNumber;
use crate::viewport::DocumentId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedPage {
    pub page: PageNumber,
    pub text: String,
}

pub trait PageRenderer: Send + Sync {
    /// Open `document` and report its page count.
    fn load(&self, document: &DocumentId) -> impl Future<Output = Result<u32, LoadError>> + Send;

    fn render_page(
        &self,
        document: &DocumentId,
        page: PageNumber,
    ) -> impl Future<Output = Result<RenderedPage, RenderError>> + Send;
}

struct LoadedDocument {
    id: DocumentId,
    bytes: Arc<Vec<u8>>,
    page_count: u32,
    /// Text of every page, extracted on the first render.
    texts: Option<Arc<Vec<String>>>,
}

/// Renders documents fetched from the backend. A terminal cannot show a
/// page image, so a page renders as its text.
pub struct RemoteRenderer {
    client: ExtractionClient,
    loaded: Mutex<Option<LoadedDocument>>,
}

impl RemoteRenderer {
    pub fn new(client: ExtractionClient) -> Self {
        RemoteRenderer {
            client,
            loaded: Mutex::new(None),
        }
    }

    /// Bytes and page count of `document`, fetched at most once while it
    /// stays the current one.
    async fn fetch(&self, document: &DocumentId) -> Result<(Arc<Vec<u8>>, u32), LoadError> {
        let mut loaded = self.loaded.lock().await;
        if let Some(doc) = loaded.as_ref().filter(|doc| &doc.id == document) {
            return Ok((Arc::clone(&doc.bytes), doc.page_count));
        }

        let bytes = self.client.fetch_document(document).await?;
        let page_count = PdfDocument::parse(&bytes)
            .map_err(|e| LoadError::Parse(format!("{:#}", e)))?
            .page_count();
        if page_count == 0 {
            return Err(LoadError::Empty);
        }

        let bytes = Arc::new(bytes);
        *loaded = Some(LoadedDocument {
            id: document.clone(),
            bytes: Arc::clone(&bytes),
            page_count,
            texts: None,
        });
        Ok((bytes, page_count))
    }

    /// Page texts of `document`, extracted at most once while it stays the
    /// current one. The lock is not held during extraction.
    async fn texts(
        &self,
        document: &DocumentId,
        bytes: Arc<Vec<u8>>,
    ) -> Result<Arc<Vec<String>>, RenderError> {
        let cached = self
            .loaded
            .lock()
            .await
            .as_ref()
            .filter(|doc| &doc.id == document)
            .and_then(|doc| doc.texts.clone());
        if let Some(texts) = cached {
            return Ok(texts);
        }

        let texts = tokio::task::spawn_blocking(move || page_texts(&bytes))
            .await
            .map_err(|e| RenderError::Text(e.to_string()))?
            .map_err(|e| RenderError::Text(format!("{:#}", e)))?;
        let texts = Arc::new(texts);

        if let Some(doc) = self.loaded.lock().await.as_mut() {
            if &doc.id == document {
                doc.texts = Some(Arc::clone(&texts));
            }
        }
        Ok(texts)
    }
}

impl PageRenderer for RemoteRenderer {
    async fn load(&self, document: &DocumentId) -> Result<u32, LoadError> {
        let (_, page_count) = self.fetch(document).await?;
        Ok(page_count)
    }

    async fn render_page(
        &self,
        document: &DocumentId,
        page: PageNumber,
    ) -> Result<RenderedPage, RenderError> {
        let (bytes, total) = self.fetch(document).await?;
        if page == 0 || page > total {
            return Err(RenderError::PageOutOfRange { page, total });
        }

        let texts = self.texts(document, bytes).await?;
        let text = texts
            .get((page - 1) as usize)
            .cloned()
            .unwrap_or_default();

        Ok(RenderedPage { page, text })
    }
}
