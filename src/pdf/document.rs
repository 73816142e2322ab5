use anyhow::{Context, Result};
use lopdf::Document;

/// A parsed PDF held in memory.
pub struct PdfDocument {
    pub doc: Document,
}

impl PdfDocument {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let doc = Document::load_mem(bytes).context("Failed to parse PDF")?;
        Ok(PdfDocument { doc })
    }

    pub fn page_count(&self) -> u32 {
        self.doc.get_pages().len() as u32
    }
}
