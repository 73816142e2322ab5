use anyhow::{Context, Result};

/// Extract the text of every page from an in-memory PDF, in page order.
///
/// Page boundaries come from the form feeds pdf-extract emits between pages.
pub fn page_texts(pdf_bytes: &[u8]) -> Result<Vec<String>> {
    let full_text = pdf_extract::extract_text_from_mem(pdf_bytes)
        .context("Failed to extract text from PDF")?;
    Ok(split_pages(&full_text))
}

fn split_pages(full_text: &str) -> Vec<String> {
    full_text
        .split('\x0C')
        .map(|text| text.trim().to_string())
        .collect()
}
