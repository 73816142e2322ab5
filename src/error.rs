//! Error types for the selection and extraction pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Why an extraction attempt did not produce a document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    /// The rendering side could not open the document.
    #[error("document could not be loaded: {0}")]
    LoadFailure(#[from] LoadError),

    /// Extraction was triggered with nothing selected. Never reaches the network.
    #[error("no pages selected")]
    EmptySelection,

    /// Extraction was attempted without an active document.
    #[error("no document is open")]
    InvalidRequest,

    /// Unreachable backend, timeout, or a non-2xx response.
    #[error("extraction request failed: {0}")]
    TransportFailure(String),

    /// 2xx response whose body is not a document.
    #[error("unusable extraction response: {0}")]
    MalformedResponse(String),
}

impl ExtractError {
    /// Short, stable name of the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractError::LoadFailure(_) => "load_failure",
            ExtractError::EmptySelection => "empty_selection",
            ExtractError::InvalidRequest => "invalid_request",
            ExtractError::TransportFailure(_) => "transport_failure",
            ExtractError::MalformedResponse(_) => "malformed_response",
        }
    }

    /// Message shown to the user. Transport and payload problems read the same.
    pub fn user_message(&self) -> String {
        match self {
            ExtractError::EmptySelection => {
                "Please select at least one page to extract".to_string()
            }
            ExtractError::InvalidRequest => "No document is open".to_string(),
            ExtractError::LoadFailure(e) => format!("The document could not be loaded: {}", e),
            ExtractError::TransportFailure(_) | ExtractError::MalformedResponse(_) => {
                "Failed to extract pages, please try again".to_string()
            }
        }
    }
}

/// The rendering collaborator could not open a document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("failed to fetch document: {0}")]
    Fetch(String),

    #[error("failed to parse document: {0}")]
    Parse(String),

    #[error("document has no pages")]
    Empty,
}

/// A single page could not be rendered. Never fails the whole viewport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("no document is open")]
    NoDocument,

    #[error("page {page} is out of range (1-{total})")]
    PageOutOfRange { page: u32, total: u32 },

    #[error("failed to render page: {0}")]
    Text(String),
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("{} is not a PDF file", .0.display())]
    NotPdf(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("upload failed: {0}")]
    Transport(String),

    #[error("unexpected upload response: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no free file name for {name} in {}", dir.display())]
    NoFreeName { name: String, dir: PathBuf },

    #[error("save was interrupted: {0}")]
    Interrupted(String),
}
