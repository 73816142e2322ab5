//! Turns an extract intent into a saved document.

use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::client::ExtractionRequest;
use crate::error::{ExtractError, SaveError};
use crate::notice::Notice;
use crate::save::SaveTarget;
use crate::selection::PageNumber;
use crate::viewport::{lock, Viewport, ViewportState};

/// Sends an extraction request and hands back the document bytes.
pub trait Extractor: Send + Sync {
    fn extract(
        &self,
        request: &ExtractionRequest,
    ) -> impl Future<Output = Result<Vec<u8>, ExtractError>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    Extracting,
}

#[derive(Debug)]
pub enum ExtractOutcome {
    Saved {
        path: PathBuf,
        pages: Vec<PageNumber>,
    },
    Failed(ExtractError),
    SaveFailed(SaveError),
    /// The document is still loading.
    NotReady,
    /// Another extraction is in flight; this trigger was ignored.
    Busy,
    /// The document changed while the request was in flight.
    Discarded,
}

impl ExtractOutcome {
    pub fn notice(&self) -> Notice {
        match self {
            ExtractOutcome::Saved { path, pages } => Notice::success(format!(
                "PDF extracted successfully: {} ({} page(s))",
                path.display(),
                pages.len()
            )),
            ExtractOutcome::Failed(ExtractError::EmptySelection) => {
                Notice::warning(ExtractError::EmptySelection.user_message())
            }
            ExtractOutcome::Failed(e) => Notice::error(e.user_message()),
            ExtractOutcome::SaveFailed(e) => {
                Notice::error(format!("Failed to save extracted pages: {}", e))
            }
            ExtractOutcome::NotReady => {
                Notice::info("Wait for the document to finish loading before extracting")
            }
            ExtractOutcome::Busy => Notice::info("An extraction is already in progress"),
            ExtractOutcome::Discarded => {
                Notice::info("Discarded the result for a document that is no longer open")
            }
        }
    }
}

pub struct Orchestrator<E, S> {
    extractor: E,
    target: Arc<S>,
    extracting: AtomicBool,
}

/// Marks an extraction as in flight; returns the orchestrator to idle when
/// dropped, whichever way the extraction ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<E: Extractor, S: SaveTarget + 'static> Orchestrator<E, S> {
    pub fn new(extractor: E, target: S) -> Self {
        Orchestrator {
            extractor,
            target: Arc::new(target),
            extracting: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> OrchestratorState {
        if self.extracting.load(Ordering::SeqCst) {
            OrchestratorState::Extracting
        } else {
            OrchestratorState::Idle
        }
    }

    /// Extract the current selection of `viewport` and save the result.
    ///
    /// The viewport lock is only held while taking the snapshot and while
    /// checking that the document is still the same afterwards, so toggles
    /// made during the request go to the next extraction.
    pub async fn extract(&self, viewport: &Mutex<Viewport>) -> ExtractOutcome {
        let Some(_in_flight) = self.begin() else {
            tracing::debug!("Extraction already in flight, ignoring trigger");
            return ExtractOutcome::Busy;
        };

        let (request, generation) = {
            let viewport = lock(viewport);
            if viewport.selection().is_empty() {
                return ExtractOutcome::Failed(ExtractError::EmptySelection);
            }
            if matches!(viewport.state(), ViewportState::Loading { .. }) {
                return ExtractOutcome::NotReady;
            }
            let request = match ExtractionRequest::new(
                viewport.document().cloned(),
                viewport.selection().snapshot(),
            ) {
                Ok(request) => request,
                Err(e) => return ExtractOutcome::Failed(e),
            };
            (request, viewport.generation())
        };

        tracing::info!(
            document = %request.document(),
            pages = ?request.pages(),
            "Extracting pages"
        );
        let result = self.extractor.extract(&request).await;

        if !lock(viewport).is_current(generation) {
            tracing::warn!(
                document = %request.document(),
                "Document replaced during extraction, discarding result"
            );
            return ExtractOutcome::Discarded;
        }

        match result {
            Ok(payload) => match self.save(payload).await {
                Ok(path) => ExtractOutcome::Saved {
                    path,
                    pages: request.pages().to_vec(),
                },
                Err(e) => {
                    tracing::error!(error = %e, "Failed to save extracted document");
                    ExtractOutcome::SaveFailed(e)
                }
            },
            Err(e) => {
                tracing::warn!(kind = e.kind(), error = %e, "Extraction failed");
                ExtractOutcome::Failed(e)
            }
        }
    }

    /// Saving writes and syncs a file, so it runs on the blocking pool.
    async fn save(&self, payload: Vec<u8>) -> Result<PathBuf, SaveError> {
        let target = Arc::clone(&self.target);
        tokio::task::spawn_blocking(move || target.save(payload))
            .await
            .map_err(|e| SaveError::Interrupted(e.to_string()))?
    }

    fn begin(&self) -> Option<InFlight<'_>> {
        self.extracting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| InFlight(&self.extracting))
    }
}
