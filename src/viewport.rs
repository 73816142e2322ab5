//! Document lifecycle and the tiles derived from it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

use crate::error::{LoadError, RenderError};
use crate::guard::{Intercept, NavigationBoundary};
use crate::render::{PageRenderer, RenderedPage};
use crate::selection::{PageNumber, SelectionStore};

/// Opaque identifier handed out by the upload endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for DocumentId {
    fn from(id: String) -> Self {
        DocumentId(id)
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        DocumentId(id.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewportState {
    Unloaded,
    Loading {
        document: DocumentId,
    },
    Ready {
        document: DocumentId,
        page_count: u32,
    },
    Errored {
        document: DocumentId,
        error: LoadError,
    },
}

impl ViewportState {
    pub fn document(&self) -> Option<&DocumentId> {
        match self {
            ViewportState::Unloaded => None,
            ViewportState::Loading { document }
            | ViewportState::Ready { document, .. }
            | ViewportState::Errored { document, .. } => Some(document),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ViewportState::Unloaded => "unloaded",
            ViewportState::Loading { .. } => "loading",
            ViewportState::Ready { .. } => "ready",
            ViewportState::Errored { .. } => "errored",
        }
    }
}

/// Handed out by [`Viewport::open`]; the renderer's answer must come back
/// with it so that answers for a replaced document can be told apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    document: DocumentId,
    generation: u64,
}

impl LoadTicket {
    pub fn document(&self) -> &DocumentId {
        &self.document
    }
}

/// Presentational render state of one tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileRender {
    Pending,
    Rendered,
    Failed(String),
}

/// Derived view of one page: nothing here is owned by the tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    pub page: PageNumber,
    pub selected: bool,
    pub render: TileRender,
}

pub struct Viewport {
    state: ViewportState,
    generation: u64,
    selection: SelectionStore,
    tiles: HashMap<PageNumber, TileRender>,
    boundary: NavigationBoundary,
    intercept: Option<Intercept>,
}

impl Viewport {
    pub fn new(boundary: NavigationBoundary) -> Self {
        Viewport {
            state: ViewportState::Unloaded,
            generation: 0,
            selection: SelectionStore::new(),
            tiles: HashMap::new(),
            boundary,
            intercept: None,
        }
    }

    pub fn state(&self) -> &ViewportState {
        &self.state
    }

    pub fn document(&self) -> Option<&DocumentId> {
        self.state.document()
    }

    pub fn page_count(&self) -> Option<u32> {
        match self.state {
            ViewportState::Ready { page_count, .. } => Some(page_count),
            _ => None,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether `generation` still names the active document.
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation && !matches!(self.state, ViewportState::Unloaded)
    }

    pub fn selection(&self) -> &SelectionStore {
        &self.selection
    }

    /// Start loading `document`, discarding everything known about the
    /// previous one.
    pub fn open(&mut self, document: DocumentId) -> LoadTicket {
        self.generation += 1;
        self.selection.clear();
        self.tiles.clear();
        tracing::info!(document = %document, generation = self.generation, "Opening document");
        self.state = ViewportState::Loading {
            document: document.clone(),
        };
        self.sync_guard();
        LoadTicket {
            document,
            generation: self.generation,
        }
    }

    /// Re-enter loading for a document that failed to load.
    pub fn retry(&mut self) -> Option<LoadTicket> {
        match &self.state {
            ViewportState::Errored { document, .. } => {
                let document = document.clone();
                Some(self.open(document))
            }
            _ => None,
        }
    }

    /// Returns false if the ticket is stale and nothing changed.
    pub fn load_succeeded(&mut self, ticket: &LoadTicket, page_count: u32) -> bool {
        if !self.accepts(ticket) {
            tracing::debug!(document = %ticket.document, "Ignoring stale load result");
            return false;
        }

        let dropped = self.selection.retain_within(page_count);
        if !dropped.is_empty() {
            tracing::debug!(?dropped, page_count, "Dropped out-of-range selections");
        }
        self.tiles = (1..=page_count).map(|p| (p, TileRender::Pending)).collect();
        self.state = ViewportState::Ready {
            document: ticket.document.clone(),
            page_count,
        };
        tracing::info!(document = %ticket.document, page_count, "Document ready");
        self.sync_guard();
        true
    }

    /// Returns false if the ticket is stale and nothing changed.
    pub fn load_failed(&mut self, ticket: &LoadTicket, error: LoadError) -> bool {
        if !self.accepts(ticket) {
            tracing::debug!(document = %ticket.document, "Ignoring stale load failure");
            return false;
        }

        tracing::warn!(document = %ticket.document, error = %error, "Document failed to load");
        self.selection.clear();
        self.tiles.clear();
        self.state = ViewportState::Errored {
            document: ticket.document.clone(),
            error,
        };
        self.sync_guard();
        true
    }

    /// Toggle the tile for `page`.
    ///
    /// Pages may be toggled while the page count is still unknown; those that
    /// turn out to be out of range are dropped once it is. Returns `None` if
    /// there is no such tile.
    pub fn toggle(&mut self, page: PageNumber) -> Option<bool> {
        if !self.has_tile(page) {
            return None;
        }
        let selected = self.selection.toggle(page);
        self.sync_guard();
        Some(selected)
    }

    /// Toggle every page that has a tile, notifying subscribers once.
    /// Returns the pages that were left alone because they have none.
    pub fn toggle_all(&mut self, pages: &[PageNumber]) -> Vec<PageNumber> {
        let (valid, rejected): (Vec<PageNumber>, Vec<PageNumber>) =
            pages.iter().copied().partition(|&page| self.has_tile(page));
        self.selection.toggle_all(&valid);
        self.sync_guard();
        tracing::debug!(
            toggled = valid.len(),
            selected = self.selection.len(),
            "Toggled pages"
        );
        rejected
    }

    /// Whether a document is open far enough for pages to be selected.
    pub fn accepts_toggles(&self) -> bool {
        matches!(
            self.state,
            ViewportState::Loading { .. } | ViewportState::Ready { .. }
        )
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
        self.sync_guard();
    }

    /// Record the render outcome of one tile. Stale generations are ignored.
    pub fn record_tile(&mut self, generation: u64, page: PageNumber, render: TileRender) {
        if generation != self.generation {
            return;
        }
        if let Some(tile) = self.tiles.get_mut(&page) {
            *tile = render;
        }
    }

    /// One tile per page, in page order. Empty unless the document is ready.
    pub fn tiles(&self) -> Vec<Tile> {
        let Some(page_count) = self.page_count() else {
            return Vec::new();
        };
        (1..=page_count)
            .map(|page| Tile {
                page,
                selected: self.selection.contains(page),
                render: self
                    .tiles
                    .get(&page)
                    .cloned()
                    .unwrap_or(TileRender::Pending),
            })
            .collect()
    }

    /// Receiver that sees every change to the selection.
    pub fn subscribe(&self) -> watch::Receiver<Vec<PageNumber>> {
        self.selection.subscribe()
    }

    fn has_tile(&self, page: PageNumber) -> bool {
        match self.state {
            _ if page == 0 => false,
            ViewportState::Loading { .. } => true,
            ViewportState::Ready { page_count, .. } => page <= page_count,
            ViewportState::Unloaded | ViewportState::Errored { .. } => false,
        }
    }

    fn accepts(&self, ticket: &LoadTicket) -> bool {
        ticket.generation == self.generation
            && matches!(self.state, ViewportState::Loading { .. })
    }

    fn sync_guard(&mut self) {
        if self.selection.is_empty() {
            self.intercept = None;
        } else if self.intercept.is_none() {
            self.intercept = Some(self.boundary.install());
        }
    }
}

/// Lock a shared viewport. A poisoned lock still holds consistent state
/// because no viewport method can panic halfway through a mutation.
pub fn lock(viewport: &Mutex<Viewport>) -> MutexGuard<'_, Viewport> {
    viewport.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Open `document` and drive it through the renderer's load.
pub async fn load_document<R: PageRenderer>(
    viewport: &Mutex<Viewport>,
    renderer: &R,
    document: DocumentId,
) -> Result<u32, LoadError> {
    let ticket = lock(viewport).open(document);
    let result = renderer.load(ticket.document()).await;
    apply_load(viewport, &ticket, result)
}

/// Feed a renderer's load answer back into the viewport.
pub fn apply_load(
    viewport: &Mutex<Viewport>,
    ticket: &LoadTicket,
    result: Result<u32, LoadError>,
) -> Result<u32, LoadError> {
    let mut viewport = lock(viewport);
    match result {
        Ok(page_count) => {
            viewport.load_succeeded(ticket, page_count);
            Ok(page_count)
        }
        Err(e) => {
            viewport.load_failed(ticket, e.clone());
            Err(e)
        }
    }
}

/// Render one tile of the active document, recording its sub-state.
pub async fn render_tile<R: PageRenderer>(
    viewport: &Mutex<Viewport>,
    renderer: &R,
    page: PageNumber,
) -> Result<RenderedPage, RenderError> {
    let (document, generation) = {
        let viewport = lock(viewport);
        let document = viewport.document().cloned().ok_or(RenderError::NoDocument)?;
        (document, viewport.generation())
    };

    let result = renderer.render_page(&document, page).await;

    let render = match &result {
        Ok(_) => TileRender::Rendered,
        Err(e) => TileRender::Failed(e.to_string()),
    };
    lock(viewport).record_tile(generation, page, render);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport() -> (Viewport, NavigationBoundary) {
        let boundary = NavigationBoundary::new();
        (Viewport::new(boundary.clone()), boundary)
    }

    #[test]
    fn test_lifecycle_to_ready() {
        let (mut vp, _) = viewport();
        assert_eq!(vp.state(), &ViewportState::Unloaded);

        let ticket = vp.open("doc-1".into());
        assert_eq!(vp.state().name(), "loading");
        assert!(vp.tiles().is_empty());

        assert!(vp.load_succeeded(&ticket, 3));
        assert_eq!(vp.page_count(), Some(3));
        let pages: Vec<_> = vp.tiles().iter().map(|t| t.page).collect();
        assert_eq!(pages, vec![1, 2, 3]);
    }

    #[test]
    fn test_load_failure_then_retry() {
        let (mut vp, _) = viewport();
        let ticket = vp.open("doc-1".into());
        vp.toggle(1);
        assert!(vp.load_failed(&ticket, LoadError::Parse("bad xref".into())));
        assert_eq!(vp.state().name(), "errored");
        assert!(vp.selection().is_empty());
        assert_eq!(vp.toggle(1), None);

        let retry = vp.retry().unwrap();
        assert_eq!(retry.document().as_str(), "doc-1");
        assert!(retry.generation > ticket.generation);
        assert!(vp.load_succeeded(&retry, 2));
        assert_eq!(vp.page_count(), Some(2));
    }

    #[test]
    fn test_retry_only_from_errored() {
        let (mut vp, _) = viewport();
        assert!(vp.retry().is_none());
        let ticket = vp.open("doc-1".into());
        vp.load_succeeded(&ticket, 1);
        assert!(vp.retry().is_none());
    }

    #[test]
    fn test_new_document_clears_selection() {
        let (mut vp, boundary) = viewport();
        let ticket = vp.open("doc-1".into());
        vp.load_succeeded(&ticket, 5);
        vp.toggle(2);
        vp.toggle(4);
        assert!(boundary.is_guarded());

        vp.open("doc-2".into());
        assert!(vp.selection().is_empty());
        assert!(!boundary.is_guarded());
    }

    #[test]
    fn test_stale_load_is_ignored() {
        let (mut vp, _) = viewport();
        let old = vp.open("doc-1".into());
        let new = vp.open("doc-2".into());

        assert!(!vp.load_succeeded(&old, 10));
        assert!(!vp.load_failed(&old, LoadError::Empty));
        assert_eq!(vp.state().name(), "loading");

        assert!(vp.load_succeeded(&new, 4));
        assert_eq!(vp.page_count(), Some(4));
        assert!(!vp.load_succeeded(&new, 8));
        assert_eq!(vp.page_count(), Some(4));
    }

    #[test]
    fn test_toggle_before_page_count_known() {
        let (mut vp, _) = viewport();
        let ticket = vp.open("doc-1".into());
        assert_eq!(vp.toggle(2), Some(true));
        assert_eq!(vp.toggle(9), Some(true));

        vp.load_succeeded(&ticket, 5);
        assert_eq!(vp.selection().snapshot(), vec![2]);
    }

    #[test]
    fn test_toggle_all_skips_pages_without_tiles() {
        let (mut vp, boundary) = viewport();
        assert!(!vp.accepts_toggles());
        assert_eq!(vp.toggle_all(&[1, 2]), vec![1, 2]);
        assert!(vp.selection().is_empty());

        let ticket = vp.open("doc-1".into());
        assert!(vp.accepts_toggles());
        vp.load_succeeded(&ticket, 3);
        assert_eq!(vp.toggle_all(&[0, 1, 3, 4]), vec![0, 4]);
        assert_eq!(vp.selection().snapshot(), vec![1, 3]);
        assert!(boundary.is_guarded());

        assert!(vp.toggle_all(&[1, 3]).is_empty());
        assert!(!boundary.is_guarded());
    }

    #[test]
    fn test_toggle_rejects_missing_tiles() {
        let (mut vp, _) = viewport();
        assert_eq!(vp.toggle(1), None);

        let ticket = vp.open("doc-1".into());
        vp.load_succeeded(&ticket, 3);
        assert_eq!(vp.toggle(0), None);
        assert_eq!(vp.toggle(4), None);
        assert_eq!(vp.toggle(3), Some(true));
        assert_eq!(vp.toggle(3), Some(false));
    }

    #[test]
    fn test_tiles_follow_selection() {
        let (mut vp, _) = viewport();
        let ticket = vp.open("doc-1".into());
        vp.load_succeeded(&ticket, 3);
        vp.toggle(2);

        let selected: Vec<_> = vp.tiles().iter().map(|t| t.selected).collect();
        assert_eq!(selected, vec![false, true, false]);

        vp.toggle(2);
        assert!(vp.tiles().iter().all(|t| !t.selected));
    }

    #[test]
    fn test_tile_render_failures_are_isolated() {
        let (mut vp, _) = viewport();
        let ticket = vp.open("doc-1".into());
        vp.load_succeeded(&ticket, 3);

        vp.record_tile(ticket.generation, 1, TileRender::Rendered);
        vp.record_tile(ticket.generation, 2, TileRender::Failed("bad font".into()));
        // stale generation
        vp.record_tile(ticket.generation - 1, 3, TileRender::Rendered);

        let renders: Vec<_> = vp.tiles().into_iter().map(|t| t.render).collect();
        assert_eq!(
            renders,
            vec![
                TileRender::Rendered,
                TileRender::Failed("bad font".into()),
                TileRender::Pending
            ]
        );
        assert_eq!(vp.state().name(), "ready");
    }

    #[test]
    fn test_guard_follows_selection() {
        let (mut vp, boundary) = viewport();
        let ticket = vp.open("doc-1".into());
        vp.load_succeeded(&ticket, 3);
        assert!(!boundary.is_guarded());

        vp.toggle(1);
        vp.toggle(2);
        assert!(boundary.is_guarded());

        vp.toggle(1);
        assert!(boundary.is_guarded());
        vp.toggle(2);
        assert!(!boundary.is_guarded());

        vp.toggle(3);
        vp.clear_selection();
        assert!(!boundary.is_guarded());
    }

    #[test]
    fn test_guard_removed_on_teardown() {
        let (mut vp, boundary) = viewport();
        let ticket = vp.open("doc-1".into());
        vp.load_succeeded(&ticket, 3);
        vp.toggle(1);
        assert!(boundary.is_guarded());

        drop(vp);
        assert!(!boundary.is_guarded());
    }

    #[test]
    fn test_guard_removed_when_load_drops_all_selections() {
        let (mut vp, boundary) = viewport();
        let ticket = vp.open("doc-1".into());
        vp.toggle(7);
        assert!(boundary.is_guarded());

        vp.load_succeeded(&ticket, 2);
        assert!(!boundary.is_guarded());
    }
}
