//! Interactive page picking.
//!
//! Input lines and background completions (upload, load, render, extract)
//! are handled by one event loop, so a slow load or extraction never blocks
//! toggling.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::client::ExtractionClient;
use crate::config::Config;
use crate::error::{LoadError, RenderError, UploadError};
use crate::guard::NavigationBoundary;
use crate::notice::Notice;
use crate::orchestrator::{ExtractOutcome, Orchestrator, OrchestratorState};
use crate::page_range::expand_page_ranges;
use crate::render::{PageRenderer, RemoteRenderer, RenderedPage};
use crate::save::DownloadDir;
use crate::viewport::{
    lock, render_tile, DocumentId, LoadTicket, TileRender, Viewport, ViewportState,
};

const HELP: &str = "\
Commands:
  upload <file>      upload a PDF and open it
  open <id>          open an uploaded document
  retry              retry a document that failed to load
  toggle <pages>     toggle pages, e.g. 'toggle 1-3,7' or 'toggle 5-end'
  clear              clear the selection
  show               show pages and selection
  preview <page>     render one page as text
  extract            extract the selected pages
  help               show this help
  quit               leave";

pub enum Start {
    Empty,
    Open(DocumentId),
    Upload(PathBuf),
}

enum Event {
    Uploaded(Result<DocumentId, UploadError>),
    Loaded {
        ticket: LoadTicket,
        result: Result<u32, LoadError>,
    },
    Rendered(Result<RenderedPage, RenderError>),
    Extracted(ExtractOutcome),
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

struct Session {
    client: ExtractionClient,
    renderer: Arc<RemoteRenderer>,
    viewport: Arc<Mutex<Viewport>>,
    orchestrator: Arc<Orchestrator<ExtractionClient, DownloadDir>>,
    boundary: NavigationBoundary,
    events: mpsc::UnboundedSender<Event>,
    confirm_leave: bool,
}

pub async fn run(config: &Config, start: Start, output_dir: PathBuf) -> Result<()> {
    let client = ExtractionClient::new(config).context("Failed to build HTTP client")?;
    let boundary = NavigationBoundary::new();
    let (events, mut inbox) = mpsc::unbounded_channel();

    println!("Extracted PDFs are saved to {}", output_dir.display());
    let mut session = Session {
        renderer: Arc::new(RemoteRenderer::new(client.clone())),
        viewport: Arc::new(Mutex::new(Viewport::new(boundary.clone()))),
        orchestrator: Arc::new(Orchestrator::new(
            client.clone(),
            DownloadDir::new(output_dir),
        )),
        client,
        boundary,
        events,
        confirm_leave: false,
    };

    println!("{}", HELP);
    match start {
        Start::Empty => {}
        Start::Open(document) => session.open(document),
        Start::Upload(path) => session.upload(path),
    }

    let mut selection = lock(&session.viewport).subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line.context("Failed to read input")? {
                    Some(line) => {
                        if session.handle_line(&line) == Flow::Quit {
                            break;
                        }
                    }
                    None => {
                        if let Some(notice) = session.input_closed() {
                            println!("{}", notice);
                        }
                        break;
                    }
                }
            }
            Some(event) = inbox.recv() => session.handle_event(event),
            Ok(()) = selection.changed() => {
                let snapshot = selection.borrow_and_update().clone();
                print_selection(&snapshot);
            }
        }
    }

    Ok(())
}

impl Session {
    fn handle_line(&mut self, line: &str) -> Flow {
        let line = line.trim();
        let (command, arg) = match line.split_once(char::is_whitespace) {
            Some((command, arg)) => (command, arg.trim()),
            None => (line, ""),
        };

        if !matches!(command, "quit" | "exit") {
            self.confirm_leave = false;
        }

        match command {
            "" => {}
            "help" => println!("{}", HELP),
            "upload" if !arg.is_empty() => self.upload(PathBuf::from(arg)),
            "open" if !arg.is_empty() => self.open(DocumentId::from(arg)),
            "retry" => {
                let ticket = lock(&self.viewport).retry();
                match ticket {
                    Some(ticket) => {
                        println!("Loading {}...", ticket.document());
                        self.spawn_load(ticket);
                    }
                    None => println!("{}", Notice::info("Nothing to retry")),
                }
            }
            "toggle" if !arg.is_empty() => self.toggle(arg),
            "clear" => lock(&self.viewport).clear_selection(),
            "show" => self.show(),
            "preview" => match arg.parse::<u32>() {
                Ok(page) => self.spawn_render(page),
                Err(_) => println!("Usage: preview <page>"),
            },
            "extract" => self.extract(),
            "quit" | "exit" => return self.leave(),
            "upload" | "open" | "toggle" => println!("Usage: {} <argument> (try 'help')", command),
            other => println!("Unknown command: {} (try 'help')", other),
        }

        Flow::Continue
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Uploaded(Ok(document)) => {
                println!("{}", Notice::success(format!("Uploaded as {}", document)));
                self.open(document);
            }
            Event::Uploaded(Err(e)) => println!("{}", Notice::error(e.to_string())),
            Event::Loaded { ticket, result } => {
                let mut viewport = lock(&self.viewport);
                let (applied, notice) = match result {
                    Ok(page_count) => (
                        viewport.load_succeeded(&ticket, page_count),
                        Notice::success(format!(
                            "{} loaded, {} page(s)",
                            ticket.document(),
                            page_count
                        )),
                    ),
                    Err(e) => {
                        let notice = Notice::error(format!(
                            "{} could not be loaded: {}. Type 'retry' to try again",
                            ticket.document(),
                            e
                        ));
                        (viewport.load_failed(&ticket, e), notice)
                    }
                };
                drop(viewport);
                // a newer document replaced this one
                if !applied {
                    return;
                }
                println!("{}", notice);
            }
            Event::Rendered(Ok(rendered)) => {
                println!("--- Page {} ---", rendered.page);
                println!("{}", rendered.text);
            }
            Event::Rendered(Err(e)) => println!("{}", Notice::error(e.to_string())),
            Event::Extracted(outcome) => println!("{}", outcome.notice()),
        }
    }

    fn upload(&self, path: PathBuf) {
        println!("Uploading {}...", path.display());
        let client = self.client.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = client.upload(&path).await;
            let _ = events.send(Event::Uploaded(result));
        });
    }

    fn open(&self, document: DocumentId) {
        let ticket = lock(&self.viewport).open(document);
        println!("Loading {}...", ticket.document());
        self.spawn_load(ticket);
    }

    fn spawn_load(&self, ticket: LoadTicket) {
        let renderer = Arc::clone(&self.renderer);
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = renderer.load(ticket.document()).await;
            let _ = events.send(Event::Loaded { ticket, result });
        });
    }

    fn spawn_render(&self, page: u32) {
        let renderer = Arc::clone(&self.renderer);
        let viewport = Arc::clone(&self.viewport);
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = render_tile(&viewport, renderer.as_ref(), page).await;
            let _ = events.send(Event::Rendered(result));
        });
    }

    fn toggle(&self, arg: &str) {
        let mut viewport = lock(&self.viewport);
        if !viewport.accepts_toggles() {
            println!("{}", Notice::warning("Open a document before selecting pages"));
            return;
        }
        let pages = match expand_page_ranges(arg, viewport.page_count()) {
            Ok(pages) => pages,
            Err(e) => {
                println!("{}", Notice::error(format!("{:#}", e)));
                return;
            }
        };
        let rejected = viewport.toggle_all(&pages);
        drop(viewport);

        if !rejected.is_empty() {
            println!(
                "{}",
                Notice::warning(format!("No such page(s): {}", join(&rejected)))
            );
        }
    }

    fn extract(&self) {
        // the trigger is disabled while an extraction is in flight
        if self.orchestrator.state() == OrchestratorState::Extracting {
            println!("{}", ExtractOutcome::Busy.notice());
            return;
        }

        let orchestrator = Arc::clone(&self.orchestrator);
        let viewport = Arc::clone(&self.viewport);
        let events = self.events.clone();
        tokio::spawn(async move {
            let outcome = orchestrator.extract(&viewport).await;
            let _ = events.send(Event::Extracted(outcome));
        });
    }

    fn leave(&mut self) -> Flow {
        if self.boundary.is_guarded() && !self.confirm_leave {
            self.confirm_leave = true;
            println!(
                "{}",
                Notice::warning(
                    "Selected pages have not been extracted. Type 'quit' again to leave anyway"
                )
            );
            return Flow::Continue;
        }
        Flow::Quit
    }

    /// End of input leaves without confirmation; warn if that drops a
    /// selection that was never extracted.
    fn input_closed(&self) -> Option<Notice> {
        self.boundary.is_guarded().then(|| {
            Notice::warning("Input closed, discarding pages that were not extracted")
        })
    }

    fn show(&self) {
        let viewport = lock(&self.viewport);
        match viewport.state() {
            ViewportState::Unloaded => {
                println!("No document open. Use 'upload <file>' or 'open <id>'.");
            }
            ViewportState::Loading { document } => println!("Loading {}...", document),
            ViewportState::Errored { document, error } => {
                println!("{} could not be loaded: {} (type 'retry')", document, error);
            }
            ViewportState::Ready {
                document,
                page_count,
            } => {
                println!("{} ({} page(s))", document, page_count);
                for tile in viewport.tiles() {
                    let mark = if tile.selected { "[x]" } else { "[ ]" };
                    let render = match &tile.render {
                        TileRender::Pending => String::new(),
                        TileRender::Rendered => " (rendered)".to_string(),
                        TileRender::Failed(e) => format!(" (render failed: {})", e),
                    };
                    println!("  {} page {}{}", mark, tile.page, render);
                }
            }
        }
        print_selection(&viewport.selection().snapshot());
    }
}

fn print_selection(pages: &[u32]) {
    if pages.is_empty() {
        println!("Selected: none");
    } else {
        println!("Selected: {}", join(pages));
    }
}

fn join(pages: &[u32]) -> String {
    pages
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
