use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pagepick")]
#[command(about = "Pick pages out of an uploaded PDF and download them as a new document")]
#[command(version)]
pub struct Cli {
    /// Backend base URL (overrides PAGEPICK_BACKEND_URL)
    #[arg(long, global = true)]
    pub backend_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run as MCP server
    Mcp {
        /// Directory extracted documents are saved to
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Upload a PDF and print its document id
    Upload {
        /// PDF file to upload
        path: PathBuf,
    },

    /// Load an uploaded document and show its page count
    Info {
        /// Document id returned by upload
        document: String,
    },

    /// Render pages of an uploaded document as text
    Preview {
        /// Document id returned by upload
        document: String,

        /// Page ranges (e.g., "1-5,10")
        pages: String,
    },

    /// Extract pages of an uploaded document into a new PDF
    Extract {
        /// Document id returned by upload
        document: String,

        /// Page ranges (e.g., "1-5,10,15-end")
        pages: String,

        /// Directory to save the extracted PDF in
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Interactively select pages and extract them
    Session {
        /// Open this document id on start
        #[arg(long, conflicts_with = "upload")]
        open: Option<String>,

        /// Upload this PDF on start
        #[arg(long)]
        upload: Option<PathBuf>,

        /// Directory to save extracted PDFs in
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },
}
