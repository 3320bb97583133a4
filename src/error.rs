//! Error types for the spaces-book library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`BookError`] — **Fatal**: the run cannot produce a book at all
//!   (listing unreachable, browser will not start, nothing rendered, bad
//!   PDF on disk). Returned as `Err(BookError)` from [`crate::build_book`].
//!
//! * [`RenderError`] — **Non-fatal**: a single post failed to render
//!   (navigation exhausted every stage, export glitch) but its siblings are
//!   fine. The job is logged and dropped; it never surfaces as a run error
//!   unless *every* job fails.

use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the spaces-book library.
#[derive(Debug, Error)]
pub enum BookError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The date window is inverted.
    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    // ── Directory errors ──────────────────────────────────────────────────
    /// A category listing page could not be downloaded.
    #[error("Failed to fetch listing page '{url}': {reason}\nCheck your internet connection.")]
    ListingFetchFailed { url: String, reason: String },

    /// A category listing page answered with a non-success status.
    #[error("Listing page '{url}' returned HTTP {status}")]
    ListingHttpStatus { url: String, status: u16 },

    /// The listing HTML could not be processed.
    #[error("Failed to parse listing page '{url}': {detail}")]
    ListingParseFailed { url: String, detail: String },

    // ── Render errors ─────────────────────────────────────────────────────
    /// No browser instance could be started for any worker.
    #[error(
        "Failed to launch headless Chrome: {0}\n\n\
Install Chrome/Chromium or point --chrome at an executable.\n"
    )]
    BrowserLaunchFailed(String),

    /// Every render job failed; there is nothing to assemble.
    #[error("No post rendered successfully ({attempted} attempted)")]
    NoPostsRendered { attempted: usize },

    /// Artifact and post sequences disagree in length.
    #[error("Render result mismatch: {paths} PDF files but {posts} posts")]
    CountMismatch { paths: usize, posts: usize },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// A chapter PDF could not be opened or parsed.
    #[error("Failed to load chapter PDF '{path}': {detail}")]
    PdfLoadFailed { path: PathBuf, detail: String },

    /// The merged document could not be built.
    #[error("PDF assembly failed: {0}")]
    PdfAssemblyFailed(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create an output directory.
    #[error("Failed to create directory '{path}': {source}")]
    OutputDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not write the final book.
    #[error("Failed to write book '{path}': {source}")]
    PdfWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<lopdf::Error> for BookError {
    fn from(e: lopdf::Error) -> Self {
        BookError::PdfAssemblyFailed(e.to_string())
    }
}

/// A non-fatal error for a single render job.
///
/// The pipeline logs it with the post URL and drops the job; no artifact is
/// emitted for it.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum RenderError {
    /// A navigation stage raised (network error, bad response, target crash).
    #[error("navigation ({stage}) failed: {detail}")]
    Navigation { stage: String, detail: String },

    /// A navigation stage did not reach its wait condition in time.
    #[error("navigation ({stage}) timed out after {secs}s")]
    Timeout { stage: String, secs: u64 },

    /// A browser/tab operation failed outside navigation.
    #[error("browser error: {0}")]
    Browser(String),

    /// The print stylesheet could not be injected.
    #[error("style injection failed: {0}")]
    StyleInjection(String),

    /// `Page.printToPDF` failed.
    #[error("PDF export failed: {0}")]
    PdfExport(String),

    /// The exported bytes could not be written to disk.
    #[error("failed to write '{path}': {detail}")]
    WriteFailed { path: PathBuf, detail: String },
}
