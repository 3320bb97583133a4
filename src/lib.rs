//! # spaces-book
//!
//! Assemble a date-bounded range of blog posts into a single PDF book.
//!
//! ## Why this crate?
//!
//! The site's articles are MathJax-heavy. Printing them one by one from a
//! browser gives clipped equation numbers, site chrome on every page, and no
//! way to navigate the result. This crate drives headless Chrome with a
//! print stylesheet and a viewport sized to the printable width, then stitches
//! the chapters into one document with a bookmark per article.
//!
//! ## Pipeline Overview
//!
//! ```text
//! category listing
//!  │
//!  ├─ 1. Directory  crawl paginated listing, filter by date, sort
//!  ├─ 2. Partition  index-tag jobs, split into contiguous chunks
//!  ├─ 3. Render     N isolated Chrome workers, 3-stage navigation retry
//!  ├─ 4. Reorder    sort chapter files by zero-padded index prefix
//!  └─ 5. Assemble   cover + chapters + bookmarks + page numbers (lopdf)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chrono::NaiveDate;
//! use spaces_book::{build_book, BookConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BookConfig::builder(
//!         NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
//!         NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
//!     )
//!     .workers(4)
//!     .cover(true)
//!     .build()?;
//!
//!     let summary = build_book(&config).await?;
//!     eprintln!("{} chapters, {} pages -> {}",
//!         summary.rendered, summary.pages, summary.output_path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `spaces-book` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! spaces-book = { version = "0.1", default-features = false }
//! ```
//!
//! ## Requirements
//!
//! A local Chrome or Chromium. It is located automatically; override with
//! [`BookConfigBuilder::chrome_executable`] or `--chrome`.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod book;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod post;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use book::{build_book, build_book_from_posts, build_book_sync};
pub use config::{BookConfig, BookConfigBuilder, RenderSettings, SortOrder};
pub use error::{BookError, RenderError};
pub use output::{BookSummary, RenderOutput, RenderedArtifact};
pub use pipeline::assemble::{assemble_book, AssembleOptions};
pub use pipeline::directory::fetch_posts;
pub use pipeline::render::render_posts;
pub use post::{Post, RenderJob};
pub use progress::{NoopProgressCallback, ProgressCallback, RenderProgressCallback};
