//! Pipeline stages for turning a date window of posts into a book.
//!
//! Each submodule owns one step, so the render core can be driven and
//! tested with a fake browser and without network access.
//!
//! ## Data Flow
//!
//! ```text
//! directory ──▶ partition ──▶ render ──▶ assemble
//! (listing)     (chunks)      (Chrome)   (lopdf)
//! ```
//!
//! 1. [`directory`] — walk the paginated category listing and collect the
//!    posts inside the date window, in chronological order
//! 2. [`partition`] — tag jobs with their sequence index, split them into
//!    contiguous per-worker chunks, name the chapter files
//! 3. [`render`]    — one private browser per worker, escalating navigation
//!    retries, per-post failure isolation, filename-sorted reassembly
//! 4. [`assemble`]  — concatenate chapters, cover, outline, page numbers
//!
//! [`browser`] is the seam between [`render`] and the actual browser;
//! [`style`] holds the print geometry and the injected stylesheet.

pub mod assemble;
pub mod browser;
pub mod directory;
pub mod partition;
pub mod render;
pub mod style;
