//! End-to-end run: directory → render → assemble.
//!
//! [`build_book`] is the library's primary entry point. It owns the only
//! fatal checks between stages: an empty render result and a path/post count
//! disagreement both abort before any assembly is attempted.

use crate::config::BookConfig;
use crate::error::BookError;
use crate::output::BookSummary;
use crate::pipeline::assemble::{assemble_book, AssembleOptions};
use crate::pipeline::{directory, render};
use crate::post::Post;
use std::time::Instant;
use tracing::{info, warn};

/// Crawl the configured category, render every matched post, and write the book.
///
/// # Returns
/// `Ok(BookSummary)` even when some posts failed to render (see
/// `summary.failed`).
///
/// # Errors
/// Returns `Err(BookError)` only for fatal errors:
/// - the listing could not be fetched or parsed
/// - no post rendered successfully
/// - rendered paths and posts disagree in count
/// - the book could not be assembled or written
pub async fn build_book(config: &BookConfig) -> Result<BookSummary, BookError> {
    info!(
        "Collecting posts {} ..= {} from {}",
        config.start, config.end, config.category_url
    );
    let posts = directory::fetch_posts(
        &config.category_url,
        config.start,
        config.end,
        config.http_timeout_secs,
    )
    .await?;
    build_book_from_posts(posts, config).await
}

/// Same as [`build_book`] but starting from an already collected post list.
///
/// `posts` must be in ascending chronological order, as
/// [`directory::collect_posts`] returns them. `limit` and `order` from the
/// config are applied here.
pub async fn build_book_from_posts(
    mut posts: Vec<Post>,
    config: &BookConfig,
) -> Result<BookSummary, BookError> {
    let total_start = Instant::now();

    // limit keeps the earliest posts; ordering is applied after. 0 is unlimited.
    if let Some(limit) = config.limit.filter(|&n| n > 0) {
        posts.truncate(limit);
    }
    config.order.apply(&mut posts);
    let posts_found = posts.len();
    info!("Found {} posts", posts_found);

    // ── Render ───────────────────────────────────────────────────────────
    let chapters_dir = config.chapters_dir();
    let rendered = render::render_posts(&posts, &chapters_dir, &config.render).await?;

    if rendered.is_empty() {
        return Err(BookError::NoPostsRendered {
            attempted: posts_found,
        });
    }
    let (paths, rendered_posts) = rendered.into_parts();
    if paths.len() != rendered_posts.len() {
        return Err(BookError::CountMismatch {
            paths: paths.len(),
            posts: rendered_posts.len(),
        });
    }
    let failed = posts_found - paths.len();
    if failed > 0 {
        warn!("{} of {} posts failed to render and were skipped", failed, posts_found);
    }

    // ── Assemble ─────────────────────────────────────────────────────────
    // lopdf is synchronous and touches every page; keep it off the runtime.
    let output_path = config.book_path();
    let opts = AssembleOptions {
        add_cover: config.cover,
        add_bookmarks: config.bookmarks,
        add_page_numbers: config.page_numbers,
        cover_title: config.cover_title.clone(),
        cover_subtitle: config.cover_subtitle.clone(),
    };
    let rendered_count = paths.len();
    let book_path = output_path.clone();
    let pages = tokio::task::spawn_blocking(move || {
        assemble_book(&paths, &rendered_posts, &book_path, &opts)
    })
    .await
    .map_err(|e| BookError::Internal(format!("assembly task panicked: {e}")))??;

    let summary = BookSummary {
        posts_found,
        rendered: rendered_count,
        failed,
        pages,
        output_path,
        chapters_dir,
        duration_ms: total_start.elapsed().as_millis() as u64,
    };
    info!(
        "Book written: {} ({} chapters, {} pages, {}ms)",
        summary.output_path.display(),
        summary.rendered,
        summary.pages,
        summary.duration_ms
    );
    Ok(summary)
}

/// Synchronous wrapper around [`build_book`].
///
/// Creates a temporary tokio runtime internally.
pub fn build_book_sync(config: &BookConfig) -> Result<BookSummary, BookError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| BookError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(build_book(config))
}
