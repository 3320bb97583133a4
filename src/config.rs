//! Configuration types for a book run.
//!
//! All run behaviour is controlled through [`BookConfig`], built via its
//! [`BookConfigBuilder`]. The render-specific knobs live in a nested
//! [`RenderSettings`] so the pipeline can be driven on its own (tests, or a
//! caller that already has a post list) without a date window or book name.

use crate::error::BookError;
use crate::pipeline::browser::BrowserLauncher;
use crate::progress::ProgressCallback;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Listing crawled when no `category_url` is configured.
pub const DEFAULT_CATEGORY_URL: &str = "https://spaces.ac.cn/category/Big-Data";

/// Default cover title (and the book's `/Title` metadata).
pub const DEFAULT_COVER_TITLE: &str = "苏剑林选集";

/// Default cover subtitle.
pub const DEFAULT_COVER_SUBTITLE: &str = "Scientific Spaces Big-Data";

/// Settings for the render pipeline.
#[derive(Clone)]
pub struct RenderSettings {
    /// Idle wait after navigation so MathJax can finish typesetting. Default: 10 000 ms.
    pub delay_ms: u64,

    /// Idle wait after the print stylesheet is injected. Default: 200 ms.
    pub style_settle_ms: u64,

    /// Number of isolated browser workers. Default: 1.
    ///
    /// Clamped to the job count at run time. Each worker launches its own
    /// Chrome process and renders a contiguous chronological slice of posts.
    pub workers: usize,

    /// Chrome/Chromium executable. If None, chromiumoxide auto-detects.
    pub chrome_executable: Option<PathBuf>,

    /// Run Chrome with a visible window (debugging only). Default: false.
    pub headful: bool,

    /// Pre-constructed browser launcher. Takes precedence over the Chrome options.
    pub launcher: Option<Arc<dyn BrowserLauncher>>,

    /// Per-post progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            delay_ms: 10_000,
            style_settle_ms: 200,
            workers: 1,
            chrome_executable: None,
            headful: false,
            launcher: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for RenderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderSettings")
            .field("delay_ms", &self.delay_ms)
            .field("style_settle_ms", &self.style_settle_ms)
            .field("workers", &self.workers)
            .field("chrome_executable", &self.chrome_executable)
            .field("headful", &self.headful)
            .field("launcher", &self.launcher.as_ref().map(|_| "<dyn BrowserLauncher>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn RenderProgressCallback>"),
            )
            .finish()
    }
}

/// Configuration for a full crawl → render → assemble run.
///
/// # Example
/// ```rust
/// use chrono::NaiveDate;
/// use spaces_book::BookConfig;
///
/// let config = BookConfig::builder(
///     NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
///     NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
/// )
/// .workers(4)
/// .cover(true)
/// .build()
/// .unwrap();
/// assert_eq!(config.render.workers, 4);
/// ```
#[derive(Debug, Clone)]
pub struct BookConfig {
    /// First publish date included (inclusive).
    pub start: NaiveDate,
    /// Last publish date included (inclusive).
    pub end: NaiveDate,
    /// Root output directory; chapters go to `{out_dir}/chapters`. Default: `output`.
    pub out_dir: PathBuf,
    /// Book file name prefix. Default: `BigData`.
    pub name: String,
    /// Debug: keep only the first N posts (chronologically). `Some(0)` means
    /// no limit.
    pub limit: Option<usize>,
    /// Final post order. Default: ascending.
    pub order: SortOrder,
    /// Prepend a cover page. Default: false.
    pub cover: bool,
    pub cover_title: String,
    pub cover_subtitle: String,
    /// Add one outline entry per chapter. Default: true.
    pub bookmarks: bool,
    /// Stamp a page number on every page. Default: true.
    pub page_numbers: bool,
    /// Category listing to crawl.
    pub category_url: String,
    /// Per-request timeout for listing pages in seconds. Default: 20.
    pub http_timeout_secs: u64,
    pub render: RenderSettings,
}

impl BookConfig {
    /// Create a new builder for a date window.
    pub fn builder(start: NaiveDate, end: NaiveDate) -> BookConfigBuilder {
        BookConfigBuilder {
            config: BookConfig {
                start,
                end,
                out_dir: PathBuf::from("output"),
                name: "BigData".to_string(),
                limit: None,
                order: SortOrder::default(),
                cover: false,
                cover_title: DEFAULT_COVER_TITLE.to_string(),
                cover_subtitle: DEFAULT_COVER_SUBTITLE.to_string(),
                bookmarks: true,
                page_numbers: true,
                category_url: DEFAULT_CATEGORY_URL.to_string(),
                http_timeout_secs: 20,
                render: RenderSettings::default(),
            },
        }
    }

    /// `{out_dir}/chapters`
    pub fn chapters_dir(&self) -> PathBuf {
        self.out_dir.join("chapters")
    }

    /// `{out_dir}/{name}-{start}-{end}.pdf`
    pub fn book_path(&self) -> PathBuf {
        self.out_dir.join(format!(
            "{}-{}-{}.pdf",
            self.name,
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        ))
    }
}

/// Builder for [`BookConfig`].
#[derive(Debug)]
pub struct BookConfigBuilder {
    config: BookConfig,
}

impl BookConfigBuilder {
    pub fn out_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.out_dir = dir.into();
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// `Some(0)` is treated as no limit.
    pub fn limit(mut self, n: Option<usize>) -> Self {
        self.config.limit = n.filter(|&n| n > 0);
        self
    }

    pub fn order(mut self, order: SortOrder) -> Self {
        self.config.order = order;
        self
    }

    pub fn cover(mut self, v: bool) -> Self {
        self.config.cover = v;
        self
    }

    pub fn cover_title(mut self, title: impl Into<String>) -> Self {
        self.config.cover_title = title.into();
        self
    }

    pub fn cover_subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.config.cover_subtitle = subtitle.into();
        self
    }

    pub fn bookmarks(mut self, v: bool) -> Self {
        self.config.bookmarks = v;
        self
    }

    pub fn page_numbers(mut self, v: bool) -> Self {
        self.config.page_numbers = v;
        self
    }

    pub fn category_url(mut self, url: impl Into<String>) -> Self {
        self.config.category_url = url.into();
        self
    }

    pub fn http_timeout_secs(mut self, secs: u64) -> Self {
        self.config.http_timeout_secs = secs.max(1);
        self
    }

    pub fn delay_ms(mut self, ms: u64) -> Self {
        self.config.render.delay_ms = ms;
        self
    }

    pub fn style_settle_ms(mut self, ms: u64) -> Self {
        self.config.render.style_settle_ms = ms;
        self
    }

    pub fn workers(mut self, n: usize) -> Self {
        self.config.render.workers = n;
        self
    }

    pub fn chrome_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.render.chrome_executable = Some(path.into());
        self
    }

    pub fn headful(mut self, v: bool) -> Self {
        self.config.render.headful = v;
        self
    }

    pub fn launcher(mut self, launcher: Arc<dyn BrowserLauncher>) -> Self {
        self.config.render.launcher = Some(launcher);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.render.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<BookConfig, BookError> {
        let c = &self.config;
        if c.start > c.end {
            return Err(BookError::InvalidDateRange {
                start: c.start,
                end: c.end,
            });
        }
        if c.render.workers == 0 {
            return Err(BookError::InvalidConfig("Workers must be ≥ 1".into()));
        }
        if c.name.trim().is_empty() {
            return Err(BookError::InvalidConfig("Book name must not be empty".into()));
        }
        if !(c.category_url.starts_with("http://") || c.category_url.starts_with("https://")) {
            return Err(BookError::InvalidConfig(format!(
                "Category URL must be HTTP/HTTPS, got '{}'",
                c.category_url
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Order of posts in the finished book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortOrder {
    /// Oldest first. (default)
    #[default]
    Asc,
    /// Newest first.
    Desc,
}

impl SortOrder {
    /// Reorder an ascending list in place.
    pub fn apply<T>(&self, items: &mut [T]) {
        if *self == SortOrder::Desc {
            items.reverse();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn defaults() {
        let c = BookConfig::builder(d(2024, 1, 1), d(2024, 2, 1)).build().unwrap();
        assert_eq!(c.render.workers, 1);
        assert_eq!(c.render.delay_ms, 10_000);
        assert_eq!(c.render.style_settle_ms, 200);
        assert!(c.bookmarks);
        assert!(c.page_numbers);
        assert!(!c.cover);
        assert_eq!(c.order, SortOrder::Asc);
    }

    #[test]
    fn paths_follow_layout() {
        let c = BookConfig::builder(d(2024, 1, 1), d(2024, 2, 1))
            .out_dir("out")
            .name("Book")
            .build()
            .unwrap();
        assert_eq!(c.chapters_dir(), PathBuf::from("out/chapters"));
        assert_eq!(c.book_path(), PathBuf::from("out/Book-2024-01-01-2024-02-01.pdf"));
    }

    #[test]
    fn inverted_range_rejected() {
        let err = BookConfig::builder(d(2024, 2, 1), d(2024, 1, 1)).build().unwrap_err();
        assert!(matches!(err, BookError::InvalidDateRange { .. }));
    }

    #[test]
    fn zero_workers_rejected() {
        let err = BookConfig::builder(d(2024, 1, 1), d(2024, 1, 1))
            .workers(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, BookError::InvalidConfig(_)));
    }

    #[test]
    fn non_http_category_rejected() {
        let err = BookConfig::builder(d(2024, 1, 1), d(2024, 1, 1))
            .category_url("ftp://example.com")
            .build()
            .unwrap_err();
        assert!(matches!(err, BookError::InvalidConfig(_)));
    }

    #[test]
    fn zero_limit_means_unlimited() {
        let c = BookConfig::builder(d(2024, 1, 1), d(2024, 1, 1))
            .limit(Some(0))
            .build()
            .unwrap();
        assert_eq!(c.limit, None);
        let c = BookConfig::builder(d(2024, 1, 1), d(2024, 1, 1))
            .limit(Some(2))
            .build()
            .unwrap();
        assert_eq!(c.limit, Some(2));
    }

    #[test]
    fn desc_reverses() {
        let mut v = vec![1, 2, 3];
        SortOrder::Desc.apply(&mut v);
        assert_eq!(v, vec![3, 2, 1]);
        SortOrder::Asc.apply(&mut v);
        assert_eq!(v, vec![3, 2, 1]);
    }
}
