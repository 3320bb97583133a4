//! Progress-callback trait for per-post render events.
//!
//! Inject an [`Arc<dyn RenderProgressCallback>`] via
//! [`crate::config::RenderSettings::progress_callback`] to receive events as
//! workers process each post. The CLI forwards them to an `indicatif` bar.
//!
//! # Thread safety
//!
//! With `workers > 1` the callbacks fire concurrently from several worker
//! tasks and in no particular order across workers. Implementations must
//! protect shared mutable state (e.g. `Mutex`, `AtomicUsize`).

use crate::post::Post;
use std::path::Path;
use std::sync::Arc;

/// Called by the render pipeline as it processes each post.
///
/// All methods default to no-ops so callers only override what they need.
/// `index` is the post's 1-based sequence index.
pub trait RenderProgressCallback: Send + Sync {
    /// Called once before any worker starts.
    fn on_render_start(&self, total: usize) {
        let _ = total;
    }

    /// Called when a worker opens a tab for a post.
    fn on_post_start(&self, index: usize, total: usize, post: &Post) {
        let _ = (index, total, post);
    }

    /// Called when a post's PDF is on disk.
    fn on_post_complete(&self, index: usize, total: usize, path: &Path) {
        let _ = (index, total, path);
    }

    /// Called when a post is dropped.
    fn on_post_error(&self, index: usize, total: usize, post: &Post, error: &str) {
        let _ = (index, total, post, error);
    }

    /// Called once after every worker has been harvested.
    fn on_render_complete(&self, total: usize, success_count: usize) {
        let _ = (total, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl RenderProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::RenderSettings`].
pub type ProgressCallback = Arc<dyn RenderProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        failed_urls: Mutex<Vec<String>>,
        success_total: AtomicUsize,
    }

    impl RenderProgressCallback for TrackingCallback {
        fn on_post_start(&self, _index: usize, _total: usize, _post: &Post) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_post_complete(&self, _index: usize, _total: usize, _path: &Path) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_post_error(&self, _index: usize, _total: usize, post: &Post, _error: &str) {
            self.failed_urls.lock().unwrap().push(post.url.clone());
        }

        fn on_render_complete(&self, _total: usize, success_count: usize) {
            self.success_total.store(success_count, Ordering::SeqCst);
        }
    }

    fn post() -> Post {
        Post::new(
            "t",
            "https://spaces.ac.cn/archives/1",
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        )
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_render_start(2);
        cb.on_post_start(1, 2, &post());
        cb.on_post_complete(1, 2, Path::new("001-t.pdf"));
        cb.on_post_error(2, 2, &post(), "boom");
        cb.on_render_complete(2, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_post_start(1, 2, &post());
        tracker.on_post_complete(1, 2, Path::new("001-t.pdf"));
        tracker.on_post_start(2, 2, &post());
        tracker.on_post_error(2, 2, &post(), "timeout");
        tracker.on_render_complete(2, 1);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(
            *tracker.failed_urls.lock().unwrap(),
            vec!["https://spaces.ac.cn/archives/1".to_string()]
        );
        assert_eq!(tracker.success_total.load(Ordering::SeqCst), 1);
    }
}
