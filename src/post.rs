//! Post records and the ordering rules of the Post Directory.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Trailing numeric archive id, e.g. `https://spaces.ac.cn/archives/9876`.
static ARCHIVE_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(\d+)/?$").unwrap());

/// One article from the category listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Post {
    pub title: String,
    pub url: String,
    pub date: NaiveDate,
}

impl Post {
    pub fn new(title: impl Into<String>, url: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            date,
        }
    }

    /// Site-assigned numeric id embedded at the end of the URL, 0 if absent.
    pub fn archive_id(&self) -> u64 {
        ARCHIVE_ID_PATTERN
            .captures(&self.url)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    }

    /// Chronological sort key: publish date, then archive id.
    pub fn sort_key(&self) -> (NaiveDate, u64) {
        (self.date, self.archive_id())
    }
}

/// A post tagged with its 1-based, run-wide output position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderJob {
    pub sequence_index: usize,
    pub post: Post,
}

/// Tag every post with its position in the input order (1-based).
pub fn to_jobs(posts: &[Post]) -> Vec<RenderJob> {
    posts
        .iter()
        .enumerate()
        .map(|(i, post)| RenderJob {
            sequence_index: i + 1,
            post: post.clone(),
        })
        .collect()
}
