//! Result types produced by the render pipeline and the orchestrator.

use crate::post::Post;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The chapter PDF produced for one successful render job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedArtifact {
    pub path: PathBuf,
    pub post: Post,
}

/// Index-aligned pipeline output, in original sequence order.
///
/// Failed jobs are absent from both vectors. Construct it only through
/// [`RenderOutput::from_artifacts`] so the two sides never drift apart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderOutput {
    paths: Vec<PathBuf>,
    posts: Vec<Post>,
}

impl RenderOutput {
    /// Split artifacts (already in sequence order) into the aligned pair.
    pub fn from_artifacts(artifacts: Vec<RenderedArtifact>) -> Self {
        let (paths, posts) = artifacts.into_iter().map(|a| (a.path, a.post)).unzip();
        Self { paths, posts }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn into_parts(self) -> (Vec<PathBuf>, Vec<Post>) {
        (self.paths, self.posts)
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSummary {
    /// Posts matched by the directory (after `limit`).
    pub posts_found: usize,
    /// Posts that produced a chapter PDF.
    pub rendered: usize,
    /// Posts dropped after every navigation stage or export failed.
    pub failed: usize,
    /// Total pages in the final book, cover included.
    pub pages: usize,
    pub output_path: PathBuf,
    pub chapters_dir: PathBuf,
    pub duration_ms: u64,
}
