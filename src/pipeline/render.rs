//! Render pipeline: turn every post into a chapter PDF.
//!
//! ## Workers
//!
//! With `workers == 1` the jobs run in order inside one browser. With more,
//! the index-tagged job list is split into contiguous chunks
//! ([`partition_jobs`]) and each chunk is handed to a Tokio task that owns a
//! private Chrome process. Workers finish in any order; their results are
//! merged and re-sorted by chapter filename, whose zero-padded sequence
//! prefix encodes the original position. Completion order is never trusted.
//!
//! ## Failure tolerance
//!
//! * A post that fails any step is logged with its URL, its tab is closed,
//!   and it is dropped. Siblings continue.
//! * A worker whose browser will not start, or whose task panics, contributes
//!   zero artifacts; the other batches are still harvested.
//! * With a single worker, a browser launch failure is fatal: there is no
//!   other batch that could produce anything.
//!
//! ## Navigation
//!
//! Page loads are flaky (slow CDNs, MathJax fonts). Within one render attempt
//! navigation walks [`NAVIGATION_STAGES`], each looser and longer than the
//! last, and gives up only when all three fail. The last stage's error is
//! the one reported.

use crate::config::RenderSettings;
use crate::error::{BookError, RenderError};
use crate::output::{RenderOutput, RenderedArtifact};
use crate::pipeline::browser::{
    BrowserLauncher, BrowserSession, BrowserTab, ChromiumLauncher, WaitUntil,
};
use crate::pipeline::partition::{chapter_path, effective_workers, index_width, partition_jobs};
use crate::pipeline::style::{PdfOptions, ViewportSize, PRINT_CSS};
use crate::post::{to_jobs, Post, RenderJob};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// What a navigation stage does to the tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageAction {
    /// Navigate to the post URL.
    Navigate,
    /// Reload whatever the tab currently holds.
    Reload,
}

/// One step of the escalating navigation retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigationStage {
    pub description: &'static str,
    pub action: StageAction,
    pub wait: WaitUntil,
    pub timeout: Duration,
}

/// Full load, then a DOM-ready reload, then a fresh DOM-ready navigation.
pub const NAVIGATION_STAGES: [NavigationStage; 3] = [
    NavigationStage {
        description: "navigate (load)",
        action: StageAction::Navigate,
        wait: WaitUntil::Load,
        timeout: Duration::from_secs(75),
    },
    NavigationStage {
        description: "reload (domcontentloaded)",
        action: StageAction::Reload,
        wait: WaitUntil::DomContentLoaded,
        timeout: Duration::from_secs(90),
    },
    NavigationStage {
        description: "fresh navigation (domcontentloaded)",
        action: StageAction::Navigate,
        wait: WaitUntil::DomContentLoaded,
        timeout: Duration::from_secs(120),
    },
];

/// Run `stages` in order until one reaches its wait condition in time.
pub async fn navigate_with_fallback(
    tab: &mut dyn BrowserTab,
    url: &str,
    stages: &[NavigationStage],
) -> Result<(), RenderError> {
    let mut last_err = None;

    for (i, stage) in stages.iter().enumerate() {
        let attempt = match stage.action {
            StageAction::Navigate => tab.navigate(url, stage.wait),
            StageAction::Reload => tab.reload(stage.wait),
        };

        let err = match timeout(stage.timeout, attempt).await {
            Ok(Ok(())) => {
                if i > 0 {
                    debug!("{}: recovered on stage {} ({})", url, i + 1, stage.description);
                }
                return Ok(());
            }
            Ok(Err(e)) => RenderError::Navigation {
                stage: stage.description.to_string(),
                detail: e.to_string(),
            },
            Err(_) => RenderError::Timeout {
                stage: stage.description.to_string(),
                secs: stage.timeout.as_secs(),
            },
        };
        debug!("{}: stage {} failed: {}", url, i + 1, err);
        last_err = Some(err);
    }

    Err(last_err.unwrap_or_else(|| RenderError::Navigation {
        stage: "none".to_string(),
        detail: "no navigation stages configured".to_string(),
    }))
}

/// Shared, read-only state for every worker of one run.
struct WorkerContext {
    output_dir: PathBuf,
    total: usize,
    index_width: usize,
    settings: RenderSettings,
    pdf_options: PdfOptions,
}

/// Steps after the tab is open: navigate, typeset, style, export, write.
async fn render_in_tab(
    tab: &mut dyn BrowserTab,
    job: &RenderJob,
    target: &Path,
    ctx: &WorkerContext,
) -> Result<(), RenderError> {
    navigate_with_fallback(tab, &job.post.url, &NAVIGATION_STAGES).await?;
    tab.emulate_screen_media().await?;
    sleep(Duration::from_millis(ctx.settings.delay_ms)).await;
    tab.inject_style(PRINT_CSS).await?;
    sleep(Duration::from_millis(ctx.settings.style_settle_ms)).await;

    let bytes = tab.print_pdf(&ctx.pdf_options).await?;
    tokio::fs::write(target, &bytes)
        .await
        .map_err(|e| RenderError::WriteFailed {
            path: target.to_path_buf(),
            detail: e.to_string(),
        })?;
    debug!("Wrote {} ({} bytes)", target.display(), bytes.len());
    Ok(())
}

/// Render one job in its own tab. The tab is closed on every path.
async fn render_job(
    session: &mut dyn BrowserSession,
    job: &RenderJob,
    target: &Path,
    ctx: &WorkerContext,
) -> Result<(), RenderError> {
    let mut tab = session.new_tab().await?;
    let result = render_in_tab(tab.as_mut(), job, target, ctx).await;
    if let Err(e) = tab.close().await {
        debug!("Closing tab for {} failed: {}", job.post.url, e);
    }
    result
}

/// Render a contiguous batch inside one private browser.
async fn run_worker(
    worker_id: usize,
    launcher: Arc<dyn BrowserLauncher>,
    jobs: Vec<RenderJob>,
    ctx: Arc<WorkerContext>,
) -> Result<Vec<RenderedArtifact>, BookError> {
    let mut session = launcher.launch(ViewportSize::default()).await?;
    let cb = ctx.settings.progress_callback.clone();
    let mut artifacts = Vec::with_capacity(jobs.len());

    for job in jobs {
        let index = job.sequence_index;
        info!("[render] {}/{} {}", index, ctx.total, job.post.url);
        if let Some(ref cb) = cb {
            cb.on_post_start(index, ctx.total, &job.post);
        }

        let target = chapter_path(&ctx.output_dir, &job, ctx.index_width);
        match render_job(session.as_mut(), &job, &target, &ctx).await {
            Ok(()) => {
                if let Some(ref cb) = cb {
                    cb.on_post_complete(index, ctx.total, &target);
                }
                artifacts.push(RenderedArtifact {
                    path: target,
                    post: job.post,
                });
            }
            Err(e) => {
                warn!("Render failed, skipping: {} ({})", job.post.url, e);
                if let Some(ref cb) = cb {
                    cb.on_post_error(index, ctx.total, &job.post, &e.to_string());
                }
            }
        }
    }

    session.shutdown().await;
    debug!("Worker {} finished: {} artifacts", worker_id, artifacts.len());
    Ok(artifacts)
}

/// Spawn one task per chunk and harvest whatever each batch produced.
async fn run_parallel(
    launcher: Arc<dyn BrowserLauncher>,
    chunks: Vec<Vec<RenderJob>>,
    ctx: Arc<WorkerContext>,
) -> Vec<RenderedArtifact> {
    let mut set = JoinSet::new();
    for (worker_id, chunk) in chunks.into_iter().enumerate() {
        let (first, last) = match (chunk.first(), chunk.last()) {
            (Some(f), Some(l)) => (f.sequence_index, l.sequence_index),
            _ => continue,
        };
        info!("Worker {}: posts {}..={}", worker_id, first, last);
        let launcher = Arc::clone(&launcher);
        let ctx = Arc::clone(&ctx);
        set.spawn(async move {
            let result = run_worker(worker_id, launcher, chunk, ctx).await;
            (worker_id, result)
        });
    }

    let mut harvested = Vec::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((worker_id, Ok(batch))) => {
                debug!("Harvested worker {}: {} artifacts", worker_id, batch.len());
                harvested.extend(batch);
            }
            Ok((worker_id, Err(e))) => {
                warn!("Worker {} failed, its batch contributes no chapters: {}", worker_id, e);
            }
            Err(e) => {
                warn!("Worker task aborted, its batch contributes no chapters: {}", e);
            }
        }
    }
    harvested
}

/// Restore sequence order from the zero-padded filename prefix.
pub fn sort_by_filename(artifacts: &mut [RenderedArtifact]) {
    artifacts.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
}

/// Render `posts` (already in book order) into `output_dir`.
///
/// # Returns
/// Index-aligned chapter paths and posts for the jobs that succeeded, in the
/// input order. Failed posts are absent from both.
///
/// # Errors
/// Only fatal conditions: the output directory cannot be created, or the
/// single browser of a one-worker run cannot be launched.
pub async fn render_posts(
    posts: &[Post],
    output_dir: &Path,
    settings: &RenderSettings,
) -> Result<RenderOutput, BookError> {
    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|e| BookError::OutputDirFailed {
            path: output_dir.to_path_buf(),
            source: e,
        })?;

    let jobs = to_jobs(posts);
    let total = jobs.len();
    if total == 0 {
        return Ok(RenderOutput::default());
    }

    let launcher: Arc<dyn BrowserLauncher> = match settings.launcher {
        Some(ref l) => Arc::clone(l),
        None => Arc::new(ChromiumLauncher::from_settings(settings)),
    };
    let ctx = Arc::new(WorkerContext {
        output_dir: output_dir.to_path_buf(),
        total,
        index_width: index_width(total),
        settings: settings.clone(),
        pdf_options: PdfOptions::default(),
    });

    if let Some(ref cb) = settings.progress_callback {
        cb.on_render_start(total);
    }

    let start = Instant::now();
    let workers = effective_workers(settings.workers, total);
    let mut artifacts = if workers == 1 {
        info!("Rendering {} posts sequentially", total);
        run_worker(0, launcher, jobs, Arc::clone(&ctx)).await?
    } else {
        info!("Rendering {} posts across {} workers", total, workers);
        run_parallel(launcher, partition_jobs(jobs, workers), Arc::clone(&ctx)).await
    };
    sort_by_filename(&mut artifacts);

    info!(
        "Rendered {}/{} posts in {}ms",
        artifacts.len(),
        total,
        start.elapsed().as_millis()
    );
    if let Some(ref cb) = settings.progress_callback {
        cb.on_render_complete(total, artifacts.len());
    }

    Ok(RenderOutput::from_artifacts(artifacts))
}
