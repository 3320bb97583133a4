//! CLI binary for spaces-book.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `BookConfig` and prints the run summary.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use spaces_book::{
    build_book, BookConfig, BookSummary, Post, ProgressCallback, RenderProgressCallback, SortOrder,
};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one live bar plus a log line per post.
/// Posts finish out of order when several workers run.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Per-post wall-clock start times, keyed by sequence index.
    start_times: Mutex<HashMap<usize, Instant>>,
}

impl CliProgressCallback {
    /// Spinner until `on_render_start` tells us the total.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Crawling category listing…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} posts  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Rendering");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&index))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl RenderProgressCallback for CliProgressCallback {
    fn on_render_start(&self, total: usize) {
        self.activate_bar(total);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Rendering {total} posts…"))
        ));
    }

    fn on_post_start(&self, index: usize, _total: usize, post: &Post) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(index, Instant::now());
        }
        self.bar.set_message(post.title.clone());
    }

    fn on_post_complete(&self, index: usize, total: usize, path: &Path) {
        let secs = self.elapsed_secs(index);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            green("✓"),
            index,
            total,
            name,
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_post_error(&self, index: usize, total: usize, post: &Post, error: &str) {
        let secs = self.elapsed_secs(index);

        // Keep long CDP errors on one line.
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}  {}",
            red("✗"),
            index,
            total,
            post.url,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_render_complete(&self, total: usize, success_count: usize) {
        let failed = total.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} posts rendered",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} posts rendered  ({} skipped)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # First half of 2024, ascending, into ./output
  spaces-book --start 2024-01-01 --end 2024-06-30

  # Newest first, with a cover, four browsers in parallel
  spaces-book --start 2023-01-01 --end 2023-12-31 --order desc --cover --workers 4

  # Quick layout check on the first three posts, short typesetting delay
  spaces-book --start 2024-01-01 --end 2024-12-31 --limit 3 --delay-ms 2000

  # Machine-readable summary
  spaces-book --start 2024-01-01 --end 2024-01-31 --json > summary.json

OUTPUT LAYOUT:
  {out-dir}/chapters/{index}-{title}.pdf    one PDF per rendered post
  {out-dir}/{name}-{start}-{end}.pdf        the assembled book

ENVIRONMENT VARIABLES:
  SPACES_BOOK_CHROME      Chrome/Chromium executable
  SPACES_BOOK_WORKERS     Parallel browser instances
  SPACES_BOOK_DELAY_MS    MathJax typesetting wait per post
  RUST_LOG                Override log filter (e.g. spaces_book=debug)

NOTES:
  Every worker runs its own Chrome process; memory grows with --workers.
  A post that fails to load after three navigation attempts is skipped.
"#;

/// Assemble Scientific Spaces posts into one bookmarked PDF.
#[derive(Parser, Debug)]
#[command(
    name = "spaces-book",
    version,
    about = "Assemble a date range of blog posts into one bookmarked PDF",
    long_about = "Crawl a category listing, render every post in the date range to PDF with \
headless Chrome (MathJax included), and merge the chapters into a single book with optional \
cover, per-article bookmarks, and page numbers.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// First publish date to include (YYYY-MM-DD).
    #[arg(long, env = "SPACES_BOOK_START")]
    start: NaiveDate,

    /// Last publish date to include (YYYY-MM-DD).
    #[arg(long, env = "SPACES_BOOK_END")]
    end: NaiveDate,

    /// Output directory; chapters go to `<out-dir>/chapters`.
    #[arg(long, env = "SPACES_BOOK_OUT_DIR", default_value = "output")]
    out_dir: PathBuf,

    /// Book file name prefix.
    #[arg(long, env = "SPACES_BOOK_NAME", default_value = "BigData")]
    name: String,

    /// Keep only the first N posts (debugging); 0 keeps all.
    #[arg(long)]
    limit: Option<usize>,

    /// Milliseconds to wait for MathJax after each page load.
    #[arg(long, env = "SPACES_BOOK_DELAY_MS", default_value_t = 10_000)]
    delay_ms: u64,

    /// Chapter order in the book.
    #[arg(long, env = "SPACES_BOOK_ORDER", value_enum, default_value = "asc")]
    order: OrderArg,

    /// Prepend a cover page.
    #[arg(long, env = "SPACES_BOOK_COVER")]
    cover: bool,

    /// Cover title (also the document title).
    #[arg(long, env = "SPACES_BOOK_COVER_TITLE")]
    cover_title: Option<String>,

    /// Do not stamp page numbers.
    #[arg(long)]
    no_page_numbers: bool,

    /// Do not add per-article bookmarks.
    #[arg(long)]
    no_bookmarks: bool,

    /// Parallel browser instances.
    #[arg(short, long, env = "SPACES_BOOK_WORKERS", default_value_t = 1,
          value_parser = clap::value_parser!(u16).range(1..=64))]
    workers: u16,

    /// Chrome/Chromium executable (auto-detected when omitted).
    #[arg(long, env = "SPACES_BOOK_CHROME")]
    chrome: Option<PathBuf>,

    /// Show the browser windows.
    #[arg(long)]
    headful: bool,

    /// Category listing to crawl.
    #[arg(long, env = "SPACES_BOOK_CATEGORY_URL")]
    category_url: Option<String>,

    /// Print the run summary as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "SPACES_BOOK_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SPACES_BOOK_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "SPACES_BOOK_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum OrderArg {
    Asc,
    Desc,
}

impl From<OrderArg> for SortOrder {
    fn from(v: OrderArg) -> Self {
        match v {
            OrderArg::Asc => SortOrder::Asc,
            OrderArg::Desc => SortOrder::Desc,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; warnings (skipped posts) stay.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else if show_progress {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn RenderProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;

    let summary = build_book(&config).await.context("Book build failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
        );
    } else if !cli.quiet {
        print_summary(&summary);
    }

    Ok(())
}

/// Map CLI args to `BookConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<BookConfig> {
    let mut builder = BookConfig::builder(cli.start, cli.end)
        .out_dir(&cli.out_dir)
        .name(&cli.name)
        .limit(cli.limit)
        .order(cli.order.clone().into())
        .cover(cli.cover)
        .bookmarks(!cli.no_bookmarks)
        .page_numbers(!cli.no_page_numbers)
        .delay_ms(cli.delay_ms)
        .workers(usize::from(cli.workers))
        .headful(cli.headful);

    if let Some(ref title) = cli.cover_title {
        builder = builder.cover_title(title);
    }
    if let Some(ref url) = cli.category_url {
        builder = builder.category_url(url);
    }
    if let Some(ref chrome) = cli.chrome {
        builder = builder.chrome_executable(chrome);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_summary(summary: &BookSummary) {
    eprintln!(
        "{}  {}/{} posts  {} pages  {}ms  →  {}",
        if summary.failed == 0 {
            green("✔")
        } else {
            cyan("⚠")
        },
        summary.rendered,
        summary.posts_found,
        summary.pages,
        summary.duration_ms,
        bold(&summary.output_path.display().to_string()),
    );
    eprintln!(
        "   chapters in {}",
        dim(&summary.chapters_dir.display().to_string())
    );
}
