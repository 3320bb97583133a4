//! Job partitioning and output naming.
//!
//! Workers receive contiguous chunks of the index-tagged job list, never a
//! round-robin deal, so each worker covers a chronological sub-range. The
//! zero-padded sequence index is the filename prefix; sorting the union of
//! every worker's filenames restores the original order.

use crate::post::RenderJob;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

/// Anything that is not a word character (CJK included) or a hyphen.
static SAFE_NAME_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\p{Han}-]+").unwrap());

/// Slug budget in bytes; keeps `{index}-{slug}.pdf` under the usual
/// 255-byte filename limit.
const MAX_SLUG_BYTES: usize = 120;

/// Minimum width of the zero-padded sequence prefix.
const MIN_INDEX_WIDTH: usize = 3;

/// Effective worker count: at least 1, at most one per job.
pub fn effective_workers(requested: usize, job_count: usize) -> usize {
    requested.max(1).min(job_count.max(1))
}

/// Split `jobs` into `workers` contiguous chunks of `ceil(len / workers)`.
///
/// The last chunk may be shorter. Fewer chunks than `workers` are returned
/// when the ceiling leaves nothing for the tail (e.g. 5 jobs over 4 workers
/// gives chunks of 2, 2, 1).
pub fn partition_jobs(jobs: Vec<RenderJob>, workers: usize) -> Vec<Vec<RenderJob>> {
    if jobs.is_empty() {
        return Vec::new();
    }
    let workers = effective_workers(workers, jobs.len());
    let chunk_size = jobs.len().div_ceil(workers);

    let mut chunks = Vec::with_capacity(workers);
    let mut rest = jobs.into_iter().peekable();
    while rest.peek().is_some() {
        chunks.push(rest.by_ref().take(chunk_size).collect());
    }
    chunks
}

/// Filesystem-safe stem for a post title; `article` when nothing survives.
///
/// Long titles are cut to [`MAX_SLUG_BYTES`] on a char boundary.
pub fn safe_filename(title: &str) -> String {
    let simplified = SAFE_NAME_PATTERN.replace_all(title, "-");
    let mut slug = simplified.trim_matches('-');
    if slug.len() > MAX_SLUG_BYTES {
        let mut end = MAX_SLUG_BYTES;
        while !slug.is_char_boundary(end) {
            end -= 1;
        }
        slug = slug[..end].trim_end_matches('-');
    }
    let trimmed = slug;
    if trimmed.is_empty() {
        "article".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Digits needed so every index in `1..=job_count` sorts lexicographically.
pub fn index_width(job_count: usize) -> usize {
    job_count.to_string().len().max(MIN_INDEX_WIDTH)
}

/// `{output_dir}/{index:0width}-{slug}.pdf`
pub fn chapter_path(output_dir: &Path, job: &RenderJob, width: usize) -> PathBuf {
    output_dir.join(format!(
        "{:0width$}-{}.pdf",
        job.sequence_index,
        safe_filename(&job.post.title),
        width = width
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::post::{to_jobs, Post};
    use chrono::NaiveDate;

    fn jobs(n: usize) -> Vec<RenderJob> {
        let posts: Vec<Post> = (1..=n)
            .map(|i| {
                Post::new(
                    format!("Post {i}"),
                    format!("https://spaces.ac.cn/archives/{i}"),
                    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                )
            })
            .collect();
        to_jobs(&posts)
    }

    #[test]
    fn chunks_are_contiguous_balanced_and_complete() {
        for n in 1..=23 {
            for w in 1..=n {
                let chunks = partition_jobs(jobs(n), w);
                let size = n.div_ceil(w);
                assert!(chunks.len() <= w, "n={n} w={w}");
                assert_eq!(chunks.iter().map(Vec::len).sum::<usize>(), n, "n={n} w={w}");

                let flat: Vec<usize> = chunks
                    .iter()
                    .flatten()
                    .map(|j| j.sequence_index)
                    .collect();
                assert_eq!(flat, (1..=n).collect::<Vec<_>>(), "n={n} w={w}");

                for (i, chunk) in chunks.iter().enumerate() {
                    if i + 1 < chunks.len() {
                        assert_eq!(chunk.len(), size, "n={n} w={w}");
                    } else {
                        assert!(!chunk.is_empty() && chunk.len() <= size, "n={n} w={w}");
                    }
                }
            }
        }
    }

    #[test]
    fn workers_clamped_to_job_count() {
        assert_eq!(effective_workers(8, 3), 3);
        assert_eq!(effective_workers(0, 3), 1);
        assert_eq!(effective_workers(4, 0), 1);
        assert_eq!(partition_jobs(jobs(3), 8).len(), 3);
        assert!(partition_jobs(Vec::new(), 4).is_empty());
    }

    #[test]
    fn safe_filename_keeps_cjk_and_words() {
        assert_eq!(safe_filename("Transformer升级之路：10、RoPE是一种β编码"), "Transformer升级之路-10-RoPE是一种β编码");
        assert_eq!(safe_filename("  a / b  "), "a-b");
        assert_eq!(safe_filename("???"), "article");
        assert_eq!(safe_filename(""), "article");
    }

    #[test]
    fn long_cjk_titles_are_capped_on_a_char_boundary() {
        let title = "长标题".repeat(40);
        let slug = safe_filename(&title);
        assert!(slug.len() <= MAX_SLUG_BYTES, "{} bytes", slug.len());
        assert!(title.starts_with(&slug));
        assert_eq!(slug.chars().count(), 40);

        let mut long_job = jobs(1).remove(0);
        long_job.post.title = title;
        let name = chapter_path(Path::new("out"), &long_job, index_width(1000));
        assert!(name.file_name().unwrap().len() < 255);
    }

    #[test]
    fn chapter_names_sort_in_sequence_order() {
        let all = jobs(12);
        let width = index_width(all.len());
        let mut names: Vec<String> = all
            .iter()
            .rev()
            .map(|j| {
                chapter_path(Path::new("out"), j, width)
                    .file_name()
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        names.sort();
        assert_eq!(names[0], "001-Post-1.pdf");
        assert_eq!(names[11], "012-Post-12.pdf");
    }

    #[test]
    fn index_width_grows_past_999() {
        assert_eq!(index_width(5), 3);
        assert_eq!(index_width(999), 3);
        assert_eq!(index_width(1000), 4);
    }
}
