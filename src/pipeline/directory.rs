//! Post Directory: walk the paginated category listing and collect posts.
//!
//! Each listing page is streamed through `lol_html` once. Element handlers
//! open a new record at every `div.Post`, text handlers accumulate the title
//! (`h2 a`) and metadata line (`span.submitted`), and every anchor is kept so
//! the `»` pagination link can be found afterwards. Records missing a link or
//! a `YYYY-MM-DD` date are skipped.
//!
//! The directory is fully materialised before rendering starts: filtered to
//! `[start, end]`, deduplicated by URL, and sorted by (date, archive id).

use crate::error::BookError;
use crate::post::Post;
use async_trait::async_trait;
use chrono::NaiveDate;
use lol_html::{element, rewrite_str, text, RewriteStrSettings};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, info};

static DATE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{4}-\d{2}-\d{2})").unwrap());

/// Text of the pagination link to the next (older) listing page.
const NEXT_PAGE_TEXT: &str = "»";

/// Source of listing HTML.
///
/// The HTTP implementation is [`HttpFetcher`]; tests substitute an
/// in-memory map.
#[async_trait]
pub trait ListingFetcher: Send + Sync {
    /// Return the body of `url`, failing on transport errors and non-2xx status.
    async fn fetch(&self, url: &str) -> Result<String, BookError>;
}

/// `reqwest`-backed listing fetcher.
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpFetcher {
    pub fn new(timeout_secs: u64) -> Result<Self, BookError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("spaces-book/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BookError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            timeout_secs,
        })
    }
}

#[async_trait]
impl ListingFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, BookError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            let reason = if e.is_timeout() {
                format!("timed out after {}s", self.timeout_secs)
            } else {
                e.to_string()
            };
            BookError::ListingFetchFailed {
                url: url.to_string(),
                reason,
            }
        })?;

        if !response.status().is_success() {
            return Err(BookError::ListingHttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| BookError::ListingFetchFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Posts and pagination found on one listing page.
#[derive(Debug, Default, PartialEq)]
pub struct ListingPage {
    pub posts: Vec<Post>,
    pub next_page: Option<String>,
}

#[derive(Default)]
struct RawEntry {
    href: Option<String>,
    title: String,
    meta: String,
}

#[derive(Default)]
struct ParseState {
    entries: Vec<RawEntry>,
    anchors: Vec<(String, String)>,
}

/// Extract post records and the next-page link from listing HTML.
///
/// Relative links resolve against `page_url`.
pub fn parse_listing(html: &str, page_url: &str) -> Result<ListingPage, BookError> {
    let base = Url::parse(page_url).map_err(|e| BookError::ListingParseFailed {
        url: page_url.to_string(),
        detail: e.to_string(),
    })?;
    let state = Rc::new(RefCell::new(ParseState::default()));

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("div.Post", {
                    let state = Rc::clone(&state);
                    move |_el| {
                        state.borrow_mut().entries.push(RawEntry::default());
                        Ok(())
                    }
                }),
                element!("div.Post h2 a[href]", {
                    let state = Rc::clone(&state);
                    move |el| {
                        let mut state = state.borrow_mut();
                        if let Some(entry) = state.entries.last_mut() {
                            if entry.href.is_none() {
                                entry.href = el.get_attribute("href");
                            }
                        }
                        Ok(())
                    }
                }),
                text!("div.Post h2 a", {
                    let state = Rc::clone(&state);
                    move |t| {
                        if let Some(entry) = state.borrow_mut().entries.last_mut() {
                            entry.title.push_str(t.as_str());
                        }
                        Ok(())
                    }
                }),
                text!("div.Post span.submitted", {
                    let state = Rc::clone(&state);
                    move |t| {
                        if let Some(entry) = state.borrow_mut().entries.last_mut() {
                            entry.meta.push_str(t.as_str());
                            entry.meta.push(' ');
                        }
                        Ok(())
                    }
                }),
                element!("a[href]", {
                    let state = Rc::clone(&state);
                    move |el| {
                        let href = el.get_attribute("href").unwrap_or_default();
                        state.borrow_mut().anchors.push((href, String::new()));
                        Ok(())
                    }
                }),
                text!("a[href]", {
                    let state = Rc::clone(&state);
                    move |t| {
                        if let Some((_, text)) = state.borrow_mut().anchors.last_mut() {
                            text.push_str(t.as_str());
                        }
                        Ok(())
                    }
                }),
            ],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|e| BookError::ListingParseFailed {
        url: page_url.to_string(),
        detail: e.to_string(),
    })?;

    let state = state.take();

    let mut posts = Vec::with_capacity(state.entries.len());
    for entry in state.entries {
        match entry_to_post(entry, &base) {
            Some(post) => posts.push(post),
            None => debug!("Skipping incomplete listing entry on {}", page_url),
        }
    }

    let next_page = state
        .anchors
        .iter()
        .find(|(href, text)| !href.is_empty() && decode_entities(text).trim() == NEXT_PAGE_TEXT)
        .and_then(|(href, _)| base.join(&decode_entities(href)).ok())
        .map(String::from);

    Ok(ListingPage { posts, next_page })
}

fn entry_to_post(entry: RawEntry, base: &Url) -> Option<Post> {
    let href = entry.href.filter(|h| !h.trim().is_empty())?;
    let url = base.join(decode_entities(&href).trim()).ok()?;
    let title = decode_entities(&entry.title).trim().to_string();
    let meta = decode_entities(&entry.meta);
    let date = DATE_PATTERN
        .captures(&meta)
        .and_then(|c| NaiveDate::parse_from_str(&c[1], "%Y-%m-%d").ok())?;
    Some(Post::new(title, url.to_string(), date))
}

/// Decode HTML character references (named and numeric).
fn decode_entities(s: &str) -> String {
    html_escape::decode_html_entities(s).into_owned()
}

/// Walk the listing from `category_url` and return posts dated within
/// `[start, end]`, deduplicated by URL and sorted by (date, archive id).
///
/// Any fetch or parse failure aborts the walk.
pub async fn collect_posts(
    fetcher: &dyn ListingFetcher,
    category_url: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<Post>, BookError> {
    if start > end {
        return Err(BookError::InvalidDateRange { start, end });
    }

    let mut posts: Vec<Post> = Vec::new();
    let mut seen_pages: HashSet<String> = HashSet::new();
    let mut seen_urls: HashSet<String> = HashSet::new();
    let mut page_url = Some(category_url.to_string());

    while let Some(url) = page_url.take() {
        if !seen_pages.insert(url.clone()) {
            debug!("Listing page already visited, stopping: {}", url);
            break;
        }

        let html = fetcher.fetch(&url).await?;
        let page = parse_listing(&html, &url)?;
        debug!(
            "Listing {}: {} entries, next = {:?}",
            url,
            page.posts.len(),
            page.next_page
        );

        for post in page.posts {
            if post.date < start || post.date > end {
                continue;
            }
            if seen_urls.insert(post.url.clone()) {
                posts.push(post);
            }
        }

        page_url = page.next_page;
    }

    posts.sort_by_key(Post::sort_key);
    info!(
        "Directory: {} posts in {} ~ {} ({} listing pages)",
        posts.len(),
        start,
        end,
        seen_pages.len()
    );
    Ok(posts)
}

/// Crawl the configured category over HTTP.
pub async fn fetch_posts(
    category_url: &str,
    start: NaiveDate,
    end: NaiveDate,
    timeout_secs: u64,
) -> Result<Vec<Post>, BookError> {
    let fetcher = HttpFetcher::new(timeout_secs)?;
    collect_posts(&fetcher, category_url, start, end).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const BASE: &str = "https://spaces.ac.cn/category/Big-Data";

    fn post_html(id: u32, title: &str, date: &str) -> String {
        format!(
            r#"<div class="Post"><h2><a href="/archives/{id}">{title}</a></h2>
               <span class="submitted">By 苏剑林 | {date} | 1234 Readers</span></div>"#
        )
    }

    fn page_html(posts: &[String], next: Option<&str>) -> String {
        let nav = next
            .map(|n| format!(r#"<div class="pages"><a href="{n}">2</a><a href="{n}">&raquo;</a></div>"#))
            .unwrap_or_default();
        format!("<html><body>{}{}</body></html>", posts.join("\n"), nav)
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    struct MapFetcher(HashMap<String, String>);

    #[async_trait]
    impl ListingFetcher for MapFetcher {
        async fn fetch(&self, url: &str) -> Result<String, BookError> {
            self.0
                .get(url)
                .cloned()
                .ok_or_else(|| BookError::ListingHttpStatus {
                    url: url.to_string(),
                    status: 404,
                })
        }
    }

    #[test]
    fn parse_extracts_posts_and_next() {
        let html = page_html(
            &[
                post_html(200, "Attention &amp; Memory", "2024-03-02"),
                post_html(199, "Scaling", "2024-03-01"),
            ],
            Some("/category/Big-Data/2/"),
        );
        let page = parse_listing(&html, BASE).unwrap();
        assert_eq!(page.posts.len(), 2);
        assert_eq!(page.posts[0].title, "Attention & Memory");
        assert_eq!(page.posts[0].url, "https://spaces.ac.cn/archives/200");
        assert_eq!(page.posts[0].date, d("2024-03-02"));
        assert_eq!(
            page.next_page.as_deref(),
            Some("https://spaces.ac.cn/category/Big-Data/2/")
        );
    }

    #[test]
    fn parse_skips_entries_without_date_or_link() {
        let html = r#"
            <div class="Post"><h2><a href="/archives/1">No date</a></h2><span class="submitted">soon</span></div>
            <div class="Post"><h2>No link</h2><span class="submitted">2024-01-01</span></div>
            <div class="Post"><h2><a href="/archives/3">Fine</a></h2><span class="submitted">2024-01-03</span></div>
        "#;
        let page = parse_listing(html, BASE).unwrap();
        assert_eq!(page.posts.len(), 1);
        assert_eq!(page.posts[0].title, "Fine");
        assert_eq!(page.next_page, None);
    }

    #[test]
    fn decode_handles_numeric_and_named() {
        assert_eq!(decode_entities("a&#187;b&#xBB;c&raquo;"), "a»b»c»");
        assert_eq!(decode_entities("&unknown; &lt;x&gt;"), "&unknown; <x>");
    }

    #[test]
    fn parse_decodes_typographic_entities_in_titles() {
        let html = page_html(
            &[post_html(
                7,
                "&ldquo;Attention&rdquo; &mdash; Part&nbsp;2 &hellip;",
                "2024-02-07",
            )],
            None,
        );
        let page = parse_listing(&html, BASE).unwrap();
        assert_eq!(page.posts[0].title, "\u{201c}Attention\u{201d} \u{2014} Part\u{a0}2 \u{2026}");
    }

    #[test]
    fn collect_filters_dedups_and_sorts() {
        let page2 = "https://spaces.ac.cn/category/Big-Data/2/";
        let mut pages = HashMap::new();
        pages.insert(
            BASE.to_string(),
            page_html(
                &[
                    post_html(310, "Too new", "2024-05-01"),
                    post_html(305, "Same day later", "2024-04-10"),
                    post_html(301, "Same day earlier", "2024-04-10"),
                ],
                Some(page2),
            ),
        );
        pages.insert(
            page2.to_string(),
            page_html(
                &[
                    // Overlaps page 1.
                    post_html(301, "Same day earlier", "2024-04-10"),
                    post_html(290, "Start day", "2024-04-01"),
                    post_html(280, "Too old", "2024-03-31"),
                ],
                // Points back at itself; the walk must still terminate.
                Some(page2),
            ),
        );
        let fetcher = MapFetcher(pages);

        let posts = tokio_test::block_on(collect_posts(
            &fetcher,
            BASE,
            d("2024-04-01"),
            d("2024-04-30"),
        ))
        .unwrap();

        let titles: Vec<&str> = posts.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Start day", "Same day earlier", "Same day later"]);
        for p in &posts {
            assert!(p.date >= d("2024-04-01") && p.date <= d("2024-04-30"));
        }
    }

    #[test]
    fn collect_propagates_fetch_errors() {
        let fetcher = MapFetcher(HashMap::new());
        let err = tokio_test::block_on(collect_posts(
            &fetcher,
            BASE,
            d("2024-04-01"),
            d("2024-04-30"),
        ))
        .unwrap_err();
        assert!(matches!(err, BookError::ListingHttpStatus { status: 404, .. }));
    }
}
