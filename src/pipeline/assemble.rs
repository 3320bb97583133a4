//! Book assembly: merge chapter PDFs into one document with lopdf.
//!
//! The output is built from scratch rather than appended to the first
//! chapter, so every page goes through the same copy path:
//!
//! 1. optional cover page (CJK title, embedded `STSong-Light` CID font)
//! 2. every page of every chapter, in order, deep-copied with inherited
//!    attributes (`Resources`, `MediaBox`, `CropBox`, `Rotate`) made explicit
//! 3. one outline entry per chapter at its first page (zero-page chapters
//!    get none; the cover gets one too)
//! 4. optional page-number overlay on every final page, cover included
//!
//! The file is written next to its destination and renamed into place.

use crate::error::BookError;
use crate::post::Post;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A4 in PDF points.
pub const A4_WIDTH_PT: f64 = 595.2756;
pub const A4_HEIGHT_PT: f64 = 841.8898;

const PT_PER_MM: f64 = 72.0 / 25.4;

const COVER_TITLE_SIZE: f64 = 32.0;
const COVER_SUBTITLE_SIZE: f64 = 14.0;
const COVER_TITLE_HEIGHT: f64 = 0.55;
const COVER_SUBTITLE_HEIGHT: f64 = 0.48;

const PAGE_NUMBER_SIZE: f64 = 9.0;
const PAGE_NUMBER_BASELINE_MM: f64 = 12.0;
/// Helvetica advance width of every digit, in 1/1000 em.
const HELVETICA_DIGIT_WIDTH: f64 = 556.0;

/// Resource names, chosen not to collide with what Chrome emits.
const COVER_FONT: &str = "FCover";
const PAGE_NUMBER_FONT: &str = "FPageNo";

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&str; 4] = ["Resources", "MediaBox", "CropBox", "Rotate"];

/// Toggles and texts for [`assemble_book`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembleOptions {
    pub add_cover: bool,
    pub add_bookmarks: bool,
    pub add_page_numbers: bool,
    pub cover_title: String,
    pub cover_subtitle: String,
}

impl Default for AssembleOptions {
    fn default() -> Self {
        Self {
            add_cover: false,
            add_bookmarks: true,
            add_page_numbers: false,
            cover_title: crate::config::DEFAULT_COVER_TITLE.to_string(),
            cover_subtitle: crate::config::DEFAULT_COVER_SUBTITLE.to_string(),
        }
    }
}

/// Merge `paths` (index-aligned with `posts`) into `output_path`.
///
/// Returns the number of pages in the written book.
///
/// # Errors
/// [`BookError::CountMismatch`] if the two slices differ in length,
/// [`BookError::PdfLoadFailed`] for an unreadable chapter, and write
/// failures for the output file. Nothing is written on error.
pub fn assemble_book(
    paths: &[PathBuf],
    posts: &[Post],
    output_path: &Path,
    opts: &AssembleOptions,
) -> Result<usize, BookError> {
    if paths.len() != posts.len() {
        return Err(BookError::CountMismatch {
            paths: paths.len(),
            posts: posts.len(),
        });
    }

    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let mut page_ids: Vec<ObjectId> = Vec::new();
    let mut outline: Vec<(String, ObjectId)> = Vec::new();

    if opts.add_cover {
        let cover_id = add_cover_page(&mut doc, pages_id, &opts.cover_title, &opts.cover_subtitle)?;
        page_ids.push(cover_id);
        if opts.add_bookmarks {
            outline.push((opts.cover_title.clone(), cover_id));
        }
    }

    for (path, post) in paths.iter().zip(posts) {
        let source = Document::load(path).map_err(|e| BookError::PdfLoadFailed {
            path: path.clone(),
            detail: e.to_string(),
        })?;
        let copied = copy_pages(&source, &mut doc, pages_id)?;
        debug!("{}: {} pages", path.display(), copied.len());

        if opts.add_bookmarks {
            if let Some(&first) = copied.first() {
                outline.push((post.title.clone(), first));
            }
        }
        page_ids.extend(copied);
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids.iter().copied().map(Object::Reference).collect::<Vec<_>>(),
            "Count" => page_ids.len() as i64,
        }),
    );

    let mut catalog = dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    };
    if let Some(outline_id) = build_outline(&mut doc, &outline) {
        catalog.set("Outlines", outline_id);
        catalog.set("PageMode", "UseOutlines");
    }
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", catalog_id);

    if opts.add_page_numbers {
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        for (i, &page_id) in page_ids.iter().enumerate() {
            overlay_page_number(&mut doc, page_id, i + 1, font_id)?;
        }
    }

    let info_id = doc.add_object(dictionary! {
        "Title" => text_string(&opts.cover_title),
        "Producer" => Object::string_literal(concat!("spaces-book ", env!("CARGO_PKG_VERSION"))),
    });
    doc.trailer.set("Info", info_id);

    doc.compress();
    write_atomic(&mut doc, output_path)?;

    info!(
        "Wrote {} ({} pages, {} bookmarks)",
        output_path.display(),
        page_ids.len(),
        outline.len()
    );
    Ok(page_ids.len())
}

// ── Page copying ─────────────────────────────────────────────────────────

/// Deep-copies objects from one document into another, each at most once.
struct ObjectCopier<'a> {
    source: &'a Document,
    target: &'a mut Document,
    id_map: HashMap<ObjectId, ObjectId>,
}

impl<'a> ObjectCopier<'a> {
    fn new(source: &'a Document, target: &'a mut Document) -> Self {
        Self {
            source,
            target,
            id_map: HashMap::new(),
        }
    }

    fn copy_object(&mut self, source_id: ObjectId) -> Result<ObjectId, lopdf::Error> {
        if let Some(&target_id) = self.id_map.get(&source_id) {
            return Ok(target_id);
        }

        // Reserve the id before recursing so reference cycles terminate.
        let new_id = self.target.add_object(Object::Null);
        self.id_map.insert(source_id, new_id);

        let obj = self.source.get_object(source_id)?.clone();
        let new_obj = self.remap_references(obj)?;
        self.target.objects.insert(new_id, new_obj);
        Ok(new_id)
    }

    fn remap_references(&mut self, obj: Object) -> Result<Object, lopdf::Error> {
        match obj {
            Object::Reference(id) => Ok(Object::Reference(self.copy_object(id)?)),
            Object::Array(arr) => Ok(Object::Array(
                arr.into_iter()
                    .map(|o| self.remap_references(o))
                    .collect::<Result<Vec<_>, _>>()?,
            )),
            Object::Dictionary(dict) => Ok(Object::Dictionary(self.remap_dict(dict)?)),
            Object::Stream(mut stream) => {
                stream.dict = self.remap_dict(stream.dict)?;
                Ok(Object::Stream(stream))
            }
            other => Ok(other),
        }
    }

    fn remap_dict(&mut self, mut dict: Dictionary) -> Result<Dictionary, lopdf::Error> {
        for (_, value) in dict.iter_mut() {
            *value = self.remap_references(value.clone())?;
        }
        Ok(dict)
    }
}

/// Copy every page of `source` into `target`, parented to `pages_id`.
///
/// Page ids are reserved up front so links and destinations that point at
/// sibling pages resolve to the copies instead of dragging the source page
/// tree along.
fn copy_pages(
    source: &Document,
    target: &mut Document,
    pages_id: ObjectId,
) -> Result<Vec<ObjectId>, BookError> {
    let source_pages: Vec<ObjectId> = source.get_pages().into_values().collect();
    let new_ids: Vec<ObjectId> = source_pages.iter().map(|_| target.new_object_id()).collect();

    let mut copier = ObjectCopier::new(source, target);
    for (&old, &new) in source_pages.iter().zip(&new_ids) {
        copier.id_map.insert(old, new);
    }

    for (&old, &new) in source_pages.iter().zip(&new_ids) {
        let flattened = flatten_page(source, old)?;
        let mut page = copier.remap_dict(flattened)?;
        page.set("Parent", pages_id);
        copier.target.objects.insert(new, Object::Dictionary(page));
    }
    Ok(new_ids)
}

/// The page dictionary with inherited attributes pulled down and `Parent` removed.
fn flatten_page(doc: &Document, page_id: ObjectId) -> Result<Dictionary, lopdf::Error> {
    let mut page = doc.get_dictionary(page_id)?.clone();
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    let mut depth = 0;

    while let Some(parent_id) = parent {
        let node = doc.get_dictionary(parent_id)?;
        for key in INHERITABLE {
            if !page.has(key.as_bytes()) {
                if let Ok(value) = node.get(key.as_bytes()) {
                    page.set(key, value.clone());
                }
            }
        }
        depth += 1;
        parent = if depth < 64 {
            node.get(b"Parent").and_then(Object::as_reference).ok()
        } else {
            None
        };
    }

    page.remove(b"Parent");
    Ok(page)
}

// ── Cover ────────────────────────────────────────────────────────────────

fn add_cover_page(
    doc: &mut Document,
    pages_id: ObjectId,
    title: &str,
    subtitle: &str,
) -> Result<ObjectId, BookError> {
    let font_id = add_cjk_font(doc);

    let mut operations = Vec::new();
    for (text, size, height) in [
        (title, COVER_TITLE_SIZE, COVER_TITLE_HEIGHT),
        (subtitle, COVER_SUBTITLE_SIZE, COVER_SUBTITLE_HEIGHT),
    ] {
        let x = (A4_WIDTH_PT - cjk_text_width(text, size)) / 2.0;
        let y = A4_HEIGHT_PT * height;
        operations.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![COVER_FONT.into(), Object::Real(size as f32)]),
            Operation::new("Td", vec![Object::Real(x as f32), Object::Real(y as f32)]),
            Operation::new("Tj", vec![Object::String(ucs2_be(text), StringFormat::Hexadecimal)]),
            Operation::new("ET", vec![]),
        ]);
    }
    let content = Content { operations }.encode()?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, content));

    Ok(doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), Object::Real(A4_WIDTH_PT as f32), Object::Real(A4_HEIGHT_PT as f32)],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "Font" => dictionary! { COVER_FONT => font_id },
        },
    }))
}

/// `STSong-Light` from the Adobe-GB1 collection; viewers supply the glyphs.
fn add_cjk_font(doc: &mut Document) -> ObjectId {
    let descriptor_id = doc.add_object(dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => "STSong-Light",
        "Flags" => 6,
        "FontBBox" => vec![(-25).into(), (-254).into(), 1000.into(), 880.into()],
        "ItalicAngle" => 0,
        "Ascent" => 880,
        "Descent" => -120,
        "CapHeight" => 880,
        "StemV" => 93,
    });
    let descendant_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "CIDFontType0",
        "BaseFont" => "STSong-Light",
        "CIDSystemInfo" => dictionary! {
            "Registry" => Object::string_literal("Adobe"),
            "Ordering" => Object::string_literal("GB1"),
            "Supplement" => 2,
        },
        "FontDescriptor" => descriptor_id,
        "DW" => 1000,
        // Proportional Latin range, rendered at half width.
        "W" => vec![1.into(), 95.into(), 500.into()],
    });
    doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type0",
        "BaseFont" => "STSong-Light-UniGB-UCS2-H",
        "Encoding" => "UniGB-UCS2-H",
        "DescendantFonts" => vec![descendant_id.into()],
    })
}

/// Printable ASCII is half width, everything else a full em.
fn cjk_text_width(text: &str, size: f64) -> f64 {
    text.chars()
        .map(|c| if (' '..='~').contains(&c) { 0.5 } else { 1.0 })
        .sum::<f64>()
        * size
}

/// UCS-2 big-endian; characters outside the BMP become `?`.
fn ucs2_be(text: &str) -> Vec<u8> {
    text.chars()
        .flat_map(|c| {
            let unit = u16::try_from(u32::from(c)).unwrap_or(u16::from(b'?'));
            unit.to_be_bytes()
        })
        .collect()
}

/// PDF text string: UTF-16BE with a byte-order mark.
fn text_string(text: &str) -> Object {
    let mut bytes = vec![0xFE, 0xFF];
    bytes.extend(text.encode_utf16().flat_map(u16::to_be_bytes));
    Object::String(bytes, StringFormat::Hexadecimal)
}

// ── Outline ──────────────────────────────────────────────────────────────

/// Flat outline, one entry per `(title, page)`; `None` when empty.
fn build_outline(doc: &mut Document, entries: &[(String, ObjectId)]) -> Option<ObjectId> {
    if entries.is_empty() {
        return None;
    }
    let root_id = doc.new_object_id();
    let item_ids: Vec<ObjectId> = entries.iter().map(|_| doc.new_object_id()).collect();

    for (i, (title, page_id)) in entries.iter().enumerate() {
        let mut item = dictionary! {
            "Title" => text_string(title),
            "Parent" => root_id,
            "Dest" => vec![Object::Reference(*page_id), "Fit".into()],
        };
        if i > 0 {
            item.set("Prev", item_ids[i - 1]);
        }
        if i + 1 < item_ids.len() {
            item.set("Next", item_ids[i + 1]);
        }
        doc.objects.insert(item_ids[i], Object::Dictionary(item));
    }

    doc.objects.insert(
        root_id,
        Object::Dictionary(dictionary! {
            "Type" => "Outlines",
            "First" => item_ids[0],
            "Last" => item_ids[item_ids.len() - 1],
            "Count" => item_ids.len() as i64,
        }),
    );
    Some(root_id)
}

/// One top-level outline entry as read back from a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineEntry {
    pub title: String,
    /// 0-based index of the destination page.
    pub page_index: usize,
}

/// Walk the top level of the document outline.
pub fn read_outline(doc: &Document) -> Result<Vec<OutlineEntry>, BookError> {
    let page_index: HashMap<ObjectId, usize> = doc
        .get_pages()
        .into_values()
        .enumerate()
        .map(|(i, id)| (id, i))
        .collect();

    let catalog = doc.catalog()?;
    let outlines_id = match catalog.get(b"Outlines").and_then(Object::as_reference) {
        Ok(id) => id,
        Err(_) => return Ok(Vec::new()),
    };
    let mut next = doc
        .get_dictionary(outlines_id)?
        .get(b"First")
        .and_then(Object::as_reference)
        .ok();

    let mut entries = Vec::new();
    while let Some(item_id) = next {
        let item = doc.get_dictionary(item_id)?;
        let title = match item.get(b"Title")? {
            Object::String(bytes, _) => decode_text_string(bytes),
            _ => String::new(),
        };
        let dest_page = item.get(b"Dest")?.as_array()?
            .first()
            .and_then(|o| o.as_reference().ok())
            .and_then(|id| page_index.get(&id).copied())
            .ok_or_else(|| BookError::PdfAssemblyFailed(format!("outline '{title}' has no page destination")))?;
        entries.push(OutlineEntry {
            title,
            page_index: dest_page,
        });
        next = item.get(b"Next").and_then(Object::as_reference).ok();
        if entries.len() > page_index.len() + 1 {
            return Err(BookError::PdfAssemblyFailed("outline chain does not terminate".into()));
        }
    }
    Ok(entries)
}

fn decode_text_string(bytes: &[u8]) -> String {
    match bytes {
        [0xFE, 0xFF, rest @ ..] => {
            let units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|p| u16::from_be_bytes([p[0], p[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

// ── Page numbers ─────────────────────────────────────────────────────────

/// Stamp `number` centred 12 mm above the bottom edge of the page.
///
/// The page's own content is wrapped in `q … Q` first so whatever
/// transformation it leaves behind cannot move the label.
fn overlay_page_number(
    doc: &mut Document,
    page_id: ObjectId,
    number: usize,
    font_id: ObjectId,
) -> Result<(), BookError> {
    let [llx, lly, urx, _] = media_box(doc, page_id)?;
    let label = number.to_string();
    let label_width = label.len() as f64 * HELVETICA_DIGIT_WIDTH / 1000.0 * PAGE_NUMBER_SIZE;
    let x = llx + (urx - llx - label_width) / 2.0;
    let y = lly + PAGE_NUMBER_BASELINE_MM * PT_PER_MM;

    let overlay = Content {
        operations: vec![
            Operation::new("Q", vec![]),
            Operation::new("q", vec![]),
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![PAGE_NUMBER_FONT.into(), Object::Real(PAGE_NUMBER_SIZE as f32)]),
            Operation::new("Td", vec![Object::Real(x as f32), Object::Real(y as f32)]),
            Operation::new("Tj", vec![Object::string_literal(label)]),
            Operation::new("ET", vec![]),
            Operation::new("Q", vec![]),
        ],
    }
    .encode()?;
    let open_id = doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
    let overlay_id = doc.add_object(Stream::new(dictionary! {}, overlay));

    let page = doc.get_dictionary(page_id)?;
    let mut resources = owned_dict(doc, page.get(b"Resources").ok())?;
    let mut fonts = owned_dict(doc, resources.get(b"Font").ok())?;
    fonts.set(PAGE_NUMBER_FONT, font_id);
    resources.set("Font", fonts);

    let mut contents = vec![Object::Reference(open_id)];
    match page.get(b"Contents") {
        Ok(Object::Array(existing)) => contents.extend(existing.iter().cloned()),
        Ok(single) => contents.push(single.clone()),
        Err(_) => {}
    }
    contents.push(Object::Reference(overlay_id));

    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page.set("Resources", resources);
    page.set("Contents", contents);
    Ok(())
}

/// A dictionary value (direct or referenced) cloned for local mutation.
fn owned_dict(doc: &Document, obj: Option<&Object>) -> Result<Dictionary, lopdf::Error> {
    match obj {
        Some(Object::Reference(id)) => Ok(doc.get_dictionary(*id)?.clone()),
        Some(Object::Dictionary(dict)) => Ok(dict.clone()),
        _ => Ok(Dictionary::new()),
    }
}

fn media_box(doc: &Document, page_id: ObjectId) -> Result<[f64; 4], BookError> {
    let page = doc.get_dictionary(page_id)?;
    let raw = match page.get(b"MediaBox") {
        Ok(Object::Reference(id)) => doc.get_object(*id)?,
        Ok(obj) => obj,
        Err(_) => return Ok([0.0, 0.0, A4_WIDTH_PT, A4_HEIGHT_PT]),
    };
    let values: Vec<f64> = raw.as_array()?.iter().filter_map(number).collect();
    match values.as_slice() {
        &[a, b, c, d] => Ok([a, b, c, d]),
        _ => Err(BookError::PdfAssemblyFailed(format!(
            "page {page_id:?} has a malformed MediaBox"
        ))),
    }
}

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

// ── Output ───────────────────────────────────────────────────────────────

fn write_atomic(doc: &mut Document, output_path: &Path) -> Result<(), BookError> {
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| BookError::OutputDirFailed {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| BookError::PdfAssemblyFailed(format!("serialise: {e}")))?;

    let tmp = output_path.with_extension("pdf.tmp");
    std::fs::write(&tmp, &bytes).map_err(|e| BookError::PdfWriteFailed {
        path: tmp.clone(),
        source: e,
    })?;
    std::fs::rename(&tmp, output_path).map_err(|e| BookError::PdfWriteFailed {
        path: output_path.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    /// A chapter-like PDF: `pages` pages of "`label` N", Resources and
    /// MediaBox inherited from the page tree the way Chrome writes them.
    fn chapter_pdf(dir: &Path, name: &str, label: &str, pages: u32) -> PathBuf {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });

        let mut kids = Vec::new();
        for i in 1..=pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![100.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(format!("{label} {i}"))]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages as i64,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
                "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
            }),
        );
        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);

        let path = dir.join(name);
        doc.save(&path).unwrap();
        path
    }

    fn post(title: &str, day: u32) -> Post {
        Post::new(
            title,
            format!("https://spaces.ac.cn/archives/{day}"),
            NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
        )
    }

    fn page_text(doc: &Document, index: usize) -> String {
        let id = doc.get_pages().into_values().nth(index).unwrap();
        String::from_utf8_lossy(&doc.get_page_content(id).unwrap()).into_owned()
    }

    #[test]
    fn mismatched_lengths_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let a = chapter_pdf(dir.path(), "001-a.pdf", "A", 1);
        let err = assemble_book(&[a], &[], &dir.path().join("book.pdf"), &AssembleOptions::default())
            .unwrap_err();
        assert!(matches!(err, BookError::CountMismatch { paths: 1, posts: 0 }));
        assert!(!dir.path().join("book.pdf").exists());
    }

    #[test]
    fn concatenates_in_order_with_bookmarks_at_offsets() {
        let dir = tempfile::tempdir().unwrap();
        let paths = vec![
            chapter_pdf(dir.path(), "001-a.pdf", "Alpha", 2),
            chapter_pdf(dir.path(), "002-b.pdf", "Beta", 3),
            chapter_pdf(dir.path(), "003-c.pdf", "Gamma", 1),
        ];
        let posts = vec![post("A", 1), post("B", 2), post("C", 3)];
        let out = dir.path().join("nested/book.pdf");

        let pages = assemble_book(&paths, &posts, &out, &AssembleOptions::default()).unwrap();
        assert_eq!(pages, 6);

        let doc = Document::load(&out).unwrap();
        assert_eq!(doc.get_pages().len(), 6);
        assert!(page_text(&doc, 0).contains("Alpha 1"));
        assert!(page_text(&doc, 2).contains("Beta 1"));
        assert!(page_text(&doc, 5).contains("Gamma 1"));

        let outline = read_outline(&doc).unwrap();
        let got: Vec<(&str, usize)> = outline.iter().map(|e| (e.title.as_str(), e.page_index)).collect();
        assert_eq!(got, vec![("A", 0), ("B", 2), ("C", 5)]);
        assert!(!dir.path().join("nested/book.pdf.tmp").exists());
    }

    #[test]
    fn cover_is_first_page_and_first_bookmark() {
        let dir = tempfile::tempdir().unwrap();
        let paths = vec![chapter_pdf(dir.path(), "001-a.pdf", "Alpha", 1)];
        let posts = vec![post("苏剑林：第一篇", 1)];
        let out = dir.path().join("book.pdf");
        let opts = AssembleOptions {
            add_cover: true,
            ..AssembleOptions::default()
        };

        assert_eq!(assemble_book(&paths, &posts, &out, &opts).unwrap(), 2);
        let doc = Document::load(&out).unwrap();
        let outline = read_outline(&doc).unwrap();
        assert_eq!(outline.len(), 2);
        assert_eq!(outline[0].title, crate::config::DEFAULT_COVER_TITLE);
        assert_eq!(outline[0].page_index, 0);
        assert_eq!(outline[1].title, "苏剑林：第一篇");
        assert_eq!(outline[1].page_index, 1);
        assert!(page_text(&doc, 0).contains(COVER_FONT));
    }

    #[test]
    fn zero_page_chapter_gets_no_bookmark() {
        let dir = tempfile::tempdir().unwrap();
        let paths = vec![
            chapter_pdf(dir.path(), "001-a.pdf", "Alpha", 1),
            chapter_pdf(dir.path(), "002-empty.pdf", "Empty", 0),
            chapter_pdf(dir.path(), "003-c.pdf", "Gamma", 1),
        ];
        let posts = vec![post("A", 1), post("Empty", 2), post("C", 3)];
        let out = dir.path().join("book.pdf");

        assemble_book(&paths, &posts, &out, &AssembleOptions::default()).unwrap();
        let outline = read_outline(&Document::load(&out).unwrap()).unwrap();
        let titles: Vec<&str> = outline.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "C"]);
        assert_eq!(outline[1].page_index, 1);
    }

    #[test]
    fn page_numbers_cover_every_page_without_adding_any() {
        let dir = tempfile::tempdir().unwrap();
        let paths = vec![
            chapter_pdf(dir.path(), "001-a.pdf", "Alpha", 2),
            chapter_pdf(dir.path(), "002-b.pdf", "Beta", 1),
        ];
        let posts = vec![post("A", 1), post("B", 2)];
        let out = dir.path().join("book.pdf");
        let opts = AssembleOptions {
            add_cover: true,
            add_page_numbers: true,
            ..AssembleOptions::default()
        };

        assert_eq!(assemble_book(&paths, &posts, &out, &opts).unwrap(), 4);
        let doc = Document::load(&out).unwrap();
        assert_eq!(doc.get_pages().len(), 4);
        for i in 0..4 {
            let text = page_text(&doc, i);
            assert!(text.contains(PAGE_NUMBER_FONT), "page {i}: {text}");
            assert!(text.contains(&format!("({})", i + 1)), "page {i}: {text}");
        }
        // original content survives under the overlay
        assert!(page_text(&doc, 1).contains("Alpha 1"));
    }

    #[test]
    fn bookmarks_can_be_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let paths = vec![chapter_pdf(dir.path(), "001-a.pdf", "Alpha", 1)];
        let out = dir.path().join("book.pdf");
        let opts = AssembleOptions {
            add_bookmarks: false,
            ..AssembleOptions::default()
        };
        assemble_book(&paths, &[post("A", 1)], &out, &opts).unwrap();
        assert!(read_outline(&Document::load(&out).unwrap()).unwrap().is_empty());
    }

    #[test]
    fn unreadable_chapter_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("001-bad.pdf");
        std::fs::write(&bad, b"not a pdf").unwrap();
        let err = assemble_book(
            &[bad.clone()],
            &[post("A", 1)],
            &dir.path().join("book.pdf"),
            &AssembleOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, BookError::PdfLoadFailed { ref path, .. } if *path == bad));
    }

    #[test]
    fn text_strings_round_trip_utf16() {
        match text_string("苏剑林 Big-Data") {
            Object::String(bytes, _) => assert_eq!(decode_text_string(&bytes), "苏剑林 Big-Data"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn cjk_width_counts_ascii_as_half() {
        assert_eq!(cjk_text_width("ab", 10.0), 10.0);
        assert_eq!(cjk_text_width("苏剑", 10.0), 20.0);
        assert_eq!(ucs2_be("苏A"), vec![0x82, 0xCF, 0x00, 0x41]);
    }
}
