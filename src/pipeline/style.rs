//! Print layout: page geometry, viewport sizing and the style override.
//!
//! The site's MathJax output is responsive. If the browser viewport is wider
//! than the PDF's printable area, display equations are laid out for the wider
//! box and their right-aligned equation numbers fall off the page. The
//! viewport is therefore derived from the A4 printable width, and the print
//! scale compensates for the narrowed layout.

use serde::{Deserialize, Serialize};

pub const MM_PER_INCH: f64 = 25.4;
pub const CSS_PX_PER_INCH: f64 = 96.0;

pub const A4_WIDTH_MM: f64 = 210.0;
pub const A4_HEIGHT_MM: f64 = 297.0;

/// Shrink applied to the printable width when sizing the viewport.
pub const VIEWPORT_FUDGE: f64 = 0.92;

/// `Page.printToPDF` scale; below 1.0 to fit the narrowed viewport.
pub const PRINT_SCALE: f64 = 0.9;

/// Viewport height; only the width affects layout.
pub const VIEWPORT_HEIGHT_PX: u32 = 1200;

/// Page margins in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

impl Default for Margins {
    fn default() -> Self {
        Self {
            top: 20.0,
            bottom: 20.0,
            left: 16.0,
            right: 16.0,
        }
    }
}

/// Everything `Page.printToPDF` needs, in the browser's units (inches).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PdfOptions {
    pub paper_width_in: f64,
    pub paper_height_in: f64,
    pub margin_top_in: f64,
    pub margin_bottom_in: f64,
    pub margin_left_in: f64,
    pub margin_right_in: f64,
    pub print_background: bool,
    pub scale: f64,
}

impl Default for PdfOptions {
    fn default() -> Self {
        let m = Margins::default();
        Self {
            paper_width_in: mm_to_in(A4_WIDTH_MM),
            paper_height_in: mm_to_in(A4_HEIGHT_MM),
            margin_top_in: mm_to_in(m.top),
            margin_bottom_in: mm_to_in(m.bottom),
            margin_left_in: mm_to_in(m.left),
            margin_right_in: mm_to_in(m.right),
            print_background: true,
            scale: PRINT_SCALE,
        }
    }
}

/// Browser window/viewport size in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewportSize {
    pub width: u32,
    pub height: u32,
}

impl Default for ViewportSize {
    fn default() -> Self {
        Self {
            width: viewport_width_px(&Margins::default()),
            height: VIEWPORT_HEIGHT_PX,
        }
    }
}

fn mm_to_in(mm: f64) -> f64 {
    mm / MM_PER_INCH
}

/// Viewport width matching the A4 printable width at 96 px/in, times the fudge factor.
pub fn viewport_width_px(margins: &Margins) -> u32 {
    let printable_mm = A4_WIDTH_MM - margins.left - margins.right;
    (mm_to_in(printable_mm) * CSS_PX_PER_INCH * VIEWPORT_FUDGE).round() as u32
}

/// Injected after navigation: hide site chrome and comments, keep the
/// article inside the viewport, stop display math from clipping its
/// equation numbers, and hide MathJax status banners.
pub const PRINT_CSS: &str = r#"
header, nav, footer, #header, #nav, #footer, #sideBar, .MobileSideBar,
.post-footer, .PostComment, #comments, .comments, .comment-list, #respond,
.post-meta, .navigation, .Pages, #backtop {
    display: none !important;
}
html, body {
    width: 100% !important;
    margin: 0 !important;
    padding: 0 !important;
    overflow-x: visible !important;
}
body {
    font-family: 'Noto Serif SC', 'Source Han Serif SC', 'Songti SC', serif;
    font-size: 14px;
    line-height: 1.6;
}
#main, #PostBody, .Post, .PostContent {
    width: auto !important;
    max-width: 100% !important;
    margin: 0 auto !important;
    padding: 0 !important;
    float: none !important;
    box-sizing: border-box;
}
img {
    max-width: 100% !important;
    height: auto;
    page-break-inside: avoid;
}
h1, h2, h3, h4, h5, h6 {
    page-break-after: avoid;
}
pre, code {
    font-family: 'JetBrains Mono', 'Menlo', monospace;
    white-space: pre-wrap;
    word-break: break-word;
}
.MathJax_Display, mjx-container[display="true"], .MJXc-display {
    overflow: visible !important;
    max-width: 100% !important;
    padding-right: 2em !important;
    box-sizing: border-box;
}
.MathJax_Display .mtd, mjx-container[display="true"] mjx-mtd {
    overflow: visible !important;
}
#MathJax_Message, .MathJax_Preview, #MathJax_MenuFrame, .MathJax_loading {
    display: none !important;
}
"#;

/// JavaScript that appends [`PRINT_CSS`] as a `<style>` element.
pub fn style_injection_script(css: &str) -> String {
    // serde_json string encoding is a valid JS string literal.
    let literal = serde_json::to_string(css).unwrap_or_else(|_| "\"\"".to_string());
    format!(
        "(() => {{ const s = document.createElement('style'); \
         s.setAttribute('data-spaces-book', 'print'); \
         s.textContent = {literal}; \
         (document.head || document.documentElement).appendChild(s); \
         return true; }})()"
    )
}
