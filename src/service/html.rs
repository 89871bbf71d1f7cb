//! Input normalization.
//!
//! Fragments such as `<h1>Hello</h1>` are wrapped in a minimal document so
//! that the page always parses in standards mode with a UTF-8 charset.
//! Inputs that already declare a doctype are passed through untouched.

use std::borrow::Cow;

const SKELETON_HEAD: &str = concat!(
    "<!DOCTYPE html>\n",
    "<html>\n<head>\n",
    "<meta charset=\"utf-8\">\n",
    "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n",
    "</head>\n<body>\n",
);

const SKELETON_TAIL: &str = "\n</body>\n</html>\n";

/// Return `html` as a complete document.
///
/// ```rust
/// use gerar_pdf_api::service::normalize_html;
///
/// let doc = normalize_html("<h1>Olá</h1>");
/// assert!(doc.starts_with("<!DOCTYPE html>"));
/// assert!(doc.contains("<meta charset=\"utf-8\">"));
///
/// let full = "<!doctype html><html><body>x</body></html>";
/// assert_eq!(normalize_html(full), full);
/// ```
pub fn normalize_html(html: &str) -> Cow<'_, str> {
    if has_doctype(html) {
        Cow::Borrowed(html)
    } else {
        let mut document =
            String::with_capacity(SKELETON_HEAD.len() + html.len() + SKELETON_TAIL.len());
        document.push_str(SKELETON_HEAD);
        document.push_str(html);
        document.push_str(SKELETON_TAIL);
        Cow::Owned(document)
    }
}

/// `true` if the document starts with a doctype, ignoring a BOM and whitespace.
fn has_doctype(html: &str) -> bool {
    let start = html.trim_start_matches('\u{feff}').trim_start();
    start
        .get(..9)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("<!doctype"))
}
