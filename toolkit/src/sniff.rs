//! Content type detection from leading bytes.
//!
//! Only the first [`SNIFF_LEN`] bytes are examined. Byte-order marks and markup signatures
//! are checked first, then binary magic numbers through [`infer`], and finally the data is
//! classified as text or opaque binary.

/// Number of leading bytes inspected when sniffing.
pub const SNIFF_LEN: usize = 512;

const TEXT_UTF8: &str = "text/plain; charset=utf-8";
const OCTET_STREAM: &str = "application/octet-stream";

/// Tags that mark a document as HTML when followed by a space or `>`.
const HTML_TAGS: &[&[u8]] = &[
    b"<!DOCTYPE HTML",
    b"<HTML",
    b"<HEAD",
    b"<SCRIPT",
    b"<IFRAME",
    b"<H1",
    b"<DIV",
    b"<FONT",
    b"<TABLE",
    b"<A",
    b"<STYLE",
    b"<TITLE",
    b"<B",
    b"<BODY",
    b"<BR",
    b"<P",
    b"<!--",
];

/// Returns the MIME type of `data`, never failing.
pub fn detect_content_type(data: &[u8]) -> String {
    let data = &data[..data.len().min(SNIFF_LEN)];

    if let Some(charset_type) = byte_order_mark(data) {
        return charset_type.to_string();
    }

    let trimmed = trim_leading_whitespace(data);
    if let Some(markup_type) = markup(trimmed) {
        return markup_type.to_string();
    }

    if let Some(kind) = infer::get(data) {
        return kind.mime_type().to_string();
    }

    if data.iter().any(|&b| is_binary_byte(b)) {
        OCTET_STREAM.to_string()
    } else {
        TEXT_UTF8.to_string()
    }
}

fn byte_order_mark(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(&[0xFE, 0xFF]) {
        Some("text/plain; charset=utf-16be")
    } else if data.starts_with(&[0xFF, 0xFE]) {
        Some("text/plain; charset=utf-16le")
    } else if data.starts_with(&[0xEF, 0xBB, 0xBF]) {
        Some(TEXT_UTF8)
    } else {
        None
    }
}

fn markup(data: &[u8]) -> Option<&'static str> {
    let is_html = HTML_TAGS.iter().any(|tag| {
        data.len() > tag.len()
            && data[..tag.len()].eq_ignore_ascii_case(tag)
            && matches!(data[tag.len()], b' ' | b'>')
    });
    if is_html {
        return Some("text/html; charset=utf-8");
    }

    if data.starts_with(b"<?xml") {
        return Some("text/xml; charset=utf-8");
    }

    if data.starts_with(b"%!PS-Adobe-") {
        return Some("application/postscript");
    }

    None
}

fn trim_leading_whitespace(data: &[u8]) -> &[u8] {
    let start = data
        .iter()
        .position(|b| !matches!(b, b'\t' | b'\n' | b'\x0c' | b'\r' | b' '))
        .unwrap_or(data.len());
    &data[start..]
}

/// Control bytes that never appear in text.
fn is_binary_byte(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{sample_gif, sample_jpeg, sample_png};

    #[test]
    fn test_detects_image_signatures() {
        assert_eq!(detect_content_type(&sample_png()), "image/png");
        assert_eq!(detect_content_type(&sample_jpeg()), "image/jpeg");
        assert_eq!(detect_content_type(&sample_gif()), "image/gif");
    }

    #[test]
    fn test_detects_pdf() {
        assert_eq!(detect_content_type(b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n"), "application/pdf");
    }

    #[test]
    fn test_plain_text_fallback() {
        assert_eq!(detect_content_type(b"hello, world\n"), "text/plain; charset=utf-8");
        assert_eq!(detect_content_type(b""), "text/plain; charset=utf-8");
        assert_eq!(detect_content_type("ሰላም".as_bytes()), "text/plain; charset=utf-8");
    }

    #[test]
    fn test_binary_fallback() {
        assert_eq!(detect_content_type(&[0x00, 0x01, 0x02, 0x03]), "application/octet-stream");
    }

    #[test]
    fn test_markup_signatures() {
        assert_eq!(detect_content_type(b"  <!doctype html>\n<html>"), "text/html; charset=utf-8");
        assert_eq!(detect_content_type(b"<p>para</p>"), "text/html; charset=utf-8");
        assert_eq!(detect_content_type(b"<?xml version=\"1.0\"?>"), "text/xml; charset=utf-8");
        // `<PRE` is not `<P` followed by a terminator
        assert_eq!(detect_content_type(b"<PRE>x</PRE>"), "text/plain; charset=utf-8");
    }

    #[test]
    fn test_byte_order_marks() {
        assert_eq!(detect_content_type(&[0xFE, 0xFF, 0x00, 0x41]), "text/plain; charset=utf-16be");
        assert_eq!(detect_content_type(&[0xFF, 0xFE, 0x41, 0x00]), "text/plain; charset=utf-16le");
        assert_eq!(detect_content_type(&[0xEF, 0xBB, 0xBF, b'a']), "text/plain; charset=utf-8");
    }

    #[test]
    fn test_only_leading_bytes_are_inspected() {
        let mut data = vec![b'a'; SNIFF_LEN];
        data.push(0x00);
        assert_eq!(detect_content_type(&data), "text/plain; charset=utf-8");
    }
}
