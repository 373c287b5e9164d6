//! Content type detection from the leading bytes of a body.
//!
//! Declared `Content-Type` headers are often missing or wrong, so the
//! classifier only trusts what the bytes themselves look like. At most the
//! first 512 bytes are considered.

const SNIFF_LEN: usize = 512;

pub const TEXT_HTML: &str = "text/html; charset=utf-8";
pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
pub const OCTET_STREAM: &str = "application/octet-stream";

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

const EXACT_SIGNATURES: &[(&[u8], &str)] = &[
    (b"%PDF-", "application/pdf"),
    (b"%!PS-Adobe-", "application/postscript"),
    (b"\xFE\xFF", "text/plain; charset=utf-16be"),
    (b"\xFF\xFE", "text/plain; charset=utf-16le"),
    (b"\xEF\xBB\xBF", TEXT_PLAIN),
    (b"\x00\x00\x01\x00", "image/x-icon"),
    (b"\x00\x00\x02\x00", "image/x-icon"),
    (b"BM", "image/bmp"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"\x89PNG\x0D\x0A\x1A\x0A", "image/png"),
    (b"\xFF\xD8\xFF", "image/jpeg"),
    (b"OggS\x00", "application/ogg"),
    (b"ID3", "audio/mpeg"),
    (b"\x1A\x45\xDF\xA3", "video/webm"),
    (b"\x1F\x8B\x08", "application/x-gzip"),
    (b"PK\x03\x04", "application/zip"),
    (b"Rar!\x1A\x07\x00", "application/x-rar-compressed"),
    (b"Rar!\x1A\x07\x01\x00", "application/x-rar-compressed"),
    (b"\x00\x61\x73\x6D", "application/wasm"),
];

/// Returns the MIME type the body most likely has. Never fails; unknown
/// binary data is `application/octet-stream`, unknown text is `text/plain`.
pub fn sniff_content_type(data: &[u8]) -> &'static str {
    let data = &data[..data.len().min(SNIFF_LEN)];

    let start = data
        .iter()
        .position(|b| !is_whitespace(*b))
        .unwrap_or(data.len());
    let trimmed = &data[start..];

    if HTML_TAGS.iter().any(|tag| matches_html_tag(trimmed, tag)) {
        return TEXT_HTML;
    }
    if trimmed.starts_with(b"<?xml") {
        return "text/xml; charset=utf-8";
    }

    for (signature, mime) in EXACT_SIGNATURES {
        if data.starts_with(signature) {
            return mime;
        }
    }

    if let Some(mime) = sniff_riff(data).or_else(|| sniff_mp4(data)) {
        return mime;
    }

    if data.iter().any(|b| is_binary_byte(*b)) {
        OCTET_STREAM
    } else {
        TEXT_PLAIN
    }
}

pub fn is_image(mime: &str) -> bool {
    mime.starts_with("image/")
}

pub fn is_html(mime: &str) -> bool {
    mime.trim_start()
        .get(..9)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("text/html"))
}

fn sniff_riff(data: &[u8]) -> Option<&'static str> {
    if data.len() < 14 || &data[..4] != b"RIFF" {
        return None;
    }
    match &data[8..12] {
        b"WEBP" if &data[12..14] == b"VP" => Some("image/webp"),
        b"WAVE" => Some("audio/wave"),
        b"AVI " => Some("video/avi"),
        _ => None,
    }
}

fn sniff_mp4(data: &[u8]) -> Option<&'static str> {
    if data.len() < 12 {
        return None;
    }
    let box_size = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if box_size < 12 || box_size % 4 != 0 || data.len() < box_size || &data[4..8] != b"ftyp" {
        return None;
    }
    let rest = data.get(16..box_size).unwrap_or_default();
    let mut brands = std::iter::once(&data[8..12]).chain(rest.chunks_exact(4));
    brands
        .any(|brand| &brand[..3] == b"mp4")
        .then_some("video/mp4")
}

fn matches_html_tag(data: &[u8], tag: &[u8]) -> bool {
    if data.len() < tag.len() + 1 {
        return false;
    }
    let prefix_matches = data
        .iter()
        .zip(tag)
        .all(|(b, t)| b.to_ascii_uppercase() == *t);
    prefix_matches && matches!(data[tag.len()], b' ' | b'>')
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b'\t' | b'\n' | 0x0C | b'\r' | b' ')
}

fn is_binary_byte(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_detection() {
        assert_eq!(sniff_content_type(b"<!DOCTYPE html><html></html>"), TEXT_HTML);
        assert_eq!(sniff_content_type(b"\n\n   <html lang=\"en\">"), TEXT_HTML);
        assert_eq!(sniff_content_type(b"<p>hello</p>"), TEXT_HTML);
        assert_eq!(sniff_content_type(b"<!-- comment -->"), TEXT_HTML);
        // Tag must be terminated by a space or '>'.
        assert_eq!(sniff_content_type(b"<abbr>x</abbr>"), TEXT_PLAIN);
    }

    #[test]
    fn test_image_signatures() {
        assert_eq!(sniff_content_type(b"\x89PNG\r\n\x1a\n"), "image/png");
        assert_eq!(sniff_content_type(b"GIF89a\x01\x00\x01\x00"), "image/gif");
        assert_eq!(sniff_content_type(b"\xFF\xD8\xFF\xE0\x00\x10JFIF"), "image/jpeg");
        assert_eq!(sniff_content_type(b"RIFF\x00\x00\x00\x00WEBPVP8 "), "image/webp");
        assert_eq!(sniff_content_type(b"BM\x00\x00"), "image/bmp");
    }

    #[test]
    fn test_text_and_binary() {
        assert_eq!(sniff_content_type(b""), TEXT_PLAIN);
        assert_eq!(sniff_content_type(b"just some words"), TEXT_PLAIN);
        assert_eq!(sniff_content_type(b"\x00\x01\x02\x03binary"), OCTET_STREAM);
        assert_eq!(sniff_content_type(b"%PDF-1.7"), "application/pdf");
        assert_eq!(sniff_content_type(b"<?xml version=\"1.0\"?>"), "text/xml; charset=utf-8");
    }

    #[test]
    fn test_mp4_brand() {
        let mut data = vec![0, 0, 0, 20];
        data.extend_from_slice(b"ftypisom\x00\x00\x02\x00mp41");
        assert_eq!(sniff_content_type(&data), "video/mp4");
    }

    #[test]
    fn test_mime_helpers() {
        assert!(is_image("image/png"));
        assert!(!is_image("text/html"));
        assert!(is_html("text/html; charset=utf-8"));
        assert!(is_html("Text/HTML"));
        assert!(!is_html("text/plain"));
        assert!(!is_html(""));
    }
}
