//! MIME type detection module
//!
//! One extension table drives both the Content-Type of downloads and the
//! viewer a listing links to. Matching is case-insensitive.

use std::path::Path;

/// How a file is presented in listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Image,
    Text,
    Video,
    Other,
}

/// Extension, Content-Type, kind
const EXTENSIONS: &[(&str, &str, FileKind)] = &[
    // Text
    ("html", "text/html; charset=utf-8", FileKind::Other),
    ("htm", "text/html; charset=utf-8", FileKind::Other),
    ("css", "text/css; charset=utf-8", FileKind::Other),
    ("txt", "text/plain; charset=utf-8", FileKind::Text),
    ("md", "text/markdown; charset=utf-8", FileKind::Other),
    ("xml", "application/xml", FileKind::Other),
    // JavaScript/WASM
    ("js", "text/javascript; charset=utf-8", FileKind::Other),
    ("mjs", "text/javascript; charset=utf-8", FileKind::Other),
    ("json", "application/json", FileKind::Other),
    ("wasm", "application/wasm", FileKind::Other),
    // Images
    ("png", "image/png", FileKind::Image),
    ("jpg", "image/jpeg", FileKind::Image),
    ("jpeg", "image/jpeg", FileKind::Other),
    ("gif", "image/gif", FileKind::Image),
    ("svg", "image/svg+xml", FileKind::Other),
    ("ico", "image/x-icon", FileKind::Other),
    ("webp", "image/webp", FileKind::Other),
    // Video
    ("mp4", "video/mp4", FileKind::Video),
    ("mkv", "video/x-matroska", FileKind::Video),
    ("mov", "video/quicktime", FileKind::Video),
    ("webm", "video/webm", FileKind::Other),
    ("avi", "video/x-msvideo", FileKind::Other),
    // Audio
    ("mp3", "audio/mpeg", FileKind::Other),
    ("wav", "audio/wav", FileKind::Other),
    ("flac", "audio/flac", FileKind::Other),
    // Documents
    ("pdf", "application/pdf", FileKind::Other),
    ("zip", "application/zip", FileKind::Other),
    ("gz", "application/gzip", FileKind::Other),
    ("tar", "application/x-tar", FileKind::Other),
];

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

fn lookup(path: &str) -> Option<&'static (&'static str, &'static str, FileKind)> {
    let ext = Path::new(path).extension()?.to_str()?;
    EXTENSIONS
        .iter()
        .find(|(known, _, _)| known.eq_ignore_ascii_case(ext))
}

/// Get MIME Content-Type based on the file extension of `path`
///
/// # Examples
/// ```
/// use rust_fileserver::http::mime::get_content_type;
/// assert_eq!(get_content_type("movies/a.MP4"), "video/mp4");
/// assert_eq!(get_content_type("README"), "application/octet-stream");
/// ```
pub fn get_content_type(path: &str) -> &'static str {
    lookup(path).map_or(DEFAULT_CONTENT_TYPE, |(_, content_type, _)| content_type)
}

/// Classify `path` for the listing and viewer pages
pub fn file_kind(path: &str) -> FileKind {
    lookup(path).map_or(FileKind::Other, |(_, _, kind)| *kind)
}
