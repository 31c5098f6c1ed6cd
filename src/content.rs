//! Content type resolution.
//!
//! A type is taken from, in order: the caller, the file extension, and
//! finally the payload's magic bytes. The reverse lookup turns a type back
//! into the extension used for generated filenames.

use std::path::Path;

/// Types whose preferred extension is not the first one `mime_guess` lists.
const PREFERRED_EXTENSIONS: &[(&str, &str)] = &[
    ("text/plain", "txt"),
    ("image/png", "png"),
    ("image/jpeg", "jpg"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
    ("video/mp4", "mp4"),
];

/// Resolve a MIME type. Returns an empty string when nothing matches.
pub fn resolve_type(explicit: Option<&str>, filename: &str, sniffed: Option<&[u8]>) -> String {
    if let Some(t) = explicit.map(str::trim).filter(|t| !t.is_empty()) {
        return t.to_string();
    }
    if let Some(t) = type_from_filename(filename) {
        return t;
    }
    sniffed
        .and_then(sniff)
        .map(str::to_string)
        .unwrap_or_default()
}

pub fn type_from_filename(filename: &str) -> Option<String> {
    let ext = Path::new(filename).extension()?.to_str()?;
    mime_guess::from_ext(ext).first().map(|m| m.essence_str().to_string())
}

/// Detect a type from the leading bytes of a payload.
pub fn sniff(bytes: &[u8]) -> Option<&'static str> {
    infer::get(bytes).map(|kind| kind.mime_type())
}

/// Extension (without the dot) for a MIME type.
pub fn extension_for(mime: &str) -> Option<&'static str> {
    let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    if essence.is_empty() {
        return None;
    }
    PREFERRED_EXTENSIONS
        .iter()
        .find(|(t, _)| *t == essence)
        .map(|(_, ext)| *ext)
        .or_else(|| {
            mime_guess::get_mime_extensions_str(&essence).and_then(|exts| exts.first().copied())
        })
}
