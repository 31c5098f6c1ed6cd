use std::path::Path;

use rand::rngs::OsRng;
use rand::RngCore;

use crate::content;
use crate::error::UploadError;

/// Bytes of randomness in a generated name (hex encoded to twice as many chars).
pub const RANDOM_NAME_BYTES: usize = 12;

/// Extension used when neither the declared name nor the content type yield one.
pub const FALLBACK_EXTENSION: &str = "bin";

/// Choose the name a payload is stored under.
pub fn decide_filename(
    declared: &str,
    force_random: bool,
    resolved_type: &str,
) -> Result<String, UploadError> {
    let declared = declared.trim();
    if !force_random && !declared.is_empty() {
        return sanitize(declared).map(str::to_string);
    }

    // A declared name only contributes its extension here, so a name that
    // would be rejected above is simply ignored.
    let declared_ext = sanitize(declared).ok().and_then(extension_of);
    let ext = declared_ext
        .or_else(|| content::extension_for(resolved_type))
        .unwrap_or(FALLBACK_EXTENSION);

    Ok(format!("{}.{}", random_name()?, ext))
}

/// Strip everything up to the last path separator and reject names that
/// cannot live inside the storage directory.
pub fn sanitize(name: &str) -> Result<&str, UploadError> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    if base.is_empty() || base == "." || base == ".." {
        return Err(UploadError::InvalidFilename(name.to_string()));
    }
    if base.chars().any(char::is_control) {
        return Err(UploadError::InvalidFilename(name.escape_debug().to_string()));
    }
    Ok(base)
}

fn extension_of(name: &str) -> Option<&str> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
}

/// Hex encoded bytes from the OS random source.
pub fn random_name() -> Result<String, UploadError> {
    let mut bytes = [0u8; RANDOM_NAME_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(UploadError::FilenameGeneration)?;
    Ok(hex::encode(bytes))
}
