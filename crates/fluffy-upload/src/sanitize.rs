//! Upload name sanitization.
//!
//! The storage key of an upload is never derived from the user's file name:
//! it is a random ID plus the name's "human" extension. The name is only
//! consulted after every path component has been stripped.

use crate::error::UploadError;
use rand::Rng;
use std::collections::BTreeSet;
use std::fmt;

/// Length of a generated unique ID.
pub const UNIQUE_ID_LENGTH: usize = 32;

/// Characters a unique ID is drawn from. Vowels and look-alike characters are
/// left out so IDs are hard to misread and never spell words.
pub const UNIQUE_ID_ALPHABET: &[u8] = b"bcdfghjklmnpqrstvwxzBCDFGHJKLMNPQRSTVWXZ0123456789";

/// Extensions that conventionally wrap another extension (`.tar.gz`).
const WRAPPER_EXTENSIONS: [&str; 4] = ["bz2", "gz", "xz", "zst"];

/// Random ID for use as (the start of) an object key.
pub fn generate_unique_id() -> String {
    let mut rng = rand::rng();
    (0..UNIQUE_ID_LENGTH)
        .map(|_| UNIQUE_ID_ALPHABET[rng.random_range(0..UNIQUE_ID_ALPHABET.len())] as char)
        .collect()
}

/// Everything after the last `/` or `\`.
pub fn base_name(name: &str) -> &str {
    match name.rfind(['/', '\\']) {
        Some(idx) => &name[idx + 1..],
        None => name,
    }
}

fn is_wrapper_extension(ext: &str) -> bool {
    WRAPPER_EXTENSIONS
        .iter()
        .any(|wrapper| wrapper.eq_ignore_ascii_case(ext))
}

/// The extension a human would name for `name`.
///
/// Extensions are peeled off right to left; peeling continues through
/// wrapper extensions and stops after the first other one, so `file.tar.gz`
/// yields `.tar.gz`. Empty extensions (repeated dots) are skipped. Returns an
/// empty string when there is no extension.
///
/// Not suitable for validation.
pub fn human_file_extension(name: &str) -> String {
    let mut rest = name;
    let mut extension = String::new();
    while let Some(dot) = rest.rfind('.') {
        let ext = &rest[dot..];
        rest = &rest[..dot];
        if ext == "." {
            continue;
        }
        extension.insert_str(0, ext);
        if !is_wrapper_extension(&ext[1..]) {
            break;
        }
    }
    extension
}

/// Whether `base` carries any forbidden extension.
///
/// Each component of the human extension is checked, and so is every
/// forbidden entry as a `.entry` suffix or `.entry.` infix of the whole
/// name, which also covers entries that contain dots themselves.
fn has_forbidden_extension(base: &str, forbidden: &BTreeSet<String>) -> bool {
    if forbidden.is_empty() {
        return false;
    }
    let lower = base.to_lowercase();

    let component_match = human_file_extension(&lower)
        .split('.')
        .filter(|component| !component.is_empty())
        .any(|component| {
            forbidden
                .iter()
                .any(|entry| entry.to_lowercase() == component)
        });
    if component_match {
        return true;
    }

    forbidden.iter().any(|entry| {
        let entry = entry.to_lowercase();
        lower.ends_with(&format!(".{}", entry)) || lower.contains(&format!(".{}.", entry))
    })
}

/// A storage key split into its random part and its human extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedKey {
    pub unique_id: String,
    pub extension: String,
}

impl SanitizedKey {
    pub fn key(&self) -> String {
        format!("{}{}", self.unique_id, self.extension)
    }
}

impl fmt::Display for SanitizedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.unique_id, self.extension)
    }
}

/// Turn a user-supplied file name into a unique storage key.
///
/// Fails with [`UploadError::ForbiddenExtension`] when the name carries any
/// forbidden extension, wrapped or not.
pub fn sanitize_upload_name(
    name: &str,
    forbidden_extensions: &BTreeSet<String>,
) -> Result<SanitizedKey, UploadError> {
    let base = base_name(name);
    if has_forbidden_extension(base, forbidden_extensions) {
        return Err(UploadError::ForbiddenExtension {
            name: name.to_string(),
        });
    }

    Ok(SanitizedKey {
        unique_id: generate_unique_id(),
        extension: human_file_extension(base),
    })
}
