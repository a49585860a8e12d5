//! Content classification: text sniffing, MIME resolution and
//! `Content-Disposition` policy.
//!
//! Declared content types come from the client and are only trusted when
//! they are on an allow-list; in particular a declared `text/html` is never
//! honored.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::io::{self, SeekFrom};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};

/// Number of leading bytes inspected by [`probably_text`].
pub const TEXT_SNIFF_BYTES: usize = 1024;

pub const MIME_GENERIC_TEXT: &str = "text/plain";
pub const MIME_GENERIC_BINARY: &str = "application/octet-stream";

/// MIME types which may be presented as detected.
const MIME_ALLOWLIST: [&str; 8] = [
    "application/javascript",
    "application/json",
    "application/pdf",
    "application/x-ruby",
    "text/css",
    "text/plain",
    "text/x-python",
    "text/x-sh",
];
const MIME_PREFIX_ALLOWLIST: [&str; 3] = ["audio/", "image/", "video/"];

/// MIME types browsers may render inline.
const INLINE_MIME_ALLOWLIST: [&str; 1] = ["application/pdf"];
const INLINE_MIME_PREFIX_ALLOWLIST: [&str; 3] = ["audio/", "image/", "video/"];

/// Image types the upload details page previews.
const IMAGE_MIME_ALLOWLIST: [&str; 6] = [
    "image/gif",
    "image/jpeg",
    "image/png",
    "image/svg+xml",
    "image/tiff",
    "image/webp",
];

/// RFC 5987 `attr-char`; everything else is percent-encoded.
const RFC5987_ATTR_CHAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

/// Roughly libmagic's notion of a text byte: BEL..CR, printable ASCII, and
/// anything with the high bit set (UTF-8, Latin-1).
fn is_text_byte(b: u8) -> bool {
    matches!(b, 7..=13 | 0x20..=0x7e | 0x80..=0xff)
}

async fn read_prefix<R>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Whether the first KiB of `reader` (from its current position) looks like
/// text. Empty content is text. The read position is restored before
/// returning, also when reading fails.
pub async fn probably_text<R>(reader: &mut R) -> io::Result<bool>
where
    R: AsyncRead + AsyncSeek + Unpin + ?Sized,
{
    let start = reader.stream_position().await?;
    let mut buf = [0u8; TEXT_SNIFF_BYTES];
    let read = read_prefix(reader, &mut buf).await;
    reader.seek(SeekFrom::Start(start)).await?;
    let n = read?;
    Ok(buf[..n].iter().copied().all(is_text_byte))
}

/// `type/subtype` of a content type, lower-cased and without parameters.
fn mime_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

pub fn is_allowed_mime_type(mime_type: &str) -> bool {
    let essence = mime_essence(mime_type);
    MIME_ALLOWLIST.contains(&essence.as_str())
        || MIME_PREFIX_ALLOWLIST
            .iter()
            .any(|prefix| essence.starts_with(prefix))
}

pub fn is_inline_mime_type(mime_type: &str) -> bool {
    let essence = mime_essence(mime_type);
    INLINE_MIME_ALLOWLIST.contains(&essence.as_str())
        || INLINE_MIME_PREFIX_ALLOWLIST
            .iter()
            .any(|prefix| essence.starts_with(prefix))
}

pub fn is_image_mime_type(mime_type: &str) -> bool {
    IMAGE_MIME_ALLOWLIST.contains(&mime_essence(mime_type).as_str())
}

/// Resolve the MIME type an upload is served with.
///
/// Precedence: the declared type when it is specific and allow-listed, then
/// the type guessed from the file extension when allow-listed, then generic
/// text or binary depending on `probably_text`.
pub fn determine_mime_type(
    filename: &str,
    declared_content_type: &str,
    probably_text: bool,
) -> String {
    let declared = mime_essence(declared_content_type);
    if !declared.is_empty()
        && declared != MIME_GENERIC_BINARY
        && declared != MIME_GENERIC_TEXT
        && is_allowed_mime_type(&declared)
    {
        return declared;
    }

    if let Some(guess) = mime_guess::from_path(filename).first_raw() {
        if is_allowed_mime_type(guess) {
            return guess.to_string();
        }
    }

    if probably_text {
        MIME_GENERIC_TEXT.to_string()
    } else {
        MIME_GENERIC_BINARY.to_string()
    }
}

/// Build the `Content-Disposition` value for an upload.
///
/// Text and inline-safe media render inline; everything else downloads.
/// The plain `filename` parameter keeps printable ASCII only, minus quotes
/// and backslashes; `filename*` carries the full UTF-8 name.
pub fn determine_content_disposition(
    filename: &str,
    mime_type: &str,
    probably_text: bool,
) -> String {
    let render_type = if probably_text || is_inline_mime_type(mime_type) {
        "inline"
    } else {
        "attachment"
    };

    let ascii_name: String = filename
        .chars()
        .filter(|c| (c.is_ascii_graphic() || *c == ' ') && !matches!(c, '"' | '\\'))
        .collect();
    let encoded = utf8_percent_encode(filename, RFC5987_ATTR_CHAR);

    format!(
        "{}; filename=\"{}\"; filename*=utf-8''{}",
        render_type, ascii_name, encoded
    )
}
