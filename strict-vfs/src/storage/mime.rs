//! Content-type detection: magic bytes first, then the file extension, then a text check.
use std::ffi::OsStr;
use std::path::Path;

/// How many leading bytes `detect` looks at.
pub const SNIFF_LEN: usize = 512;

const OCTET_STREAM: &str = "application/octet-stream";

const MAGIC: &[(&[u8], &str)] = &[
    (b"\x89PNG\r\n\x1a\n", "image/png"),
    (b"\xff\xd8\xff", "image/jpeg"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"%PDF-", "application/pdf"),
    (b"PK\x03\x04", "application/zip"),
    (b"\x1f\x8b", "application/gzip"),
    (b"BM", "image/bmp"),
    (b"\x00asm", "application/wasm"),
    (b"\x7fELF", "application/x-elf"),
    (b"OggS", "audio/ogg"),
    (b"fLaC", "audio/flac"),
    (b"ID3", "audio/mpeg"),
    (b"-----BEGIN CERTIFICATE-----", "application/x-pem-file"),
];

const EXTENSIONS: &[(&str, &str)] = &[
    ("txt", "text/plain"),
    ("md", "text/markdown"),
    ("csv", "text/csv"),
    ("html", "text/html"),
    ("htm", "text/html"),
    ("css", "text/css"),
    ("js", "text/javascript"),
    ("json", "application/json"),
    ("xml", "application/xml"),
    ("svg", "image/svg+xml"),
    ("toml", "application/toml"),
    ("yaml", "application/yaml"),
    ("yml", "application/yaml"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("pdf", "application/pdf"),
    ("zip", "application/zip"),
    ("gz", "application/gzip"),
    ("tar", "application/x-tar"),
    ("wasm", "application/wasm"),
    ("mp3", "audio/mpeg"),
    ("ogg", "audio/ogg"),
    ("mp4", "video/mp4"),
    ("pem", "application/x-pem-file"),
    ("crt", "application/x-x509-ca-cert"),
];

/// Best-effort MIME type of `head` (the first bytes of the content), falling back on the
/// extension of `name`.
pub fn detect(head: &[u8], name: Option<&OsStr>) -> &'static str {
    if head.is_empty() {
        return by_extension(name).unwrap_or("application/x-empty");
    }
    if let Some((_, mime)) = MAGIC.iter().find(|(magic, _)| head.starts_with(magic)) {
        return *mime;
    }
    if head.starts_with(b"RIFF") && head.get(8..12) == Some(&b"WEBP"[..]) {
        return "image/webp";
    }
    if let Some(mime) = by_extension(name) {
        return mime;
    }
    if looks_like_text(head) {
        "text/plain"
    } else {
        OCTET_STREAM
    }
}

fn by_extension(name: Option<&OsStr>) -> Option<&'static str> {
    let ext = Path::new(name?).extension()?.to_str()?;
    EXTENSIONS
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(ext))
        .map(|(_, mime)| *mime)
}

// The head may cut a multi-byte sequence in half; only an error before the last 3 bytes counts.
fn looks_like_text(head: &[u8]) -> bool {
    match std::str::from_utf8(head) {
        Ok(text) => !text.contains('\0'),
        Err(err) => err.error_len().is_none() && head.len() - err.valid_up_to() < 4,
    }
}
