//! Upload rules for image and document content
//!
//! Validation happens before any store call: extension allow-list per content
//! type, then the size ceiling. Stored objects are keyed
//! `{short_code}_{filename}` in the `content` bucket.

use thiserror::Error;

use crate::model::ContentKind;

/// Largest accepted upload
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];
pub const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "docx"];

#[derive(Debug, Error, PartialEq)]
pub enum UploadError {
    #[error("Please upload a file!")]
    Missing,

    #[error("Invalid file! Use {} for {kind} content.", .allowed.join(", "))]
    Extension {
        kind: ContentKind,
        allowed: &'static [&'static str],
    },

    #[error("File too large! Maximum is 10MB.")]
    TooLarge,
}

pub fn allowed_extensions(kind: ContentKind) -> &'static [&'static str] {
    match kind {
        ContentKind::Image => IMAGE_EXTENSIONS,
        ContentKind::Document => DOCUMENT_EXTENSIONS,
        ContentKind::Url | ContentKind::Text => &[],
    }
}

/// Lowercased text after the last dot, empty when there is none
pub fn extension(filename: &str) -> String {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

pub fn mime_for(filename: &str) -> &'static str {
    match extension(filename).as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "pdf" => "application/pdf",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}

/// Checks a submitted file against the rules for `kind`
pub fn validate(kind: ContentKind, filename: &str, size: usize) -> Result<(), UploadError> {
    if filename.is_empty() {
        return Err(UploadError::Missing);
    }
    let allowed = allowed_extensions(kind);
    if !allowed.contains(&extension(filename).as_str()) {
        return Err(UploadError::Extension { kind, allowed });
    }
    if size > MAX_UPLOAD_BYTES {
        return Err(UploadError::TooLarge);
    }
    Ok(())
}

/// Reduces a client-supplied filename to a safe ASCII name
///
/// Whitespace becomes `_`, anything outside `[A-Za-z0-9._-]` is dropped, and
/// leading or trailing dots and underscores are trimmed so the result can
/// never address a parent directory.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(*c, '.' | '_' | '-'))
        .collect();
    let trimmed = cleaned.trim_matches(|c: char| c == '.' || c == '_');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn object_key(short_code: &str, filename: &str) -> String {
    format!("{short_code}_{}", sanitize_filename(filename))
}

/// Recovers the original filename from a stored object key
///
/// Strips the `{short_code}_` prefix. Renaming a link moves its object, so
/// the prefix matches for every key this crate writes; keys from elsewhere
/// fall back to splitting at the first `_`.
pub fn original_filename(key: &str, short_code: &str) -> String {
    let prefix = format!("{short_code}_");
    let name = match key.strip_prefix(prefix.as_str()) {
        Some(rest) => rest,
        None => key.split_once('_').map_or(key, |(_, rest)| rest),
    };
    let name = match name.rsplit_once('.') {
        Some((stem, ext)) => format!("{}.{ext}", stem.trim_end_matches('_')),
        None => name.trim_end_matches('_').to_string(),
    };
    sanitize_filename(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_allow_list_per_kind() {
        assert!(validate(ContentKind::Image, "cat.PNG", 10).is_ok());
        assert!(validate(ContentKind::Document, "cv.docx", 10).is_ok());
        assert_eq!(
            validate(ContentKind::Image, "cv.pdf", 10),
            Err(UploadError::Extension { kind: ContentKind::Image, allowed: IMAGE_EXTENSIONS })
        );
        assert!(validate(ContentKind::Document, "photo.jpg", 10).is_err());
        assert!(validate(ContentKind::Image, "noextension", 10).is_err());
    }

    #[test]
    fn test_size_ceiling() {
        assert!(validate(ContentKind::Image, "a.png", MAX_UPLOAD_BYTES).is_ok());
        assert_eq!(
            validate(ContentKind::Image, "a.png", MAX_UPLOAD_BYTES + 1),
            Err(UploadError::TooLarge)
        );
    }

    #[test]
    fn test_extension_error_lists_allowed() {
        let err = validate(ContentKind::Document, "x.exe", 1).unwrap_err();
        assert_eq!(err.to_string(), "Invalid file! Use pdf, docx for document content.");
    }

    #[test]
    fn test_mime_guess() {
        assert_eq!(mime_for("a.JPEG"), "image/jpeg");
        assert_eq!(mime_for("a.pdf"), "application/pdf");
        assert_eq!(mime_for("a.bin"), "application/octet-stream");
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("my report v2.pdf"), "my_report_v2.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("..\\win.ini"), "win.ini");
        assert_eq!(sanitize_filename("résumé.pdf"), "rsum.pdf");
        assert_eq!(sanitize_filename("..."), "file");
    }

    #[test]
    fn test_original_filename_strips_code_prefix() {
        let key = object_key("my_code", "Annual Report.pdf");
        assert_eq!(key, "my_code_Annual_Report.pdf");
        assert_eq!(original_filename(&key, "my_code"), "Annual_Report.pdf");
        assert_eq!(original_filename("abc123_photo_.png", "abc123"), "photo.png");
        assert_eq!(original_filename("old123_photo.png", "renamed"), "photo.png");
    }
}
