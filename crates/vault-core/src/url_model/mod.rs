//! URL modeling and filename derivation.
//!
//! Derives the `filename` attribute for an HTTP-backed `Item` (spec.md:86):
//! prefer the RFC 6266 `Content-Disposition` header, falling back to the last
//! path segment of the URL. This is metadata only, not a local save path, so
//! no filesystem sanitization is performed here.

mod content_disposition;
mod path;

pub use content_disposition::parse_content_disposition_filename;
pub use path::filename_from_url_path;

/// Derives the `filename` attribute for a URL-backed item.
///
/// Returns `None` if neither the `Content-Disposition` header nor the URL
/// path yields a usable name (e.g. a bare origin URL with no header).
pub fn derive_filename(url: &str, content_disposition: Option<&str>) -> Option<String> {
    content_disposition
        .and_then(parse_content_disposition_filename)
        .filter(|s| !s.is_empty())
        .or_else(|| filename_from_url_path(url))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_filename_from_url_path() {
        assert_eq!(
            derive_filename("https://example.com/archive.zip", None).as_deref(),
            Some("archive.zip")
        );
        assert_eq!(
            derive_filename("https://cdn.example.com/path/to/debian-12.iso", None).as_deref(),
            Some("debian-12.iso")
        );
    }

    #[test]
    fn derive_filename_from_content_disposition() {
        assert_eq!(
            derive_filename(
                "https://example.com/",
                Some("attachment; filename=\"report.pdf\"")
            )
            .as_deref(),
            Some("report.pdf")
        );
        assert_eq!(
            derive_filename(
                "https://example.com/x",
                Some("attachment; filename=simple.bin")
            )
            .as_deref(),
            Some("simple.bin")
        );
    }

    #[test]
    fn derive_filename_content_disposition_overrides_url() {
        assert_eq!(
            derive_filename(
                "https://example.com/archive.zip",
                Some("attachment; filename=\"real-name.tar.gz\"")
            )
            .as_deref(),
            Some("real-name.tar.gz")
        );
    }

    #[test]
    fn derive_filename_empty_url_path_fallback() {
        assert_eq!(derive_filename("https://example.com/", None), None);
        assert_eq!(derive_filename("https://example.com", None), None);
    }
}
