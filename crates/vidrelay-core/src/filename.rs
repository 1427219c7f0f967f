//! Destination filename derivation for relayed uploads.

use percent_encoding::percent_decode_str;
use url::Url;

/// Extension every stored object ends with.
pub const VIDEO_EXTENSION: &str = ".mp4";

/// Stem used when neither the custom name nor the URL yields one.
const FALLBACK_STEM: &str = "video";

/// Derive the destination object name for an upload.
///
/// A non-blank `custom_name` wins (trimmed). Otherwise the last path segment of
/// `source_url` is used with any query string or fragment stripped. In both cases
/// the video extension is appended unless the name already carries it, so
/// deriving from an already-derived name is a no-op.
pub fn derive_filename(source_url: &str, custom_name: Option<&str>) -> String {
    let base = match custom_name.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => name.to_string(),
        None => last_path_segment(source_url),
    };

    ensure_video_extension(&flatten_separators(base.trim()))
}

/// Append [`VIDEO_EXTENSION`] unless `name` already ends with it (ASCII case-insensitive).
pub fn ensure_video_extension(name: &str) -> String {
    let name = if name.is_empty() { FALLBACK_STEM } else { name };
    if has_video_extension(name) {
        name.to_string()
    } else {
        format!("{}{}", name, VIDEO_EXTENSION)
    }
}

fn has_video_extension(name: &str) -> bool {
    name.len() >= VIDEO_EXTENSION.len()
        && name.is_char_boundary(name.len() - VIDEO_EXTENSION.len())
        && name[name.len() - VIDEO_EXTENSION.len()..].eq_ignore_ascii_case(VIDEO_EXTENSION)
}

/// Last path segment of `source`, without query string or fragment.
///
/// Absolute URLs are parsed so the host never stands in for an empty path, and
/// the segment is percent-decoded. Anything else is split on `/` as written.
pub fn last_path_segment(source: &str) -> String {
    match Url::parse(source) {
        Ok(url) if !url.cannot_be_a_base() => url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .map(|segment| percent_decode_str(segment).decode_utf8_lossy().into_owned())
            .unwrap_or_default(),
        _ => source
            .split(['?', '#'])
            .next()
            .and_then(|path| path.rsplit('/').next())
            .unwrap_or("")
            .to_string(),
    }
}

// Object keys are flat; a custom name must not introduce a directory or a dot-prefixed name.
fn flatten_separators(name: &str) -> String {
    name.replace(['/', '\\'], "_")
        .trim_start_matches('.')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derives_from_last_path_segment() {
        assert_eq!(derive_filename("https://src/a.mp4", None), "a.mp4");
        assert_eq!(
            derive_filename("https://cdn.example.com/videos/clip", None),
            "clip.mp4"
        );
    }

    #[test]
    fn test_strips_query_and_fragment() {
        assert_eq!(
            derive_filename("https://src/path/movie.mp4?token=abc&x=1", None),
            "movie.mp4"
        );
        assert_eq!(derive_filename("https://src/movie#t=10", None), "movie.mp4");
    }

    #[test]
    fn test_custom_name_overrides_url() {
        assert_eq!(
            derive_filename("https://src/a.mp4", Some("  Holiday 2024  ")),
            "Holiday 2024.mp4"
        );
    }

    #[test]
    fn test_blank_custom_name_is_ignored() {
        assert_eq!(derive_filename("https://src/a.mp4", Some("   ")), "a.mp4");
        assert_eq!(derive_filename("https://src/a.mp4", Some("")), "a.mp4");
    }

    #[test]
    fn test_extension_is_not_duplicated() {
        assert_eq!(ensure_video_extension("movie.mp4"), "movie.mp4");
        assert_eq!(ensure_video_extension("MOVIE.MP4"), "MOVIE.MP4");
        assert_eq!(ensure_video_extension("movie.mkv"), "movie.mkv.mp4");
    }

    #[test]
    fn test_derivation_is_idempotent() {
        let cases = [
            ("https://src/a.mp4", None),
            ("https://src/dir/b?x=1", None),
            ("https://src/", None),
            ("https://src/c.mp4", Some("custom")),
            ("https://src/c.mp4", Some("nested/name")),
        ];
        for (url, custom) in cases {
            let first = derive_filename(url, custom);
            assert_eq!(derive_filename(url, custom), first);
            assert_eq!(derive_filename(&first, None), first);
            assert_eq!(derive_filename(url, Some(&first)), first);
        }
    }

    #[test]
    fn test_empty_segment_falls_back_to_stem() {
        assert_eq!(derive_filename("https://src/", None), "video.mp4");
        assert_eq!(derive_filename("https://cdn.example.com", None), "video.mp4");
        assert_eq!(derive_filename("https://src/videos/", None), "video.mp4");
        assert_eq!(derive_filename("", None), "video.mp4");
        assert_eq!(derive_filename("?only=query", None), "video.mp4");
        assert_eq!(derive_filename("https://src/..", None), "video.mp4");
    }

    #[test]
    fn test_url_segment_is_decoded() {
        assert_eq!(
            derive_filename("https://cdn.example.com/my%20clip.mp4", None),
            "my clip.mp4"
        );
        assert_eq!(last_path_segment("clips/raw?x=1"), "raw");
    }

    #[test]
    fn test_custom_name_cannot_introduce_directories() {
        assert_eq!(
            derive_filename("https://src/a.mp4", Some("../etc/passwd")),
            "_etc_passwd.mp4"
        );
    }

    #[test]
    fn test_multibyte_names_do_not_panic() {
        assert_eq!(derive_filename("https://src/ビデオ", None), "ビデオ.mp4");
        assert_eq!(ensure_video_extension("é"), "é.mp4");
    }
}
