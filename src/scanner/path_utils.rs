//! Path flattening utilities.
//!
//! Recovered trees are nested arbitrarily deep with names the recovery tools
//! invented. Survivors are stored one level below their category directory,
//! so every root-relative path is turned into a single flat filename that
//! still encodes where the file came from.
//!
//! # Unicode
//!
//! Names are normalized to NFC before any character is replaced. macOS
//! stores names decomposed (NFD), so without this step `café` would flatten
//! to `cafe??` on one system and `caf?` on another:
//!
//! - NFC: `café.txt` - 'é' is U+00E9 (single code point)
//! - NFD: `café.txt` - 'e' U+0065 + combining acute accent U+0301
//!
//! # Example
//!
//! ```
//! use std::path::Path;
//! use tombraider::scanner::path_utils::{flat_name, sanitize};
//!
//! assert_eq!(sanitize("photos/my trip-2019/IMG 1.jpg"), "photos|my_trip_2019|IMG_1.jpg");
//! assert_eq!(
//!     flat_name(Path::new("/recup/dir 1/f.txt"), Path::new("/recup/")),
//!     "dir_1|f.txt"
//! );
//! ```

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

/// Maximum length of a flattened name.
///
/// Leaves room below the common 255-byte filename limit for `.N` collision
/// suffixes.
pub const FPATH_TRIM_LENGTH: usize = 240;

/// Joiner that replaces path separators in flattened names.
pub const SEPARATOR_JOINER: char = '|';

/// Placeholder for any character outside the allowed set.
pub const PLACEHOLDER: char = '?';

/// Normalize a path string to NFC, borrowing when it already is.
#[must_use]
pub fn normalize_path_str_cow(s: &str) -> Cow<'_, str> {
    if unicode_normalization::is_nfc(s) {
        Cow::Borrowed(s)
    } else {
        Cow::Owned(s.nfc().collect())
    }
}

/// Strip `root` from the front of `path`.
///
/// Comparison is per component, so `root` with or without a trailing
/// separator gives the same result and no doubled separator can appear.
/// A path that does not live under `root` is returned unchanged.
#[must_use]
pub fn localize(path: &Path, root: &Path) -> PathBuf {
    match path.strip_prefix(root) {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => path.to_path_buf(),
    }
}

/// Flatten a relative path into a single safe filename.
///
/// Applied in order:
/// 1. hyphens and whitespace become `_`
/// 2. path separators become `|`
/// 3. anything outside `[A-Za-z0-9._|]` becomes `?`
/// 4. the result is cut to [`FPATH_TRIM_LENGTH`] characters
///
/// An empty result, `.` or `..` would not name a file of its own and is
/// replaced by `_`. The transform is idempotent and the output never
/// contains a path separator.
#[must_use]
pub fn sanitize(relative: &str) -> String {
    let normalized = normalize_path_str_cow(relative);

    let mut out: String = normalized
        .chars()
        .map(|c| {
            if c == '-' || c.is_whitespace() {
                '_'
            } else if std::path::is_separator(c) {
                SEPARATOR_JOINER
            } else if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == SEPARATOR_JOINER {
                c
            } else {
                PLACEHOLDER
            }
        })
        .take(FPATH_TRIM_LENGTH)
        .collect();

    if out.is_empty() || out == "." || out == ".." {
        out = "_".to_string();
    }
    out
}

/// Flattened name of `path` relative to `root`.
///
/// Non-UTF-8 bytes are replaced lossily and end up as `?`.
#[must_use]
pub fn flat_name(path: &Path, root: &Path) -> String {
    let rel = localize(path, root);
    sanitize(&rel.to_string_lossy())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_replaces_hyphen_and_whitespace() {
        assert_eq!(sanitize("a-b c\td"), "a_b_c_d");
    }

    #[test]
    fn test_sanitize_joins_separators() {
        assert_eq!(sanitize("a/b/c.txt"), "a|b|c.txt");
    }

    #[test]
    fn test_sanitize_placeholders() {
        assert_eq!(sanitize("f(1)[x]&.txt"), "f?1??x??.txt");
        assert_eq!(sanitize("back\\slash"), "back?slash");
    }

    #[test]
    fn test_sanitize_nfd_matches_nfc() {
        let nfc = "caf\u{00e9}.txt";
        let nfd = "cafe\u{0301}.txt";
        assert_eq!(sanitize(nfc), sanitize(nfd));
        assert_eq!(sanitize(nfc), "caf?.txt");
    }

    #[test]
    fn test_sanitize_truncates() {
        let long = "x".repeat(500);
        let out = sanitize(&long);
        assert_eq!(out.len(), FPATH_TRIM_LENGTH);
    }

    #[test]
    fn test_sanitize_truncates_by_characters() {
        let long = "\u{00e9}".repeat(300);
        let out = sanitize(&long);
        assert_eq!(out.chars().count(), FPATH_TRIM_LENGTH);
        assert!(out.chars().all(|c| c == '?'));
    }

    #[test]
    fn test_sanitize_degenerate_names() {
        assert_eq!(sanitize(""), "_");
        assert_eq!(sanitize("."), "_");
        assert_eq!(sanitize(".."), "_");
        assert_eq!(sanitize("..."), "...");
    }

    #[test]
    fn test_sanitize_idempotent_examples() {
        for input in ["a/b c-d", "\u{00fc}ber/\u{00df}", "recup_dir.1/f123.jpg", "..", "|?|"] {
            let once = sanitize(input);
            assert_eq!(sanitize(&once), once, "input {input:?}");
        }
    }

    #[test]
    fn test_localize_trailing_slash_forms() {
        let path = Path::new("/usr/share/bin/script");
        assert_eq!(localize(path, Path::new("/usr/share/bin")), PathBuf::from("script"));
        assert_eq!(localize(path, Path::new("/usr/share/bin/")), PathBuf::from("script"));
    }

    #[test]
    fn test_localize_nested() {
        let path = Path::new("/r/a/b/c.txt");
        assert_eq!(localize(path, Path::new("/r")), PathBuf::from("a/b/c.txt"));
    }

    #[test]
    fn test_localize_outside_root_unchanged() {
        let path = Path::new("/other/file");
        assert_eq!(localize(path, Path::new("/r")), PathBuf::from("/other/file"));
    }

    #[test]
    fn test_localize_component_boundary() {
        // "/rx" is not under "/r"
        let path = Path::new("/rx/file");
        assert_eq!(localize(path, Path::new("/r")), PathBuf::from("/rx/file"));
    }

    #[test]
    fn test_flat_name() {
        assert_eq!(
            flat_name(Path::new("/recup/recup_dir.1/f0001.jpg"), Path::new("/recup")),
            "recup_dir.1|f0001.jpg"
        );
    }

    #[test]
    fn test_normalize_path_str_cow() {
        assert!(matches!(normalize_path_str_cow("plain.txt"), Cow::Borrowed(_)));
        assert!(matches!(normalize_path_str_cow("cafe\u{0301}"), Cow::Owned(_)));
    }
}
