//! Path key normalization utilities.
//!
//! Two trees are compared by relative path, but the same logical file can be
//! spelled differently depending on where a tree lives:
//!
//! - macOS stores names decomposed (NFD), Windows and Linux usually composed (NFC)
//! - Windows is case-insensitive, so `Readme.md` and `README.md` are one file
//! - Windows separates components with `\`, everyone else with `/`
//!
//! [`path_key`] folds all of these into a single comparison key. The original
//! spelling is kept separately for display and for building real paths.
//!
//! # Example
//!
//! ```
//! use updir::scanner::path_utils::path_key;
//!
//! assert_eq!(path_key("Docs\\Café.TXT"), path_key("docs/cafe\u{0301}.txt"));
//! assert_eq!(path_key("Docs\\Café.TXT"), "docs/cafe.txt");
//! ```

use std::path::{Component, Path};

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Remove diacritics: decompose, drop combining marks, recompose.
///
/// # Example
///
/// ```
/// use updir::scanner::path_utils::strip_diacritics;
///
/// assert_eq!(strip_diacritics("résumé"), "resume");
/// assert_eq!(strip_diacritics("español"), "espanol");
/// ```
#[must_use]
pub fn strip_diacritics(s: &str) -> String {
    s.nfd().filter(|c| !is_combining_mark(*c)).nfc().collect()
}

/// Comparison key for a relative path.
///
/// Separators become `/`, diacritics are removed and the result is
/// lower-cased.
#[must_use]
pub fn path_key(relative: &str) -> String {
    strip_diacritics(&relative.replace('\\', "/")).to_lowercase()
}

/// Cache key for a directory root.
///
/// Same folding as [`path_key`], without a trailing separator so that
/// `/data/` and `/data` share one cache entry.
#[must_use]
pub fn directory_key(dir: &Path) -> String {
    let key = path_key(&dir.to_string_lossy());
    match key.trim_end_matches('/') {
        "" => key,
        trimmed => trimmed.to_string(),
    }
}

/// Render `path` relative to `root` with `/` separators.
///
/// Returns `None` when `path` is not under `root`.
#[must_use]
pub fn relative_path_string(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}
