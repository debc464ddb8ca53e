//! Filesystem-safe slugs for route names

use unicode_normalization::UnicodeNormalization;

/// Longest slug produced, in characters
const MAX_SLUG_LEN: usize = 60;

/// Slug used when a name has no usable characters
const FALLBACK_SLUG: &str = "route";

/// Derives a lowercase, dash-separated slug from a route name.
///
/// Accented letters are folded to their ASCII base, every run of other
/// characters becomes a single `-`, and the result never starts or ends with
/// a separator.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_sep = false;

    for ch in name.nfkd().filter(char::is_ascii) {
        if ch.is_ascii_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('-');
            }
            pending_sep = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }

    slug.truncate(MAX_SLUG_LEN);
    let trimmed = slug.trim_end_matches('-');

    if trimmed.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        trimmed.to_string()
    }
}
