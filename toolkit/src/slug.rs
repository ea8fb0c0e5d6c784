//! ASCII slug normalization.

use crate::errors::{Error, Result};

/// Converts `text` into a lowercase, hyphen-separated slug.
///
/// Every run of characters outside `[a-z0-9]` (after lowercasing) collapses into a single
/// hyphen, and leading/trailing hyphens are dropped. Non-ASCII letters count as separators;
/// nothing is transliterated.
pub fn slugify(text: &str) -> Result<String> {
    if text.is_empty() {
        return Err(Error::InvalidInput {
            message: "empty string not permitted".to_string(),
        });
    }

    let mut slug = String::with_capacity(text.len());
    let mut pending_separator = false;

    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(c);
        } else {
            pending_separator = true;
        }
    }

    if slug.is_empty() {
        return Err(Error::EmptyResult);
    }

    Ok(slug)
}
