//! Search input sanitizing for user listings.
//!
//! Free-text queries end up inside a `LIKE` pattern. Anything that looks like
//! an injection attempt is rejected outright; the remaining input has its
//! wildcard characters escaped so it always matches literally.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::constants::MAX_SEARCH_LENGTH;
use crate::error::{DomainError, DomainResult};

/// Escape character used in generated `LIKE` patterns.
pub const LIKE_ESCAPE: char = '\\';

static UNSAFE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // statement separators and comments
        r";|--|/\*|\*/",
        // boolean tautologies: `x OR 1=1`, `' or 'a'='a`
        r"(?i)\b(or|and)\b\s+[^\s=]+\s*=\s*\S+",
        // statement keywords
        r"(?i)\b(union\s+(all\s+)?select|drop\s+(table|database)|insert\s+into|delete\s+from|update\s+\w+\s+set|truncate\s+table|alter\s+table|exec(ute)?\s*\()",
        // markup
        r"[<>]",
        // control characters
        r"[\x00-\x08\x0b\x0c\x0e-\x1f]",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("search pattern must compile"))
    .collect()
});

/// Validate a raw search string and return it escaped for a `LIKE` pattern.
///
/// Returns `Ok(None)` for blank input, which means "no filter".
pub fn sanitize_search_query(raw: &str) -> DomainResult<Option<String>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    if trimmed.chars().count() > MAX_SEARCH_LENGTH {
        return Err(DomainError::validation(format!(
            "Search query must be at most {} characters",
            MAX_SEARCH_LENGTH
        )));
    }

    if UNSAFE_PATTERNS.iter().any(|re| re.is_match(trimmed)) {
        return Err(DomainError::validation("Search query contains unsupported characters or keywords"));
    }

    Ok(Some(escape_like(trimmed)))
}

/// Escape `LIKE` wildcards (`%`, `_`) and the escape character itself.
pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if c == '%' || c == '_' || c == LIKE_ESCAPE {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}
