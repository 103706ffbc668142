//! Query-text parameter extraction
//!
//! The query text is incidental: only the bracketed segment and quoted
//! items are significant, and extraction is intentionally permissive with
//! silent defaults. Callers should treat the typed `query_type` field as
//! authoritative.

/// Default percentile when the text carries none
pub const DEFAULT_PERCENTILE: f64 = 95.0;

/// Default k when the text carries none
pub const DEFAULT_K: i64 = 10;

/// Extract the percentile from `PERCENTILE(<number>)`
///
/// Falls back to [`DEFAULT_PERCENTILE`] when the marker, brackets, or
/// number are absent or unparsable.
pub fn extract_percentile(query: &str) -> f64 {
    if query.contains("PERCENTILE") {
        if let Some(inner) = between(query, '(', ')') {
            if let Ok(value) = inner.trim().parse::<f64>() {
                return value;
            }
        }
    }
    DEFAULT_PERCENTILE
}

/// Extract k from `TOP_K(<integer>)`, defaulting to [`DEFAULT_K`]
pub fn extract_k(query: &str) -> i64 {
    if query.contains("TOP_K") {
        if let Some(inner) = between(query, '(', ')') {
            if let Ok(value) = inner.trim().parse::<i64>() {
                return value;
            }
        }
    }
    DEFAULT_K
}

/// Extract the item between the first and last single quote
///
/// Used by `CONTAINS('<item>')` and `FREQUENCY('<item>')`; returns `None`
/// when no quoted item is present.
pub fn extract_quoted(query: &str) -> Option<&str> {
    let start = query.find('\'')? + 1;
    let end = query.rfind('\'')?;
    if end > start {
        Some(&query[start..end])
    } else {
        None
    }
}

// Substring strictly between the first `open` and the first `close` after it.
fn between(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)? + open.len_utf8();
    let end = text[start..].find(close)? + start;
    Some(&text[start..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_percentile() {
        assert_eq!(extract_percentile("PERCENTILE(99)"), 99.0);
        assert_eq!(extract_percentile("PERCENTILE(50.5) of cpu"), 50.5);
        assert_eq!(extract_percentile("PERCENTILE()"), DEFAULT_PERCENTILE);
        assert_eq!(extract_percentile("PERCENTILE(abc)"), DEFAULT_PERCENTILE);
        assert_eq!(extract_percentile("no marker"), DEFAULT_PERCENTILE);
        // Out-of-range values are extracted; validation happens downstream.
        assert_eq!(extract_percentile("PERCENTILE(150)"), 150.0);
    }

    #[test]
    fn test_extract_k() {
        assert_eq!(extract_k("TOP_K(5)"), 5);
        assert_eq!(extract_k("TOP_K(25) pods"), 25);
        assert_eq!(extract_k("TOP_K(x)"), DEFAULT_K);
        assert_eq!(extract_k("SELECT *"), DEFAULT_K);
        assert_eq!(extract_k("TOP_K(-3)"), -3);
    }

    #[test]
    fn test_extract_quoted() {
        assert_eq!(
            extract_quoted("CONTAINS('prod/default/pod-1/cpu_usage')"),
            Some("prod/default/pod-1/cpu_usage")
        );
        assert_eq!(extract_quoted("FREQUENCY('key')"), Some("key"));
        assert_eq!(extract_quoted("no quotes"), None);
        assert_eq!(extract_quoted("lone ' quote"), None);
        assert_eq!(extract_quoted("''"), None);
        // First-to-last: inner quotes are preserved.
        assert_eq!(extract_quoted("x 'a''b' y"), Some("a''b"));
    }
}
