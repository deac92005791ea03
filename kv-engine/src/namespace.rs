//! # Namespace Flattening
//!
//! Purpose: Every entry lives under one flattened internal key so the LRU
//! index never needs to know namespaces exist. Namespace and key are
//! joined with a single `:`, and parsing splits on the *first* `:` only.
//! A key that itself contains `:` is not guarded against — that collision
//! is left unguarded, not fixed here.

/// Label used to bucket stats for entries with no namespace.
pub const DEFAULT_NAMESPACE_LABEL: &str = "default";

/// Builds the internal flattened key for a (namespace, key) pair.
pub fn flatten(namespace: Option<&str>, key: &str) -> String {
    match namespace {
        Some(ns) if !ns.is_empty() => format!("{ns}:{key}"),
        _ => key.to_string(),
    }
}

/// Splits a flattened key back into (namespace, key), using the first `:`
/// as the delimiter. Keys with no `:` have no namespace.
pub fn parse(full_key: &str) -> (Option<&str>, &str) {
    match full_key.split_once(':') {
        Some((ns, key)) => (Some(ns), key),
        None => (None, full_key),
    }
}

/// Returns the label used to bucket a namespace in stats output.
pub fn label(namespace: Option<&str>) -> &str {
    namespace.unwrap_or(DEFAULT_NAMESPACE_LABEL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_with_namespace() {
        assert_eq!(flatten(Some("tenant-a"), "user:42"), "tenant-a:user:42");
    }

    #[test]
    fn flattens_without_namespace() {
        assert_eq!(flatten(None, "user:42"), "user:42");
    }

    #[test]
    fn parses_on_first_colon_only() {
        assert_eq!(parse("tenant-a:user:42"), (Some("tenant-a"), "user:42"));
    }

    #[test]
    fn parses_bare_key() {
        assert_eq!(parse("standalone"), (None, "standalone"));
    }

    #[test]
    fn default_label_for_absent_namespace() {
        assert_eq!(label(None), "default");
        assert_eq!(label(Some("tenant-a")), "tenant-a");
    }
}
