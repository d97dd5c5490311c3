//! Result summary and bookmark types

use crate::value::Value;
use std::collections::HashMap;

/// Opaque token representing a causal point in server-side state.
///
/// Threading a bookmark from one committed transaction into the next
/// session's BEGIN gives causal ordering across sessions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Bookmark(String);

impl Bookmark {
    /// Wrap a raw bookmark token
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<Bookmark> for String {
    fn from(b: Bookmark) -> Self {
        b.0
    }
}

impl std::fmt::Display for Bookmark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Terminal metadata delivered once a result stream is fully consumed.
#[derive(Debug, Clone, Default)]
pub struct Summary {
    /// Update counters reported under `stats` (nodes created, properties
    /// set, ...), as integer counts keyed by the server's own names
    pub counters: HashMap<String, i64>,
    /// Bookmark for causal chaining, present on auto-commit summaries
    pub bookmark: Option<Bookmark>,
    /// Query type reported by the server ("r", "w", "rw", "s")
    pub query_type: Option<String>,
    /// Remaining raw metadata, untouched
    pub metadata: HashMap<String, Value>,
}

impl Summary {
    /// Build a summary from the final SUCCESS metadata of a result stream.
    pub fn from_metadata(mut meta: HashMap<String, Value>) -> Self {
        let mut counters = HashMap::new();
        if let Some(Value::Map(stats)) = meta.remove("stats") {
            for (name, value) in stats {
                if let Value::Integer(count) = value {
                    counters.insert(name, count);
                }
            }
        }
        let bookmark = match meta.remove("bookmark") {
            Some(Value::String(token)) => Some(Bookmark::new(token)),
            _ => None,
        };
        let query_type = match meta.remove("type") {
            Some(Value::String(t)) => Some(t),
            _ => None,
        };
        Self {
            counters,
            bookmark,
            query_type,
            metadata: meta,
        }
    }

    /// Counter accessor; absent counters read as zero
    pub fn counter(&self, name: &str) -> i64 {
        self.counters.get(name).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_from_metadata() {
        let mut stats = HashMap::new();
        stats.insert("nodes-created".to_string(), Value::Integer(3));
        let mut meta = HashMap::new();
        meta.insert("stats".to_string(), Value::Map(stats));
        meta.insert("bookmark".to_string(), Value::String("bm:42".into()));
        meta.insert("type".to_string(), Value::String("w".into()));
        meta.insert("t_last".to_string(), Value::Integer(7));

        let summary = Summary::from_metadata(meta);
        assert_eq!(summary.counter("nodes-created"), 3);
        assert_eq!(summary.counter("labels-added"), 0);
        assert_eq!(summary.bookmark, Some(Bookmark::new("bm:42")));
        assert_eq!(summary.query_type.as_deref(), Some("w"));
        assert_eq!(summary.metadata.get("t_last"), Some(&Value::Integer(7)));
    }

    #[test]
    fn test_empty_metadata() {
        let summary = Summary::from_metadata(HashMap::new());
        assert!(summary.counters.is_empty());
        assert!(summary.bookmark.is_none());
    }
}
