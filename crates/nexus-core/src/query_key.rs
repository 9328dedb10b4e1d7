//! # Query Keys
//!
//! Hierarchical identifiers for cached resources.
//!
//! ## Prefix Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Query Key Hierarchy                              │
//! │                                                                         │
//! │  ["productos"] ─────────────┬── ["productos", "scan", "7790001"]       │
//! │                             └── ["productos", "scan", "7790002"]       │
//! │                                                                         │
//! │  ["dashboard"] ─────────────┬── ["dashboard", "resumen"]               │
//! │                             └── ["dashboard", "tiempo-real"]           │
//! │                                                                         │
//! │  invalidate(["dashboard"]) marks BOTH dashboard entries stale.         │
//! │  Matching is segment-wise: ["prod"] is NOT a prefix of ["productos"]. │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Key Segment
// =============================================================================

/// One segment of a [`QueryKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeySegment {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl fmt::Display for KeySegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySegment::Bool(b) => write!(f, "{}", b),
            KeySegment::Int(n) => write!(f, "{}", n),
            KeySegment::Str(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<&str> for KeySegment {
    fn from(s: &str) -> Self {
        KeySegment::Str(s.to_string())
    }
}

impl From<String> for KeySegment {
    fn from(s: String) -> Self {
        KeySegment::Str(s)
    }
}

impl From<&String> for KeySegment {
    fn from(s: &String) -> Self {
        KeySegment::Str(s.clone())
    }
}

impl From<i64> for KeySegment {
    fn from(n: i64) -> Self {
        KeySegment::Int(n)
    }
}

impl From<u32> for KeySegment {
    fn from(n: u32) -> Self {
        KeySegment::Int(i64::from(n))
    }
}

impl From<bool> for KeySegment {
    fn from(b: bool) -> Self {
        KeySegment::Bool(b)
    }
}

// =============================================================================
// Query Key
// =============================================================================

/// Ordered tuple of segments that uniquely identifies a cached resource.
///
/// The empty key is a prefix of every key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryKey(Vec<KeySegment>);

impl QueryKey {
    /// Creates an empty key (matches everything as a prefix).
    pub fn root() -> Self {
        QueryKey(Vec::new())
    }

    /// Creates a key from already-built segments.
    pub fn from_segments(segments: Vec<KeySegment>) -> Self {
        QueryKey(segments)
    }

    /// Returns a new key with `segment` appended.
    pub fn child(&self, segment: impl Into<KeySegment>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        QueryKey(segments)
    }

    /// Returns true if every segment of `prefix` equals the segment at the
    /// same position in this key.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Segments of this key.
    pub fn segments(&self) -> &[KeySegment] {
        &self.0
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for the root key.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", segment)?;
        }
        write!(f, "]")
    }
}

impl<const N: usize> From<[&str; N]> for QueryKey {
    fn from(segments: [&str; N]) -> Self {
        QueryKey(segments.iter().map(|s| KeySegment::from(*s)).collect())
    }
}

impl From<Vec<KeySegment>> for QueryKey {
    fn from(segments: Vec<KeySegment>) -> Self {
        QueryKey(segments)
    }
}

impl FromIterator<KeySegment> for QueryKey {
    fn from_iter<I: IntoIterator<Item = KeySegment>>(iter: I) -> Self {
        QueryKey(iter.into_iter().collect())
    }
}

/// Builds a [`QueryKey`] from mixed segment types.
///
/// ```rust
/// use nexus_core::query_key;
///
/// let code = String::from("7790001");
/// let key = query_key!["productos", "scan", code];
/// assert_eq!(key.to_string(), r#"["productos","scan","7790001"]"#);
/// ```
#[macro_export]
macro_rules! query_key {
    ($($segment:expr),* $(,)?) => {
        $crate::QueryKey::from_segments(vec![$($crate::KeySegment::from($segment)),*])
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_matching() {
        let scan = query_key!["productos", "scan", "7790001"];
        assert!(scan.starts_with(&QueryKey::from(["productos"])));
        assert!(scan.starts_with(&QueryKey::from(["productos", "scan"])));
        assert!(scan.starts_with(&scan));
        assert!(!scan.starts_with(&QueryKey::from(["ventas"])));
        assert!(!QueryKey::from(["productos"]).starts_with(&scan));
    }

    #[test]
    fn test_prefix_is_segment_wise() {
        let key = QueryKey::from(["productos"]);
        assert!(!key.starts_with(&QueryKey::from(["prod"])));
    }

    #[test]
    fn test_root_matches_everything() {
        assert!(QueryKey::from(["dashboard", "resumen"]).starts_with(&QueryKey::root()));
        assert!(QueryKey::root().is_empty());
    }

    #[test]
    fn test_mixed_segments() {
        let key = query_key!["ventas", 42i64, true];
        assert_eq!(key.len(), 3);
        assert_eq!(key.to_string(), r#"["ventas",42,true]"#);
        assert_ne!(query_key!["ventas", 42i64], query_key!["ventas", "42"]);
    }

    #[test]
    fn test_child() {
        let base = QueryKey::from(["productos", "scan"]);
        assert_eq!(base.child("abc"), QueryKey::from(["productos", "scan", "abc"]));
    }

    #[test]
    fn test_serde_shape() {
        let key = query_key!["dashboard", "resumen", 7i64];
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, r#"["dashboard","resumen",7]"#);
        let back: QueryKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }
}
