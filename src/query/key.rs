//! Structural query keys
//!
//! A `QueryKey` is an ordered list of primitive parts, e.g. `["todos", {"id": 1}]`.
//! Keys compare by value, never by identity, and render to a canonical JSON
//! string that is used in logs and on screen.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A single component of a query key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum KeyPart {
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<KeyPart>),
    /// Object-like part; entries are kept sorted so field order never matters
    Map(BTreeMap<String, KeyPart>),
}

impl KeyPart {
    /// Builds a map part from `(field, value)` pairs
    pub fn map<K, V, I>(fields: I) -> Self
    where
        K: Into<String>,
        V: Into<KeyPart>,
        I: IntoIterator<Item = (K, V)>,
    {
        KeyPart::Map(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<&str> for KeyPart {
    fn from(value: &str) -> Self {
        KeyPart::Str(value.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(value: String) -> Self {
        KeyPart::Str(value)
    }
}

impl From<bool> for KeyPart {
    fn from(value: bool) -> Self {
        KeyPart::Bool(value)
    }
}

impl From<i64> for KeyPart {
    fn from(value: i64) -> Self {
        KeyPart::Int(value)
    }
}

impl From<i32> for KeyPart {
    fn from(value: i32) -> Self {
        KeyPart::Int(i64::from(value))
    }
}

impl From<u32> for KeyPart {
    fn from(value: u32) -> Self {
        KeyPart::Int(i64::from(value))
    }
}

impl From<u64> for KeyPart {
    /// Values above `i64::MAX` are kept as their decimal string
    fn from(value: u64) -> Self {
        i64::try_from(value)
            .map(KeyPart::Int)
            .unwrap_or_else(|_| KeyPart::Str(value.to_string()))
    }
}

/// Identifies one cacheable query
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct QueryKey(Vec<KeyPart>);

impl QueryKey {
    /// Creates a key whose first part is `root` (usually the resource name)
    pub fn new(root: impl Into<KeyPart>) -> Self {
        Self(vec![root.into()])
    }

    /// Appends a part, builder style
    pub fn with(mut self, part: impl Into<KeyPart>) -> Self {
        self.0.push(part.into());
        self
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }

    /// Whether every part of `self` matches the leading parts of `other`
    ///
    /// `["todos"]` is a prefix of `["todos", 1]` and of itself.
    pub fn is_prefix_of(&self, other: &QueryKey) -> bool {
        other.0.len() >= self.0.len() && other.0[..self.0.len()] == self.0[..]
    }

    /// Canonical JSON rendering of the key
    pub fn hash_string(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| format!("{:?}", self.0))
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hash_string())
    }
}

/// Selects which entries an invalidation applies to
#[derive(Clone)]
pub enum KeyFilter {
    /// Only the entry with exactly this key
    Exact(QueryKey),
    /// Every entry whose key starts with these parts
    Prefix(QueryKey),
    /// Every entry for which the predicate returns true
    Predicate(Arc<dyn Fn(&QueryKey) -> bool + Send + Sync>),
}

impl KeyFilter {
    pub fn exact(key: QueryKey) -> Self {
        KeyFilter::Exact(key)
    }

    pub fn prefix(key: QueryKey) -> Self {
        KeyFilter::Prefix(key)
    }

    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&QueryKey) -> bool + Send + Sync + 'static,
    {
        KeyFilter::Predicate(Arc::new(f))
    }

    pub fn matches(&self, key: &QueryKey) -> bool {
        match self {
            KeyFilter::Exact(k) => k == key,
            KeyFilter::Prefix(k) => k.is_prefix_of(key),
            KeyFilter::Predicate(f) => f(key),
        }
    }
}

impl fmt::Debug for KeyFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyFilter::Exact(k) => write!(f, "Exact({})", k),
            KeyFilter::Prefix(k) => write!(f, "Prefix({})", k),
            KeyFilter::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// A bare key filters by prefix, the same way `invalidate(["todos"])` reads
impl From<QueryKey> for KeyFilter {
    fn from(key: QueryKey) -> Self {
        KeyFilter::Prefix(key)
    }
}

impl From<&QueryKey> for KeyFilter {
    fn from(key: &QueryKey) -> Self {
        KeyFilter::Prefix(key.clone())
    }
}
