//! Outbound header bag.
//!
//! Names keep the spelling they were inserted with but compare case-insensitively,
//! so a call-supplied `content-type` replaces a default `Content-Type`.

use std::collections::BTreeMap;
use std::fmt;

/// Headers whose values are never rendered by `Display`.
const REDACTED: [&str; 2] = ["authorization", "proxy-authorization"];

/// Ordered, case-preserving set of request headers with unique names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestHeaders {
    entries: Vec<(String, String)>,
}

impl RequestHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a header. A replaced entry keeps its position but takes the new spelling.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(i) => self.entries[i] = (name, value),
            None => self.entries.push((name, value)),
        }
    }

    /// Insert only if no header of that name exists yet.
    pub fn insert_default(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        if !self.contains(&name) {
            self.entries.push((name, value.into()));
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|i| self.entries[i].1.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Layer `overrides` on top of `self`; overriding values win on name collision.
    pub fn merged_with(&self, overrides: &RequestHeaders) -> RequestHeaders {
        let mut merged = self.clone();
        for (name, value) in overrides.iter() {
            merged.insert(name, value);
        }
        merged
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(n, _)| n.eq_ignore_ascii_case(name))
    }
}

/// `Name:value; Name2:value2`, with credentials masked.
impl fmt::Display for RequestHeaders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            if REDACTED.iter().any(|r| name.eq_ignore_ascii_case(r)) {
                write!(f, "{}:***", name)?;
            } else {
                write!(f, "{}:{}", name, value)?;
            }
        }
        Ok(())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RequestHeaders {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = RequestHeaders::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for RequestHeaders {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl From<&BTreeMap<String, String>> for RequestHeaders {
    fn from(map: &BTreeMap<String, String>) -> Self {
        map.iter().map(|(n, v)| (n.clone(), v.clone())).collect()
    }
}
