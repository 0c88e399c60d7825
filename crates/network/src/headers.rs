//! HTTP header handling.

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;

/// HTTP header map: case-insensitive lookup, original spelling and order kept.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeaderMap {
    /// Lowercased name -> (name as given, value).
    headers: IndexMap<String, (String, String)>,
}

impl HeaderMap {
    /// Create a new empty header map.
    pub fn new() -> Self {
        Self {
            headers: IndexMap::new(),
        }
    }

    /// Insert a header, replacing any value stored under the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.headers.insert(name.to_lowercase(), (name, value.into()));
    }

    /// Get a header value.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(|(_, v)| v.as_str())
    }

    /// Check if a header exists.
    pub fn contains(&self, name: &str) -> bool {
        self.headers.contains_key(&name.to_lowercase())
    }

    /// Remove a header.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.headers.shift_remove(&name.to_lowercase()).map(|(_, v)| v)
    }

    /// Get number of headers.
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Iterate over `(name, value)` in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.values().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Get Content-Type header.
    pub fn content_type(&self) -> Option<&str> {
        self.get("content-type")
    }
}

impl fmt::Display for HeaderMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in self.iter() {
            write!(f, "{}: {}\r\n", name, value)?;
        }
        Ok(())
    }
}

impl Serialize for HeaderMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HeaderMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = HeaderMap::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

/// Parse a raw `name: value` header block as returned by a transport.
///
/// Lines are split on `\n` (a trailing `\r` is dropped), empty lines are
/// skipped and each line is split on the first `": "`. A line without the
/// separator becomes a header with an empty value.
pub fn parse_response_headers(raw: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();

    for line in raw.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            continue;
        }

        match line.split_once(": ") {
            Some((name, value)) => headers.insert(name, value),
            None => headers.insert(line, ""),
        }
    }

    headers
}
