use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Identity of a cached server resource: endpoint path plus normalised filters
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ResourceKey {
    path: String,
    filters: BTreeMap<String, String>,
}

impl ResourceKey {
    /// A query string embedded in `path` is folded into the filters
    pub fn new(path: impl AsRef<str>) -> Self {
        let raw = path.as_ref().trim();
        let (path, query) = match raw.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (raw, None),
        };

        let mut key = Self {
            path: normalize_path(path),
            filters: BTreeMap::new(),
        };
        if let Some(query) = query {
            for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
                key.insert_filter(&name, &value);
            }
        }
        key
    }

    pub fn with_filter(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.insert_filter(name.as_ref(), value.as_ref());
        self
    }

    pub fn with_filters<I, K, V>(mut self, filters: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (name, value) in filters {
            self.insert_filter(name.as_ref(), value.as_ref());
        }
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn filters(&self) -> &BTreeMap<String, String> {
        &self.filters
    }

    /// True when the key's path equals `prefix` or lies below it
    pub fn is_under(&self, prefix: &str) -> bool {
        let prefix = normalize_path(prefix);
        if prefix == "/" {
            return true;
        }
        self.path == prefix
            || (self.path.starts_with(&prefix) && self.path.as_bytes().get(prefix.len()) == Some(&b'/'))
    }

    // Empty names and values carry no filtering meaning
    fn insert_filter(&mut self, name: &str, value: &str) {
        let (name, value) = (name.trim(), value.trim());
        if name.is_empty() || value.is_empty() {
            return;
        }
        self.filters.insert(name.to_string(), value.to_string());
    }
}

impl From<&str> for ResourceKey {
    fn from(path: &str) -> Self {
        ResourceKey::new(path)
    }
}

impl From<String> for ResourceKey {
    fn from(path: String) -> Self {
        ResourceKey::new(path)
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)?;
        if !self.filters.is_empty() {
            let query = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(self.filters.iter())
                .finish();
            write!(f, "?{}", query)?;
        }
        Ok(())
    }
}

fn normalize_path(path: &str) -> String {
    let path = path.trim();
    let mut normalized = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };
    while normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }
    normalized
}

/// Which cache entries a write makes stale
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidation {
    /// Exactly this descriptor, filters included
    Exact(ResourceKey),
    /// Every descriptor whose path is at or below this path, whatever its filters
    Prefix(String),
}

impl Invalidation {
    pub fn exact(key: impl Into<ResourceKey>) -> Self {
        Invalidation::Exact(key.into())
    }

    pub fn prefix(path: impl AsRef<str>) -> Self {
        Invalidation::Prefix(normalize_path(path.as_ref()))
    }

    pub fn matches(&self, key: &ResourceKey) -> bool {
        match self {
            Invalidation::Exact(target) => target == key,
            Invalidation::Prefix(prefix) => key.is_under(prefix),
        }
    }
}

impl From<ResourceKey> for Invalidation {
    fn from(key: ResourceKey) -> Self {
        Invalidation::Exact(key)
    }
}
