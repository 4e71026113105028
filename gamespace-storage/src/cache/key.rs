//! Deterministic cache keys.
//!
//! A key renders as `<resource>:<qualifier>`. The qualifier is either a
//! resource id or a canonical parameter string: empty values dropped, pairs
//! sorted by name, joined as `name=value` with `&`. Two queries that differ
//! only in parameter order therefore share one entry.

use std::fmt;

/// Separator between resource name and qualifier.
const SEPARATOR: char = ':';

/// A cache key. Construct through [`CacheKey::new`] or
/// [`CacheKey::with_params`] so the rendering stays canonical.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    rendered: String,
    resource_len: usize,
}

impl CacheKey {
    /// Key for a single resource instance, e.g. `game:7`.
    pub fn new(resource: &str, qualifier: impl fmt::Display) -> Self {
        debug_assert!(
            !resource.contains(SEPARATOR),
            "resource names must not contain '{}'",
            SEPARATOR
        );
        Self {
            rendered: format!("{}{}{}", resource, SEPARATOR, qualifier),
            resource_len: resource.len(),
        }
    }

    /// Key for a parameterized listing, e.g. `catalog:genre=RPG&search=zelda`.
    pub fn with_params<I, K, V>(resource: &str, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut pairs: Vec<(String, String)> = params
            .into_iter()
            .filter(|(_, value)| !value.as_ref().is_empty())
            .map(|(name, value)| (escape(name.as_ref()), escape(value.as_ref())))
            .collect();
        pairs.sort();
        let qualifier = pairs
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("&");
        Self::new(resource, qualifier)
    }

    /// Prefix matching every key of `resource`, for
    /// [`ReadCache::invalidate_prefix`](super::ReadCache::invalidate_prefix).
    pub fn prefix(resource: &str) -> String {
        format!("{}{}", resource, SEPARATOR)
    }

    pub fn resource(&self) -> &str {
        &self.rendered[..self.resource_len]
    }

    pub fn qualifier(&self) -> &str {
        &self.rendered[self.resource_len + SEPARATOR.len_utf8()..]
    }

    pub fn as_str(&self) -> &str {
        &self.rendered
    }

    pub fn starts_with(&self, prefix: &str) -> bool {
        self.rendered.starts_with(prefix)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}

/// Escape the characters that carry structure in the qualifier.
fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '%' => out.push_str("%25"),
            '&' => out.push_str("%26"),
            '=' => out.push_str("%3D"),
            _ => out.push(ch),
        }
    }
    out
}
