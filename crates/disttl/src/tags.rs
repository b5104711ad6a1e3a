//! Dependency tags ("signals") attached to cached values, and the
//! scan-delete used to invalidate by tag.

use std::collections::HashSet;
use std::hash::Hash;

use crate::lru::TtlLru;

/// Set of dependency tags carried by one cache entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet(HashSet<String>);

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any of `tags` is in this set.
    pub fn intersects<S: AsRef<str>>(&self, tags: &[S]) -> bool {
        tags.iter().any(|tag| self.0.contains(tag.as_ref()))
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for TagSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// A cached value together with the tags it depends on.
#[derive(Debug, Clone)]
pub struct TaggedValue<T> {
    pub value: T,
    pub tags: TagSet,
}

impl<T> TaggedValue<T> {
    pub fn new(value: T, tags: TagSet) -> Self {
        Self { value, tags }
    }
}

/// Remove every entry whose tag set intersects `tags`.
///
/// Walks a snapshot of the keys and re-checks each entry under the cache
/// lock, so concurrent writers are never blocked for the whole scan. Cost is
/// O(entries × tags). Expired entries are already misses: they are skipped,
/// not counted, and left for the sweeper.
///
/// Returns the removed keys, least recently used first.
pub fn delete_by_tags<K, T, S>(cache: &TtlLru<K, TaggedValue<T>>, tags: &[S]) -> Vec<K>
where
    K: Eq + Hash + Clone,
    T: Clone,
    S: AsRef<str>,
{
    if tags.is_empty() {
        return Vec::new();
    }

    cache
        .keys()
        .into_iter()
        .filter(|key| cache.remove_live_if(key, |entry| entry.tags.intersects(tags)))
        .collect()
}
