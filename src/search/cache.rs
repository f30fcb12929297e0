use std::collections::HashMap;

use super::{Keywords, SearchResult};

/// Ranked results keyed by the exact keyword tuple.
///
/// Entries are never invalidated: a hit returns what was computed the first
/// time, even if tags changed since. The cache lives as long as its session.
#[derive(Debug, Default)]
pub struct QueryCache {
    entries: HashMap<String, Vec<SearchResult>>,
}

impl QueryCache {
    pub fn get(&self, keywords: &Keywords) -> Option<&Vec<SearchResult>> {
        self.entries.get(&keywords.cache_key())
    }

    pub fn insert(&mut self, keywords: &Keywords, results: Vec<SearchResult>) {
        self.entries.insert(keywords.cache_key(), results);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
