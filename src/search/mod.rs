pub mod cache;
pub mod debounce;
pub mod engine;

use serde::{Deserialize, Serialize};

pub use cache::QueryCache;
pub use debounce::{Debouncer, Sequencer};
pub use engine::QueryEngine;

use crate::library::CorpusEntry;

/// One ranked bookmark. Produced per query and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub id: String,
    pub title: String,
    pub url: String,
    pub tags: Vec<String>,
    pub favicon: Option<String>,
    pub score: u32,
}

impl SearchResult {
    pub fn scored(entry: &CorpusEntry, score: u32) -> Self {
        SearchResult {
            id: entry.record.id.clone(),
            title: entry.record.title.clone(),
            url: entry.record.url.clone(),
            tags: entry.tags.tags.clone(),
            favicon: entry.tags.favicon.clone(),
            score,
        }
    }

    /// Stored favicon, else the public favicon service for the url's host.
    pub fn icon_url(&self) -> Option<String> {
        if let Some(favicon) = &self.favicon {
            return Some(favicon.clone());
        }

        let host = url::Url::parse(&self.url).ok()?.host_str()?.to_string();
        Some(format!(
            "https://www.google.com/s2/favicons?domain={host}&sz=32"
        ))
    }
}

/// Lower-cased, whitespace-split search terms. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keywords(Vec<String>);

impl Keywords {
    pub fn parse(input: &str) -> Option<Keywords> {
        let words = input
            .to_lowercase()
            .split_whitespace()
            .map(String::from)
            .collect::<Vec<_>>();

        if words.is_empty() {
            None
        } else {
            Some(Keywords(words))
        }
    }

    /// Order-sensitive key: `"a b"` and `"b a"` are cached separately.
    pub fn cache_key(&self) -> String {
        self.0.join(" ")
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}
