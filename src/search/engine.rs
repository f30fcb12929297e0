//! Keyword matching and ranking over the bookmark + tag corpus.
//!
//! A bookmark matches when every keyword is a case-insensitive substring of
//! its title, its url or one of its tags. Per keyword, a title hit adds 3, a
//! url hit adds 2 and a tag hit adds 1. Results are sorted by score, highest
//! first; equal scores keep traversal order.

use super::{Keywords, QueryCache, SearchResult};
use crate::library::{CorpusEntry, Library};

const TITLE_WEIGHT: u32 = 3;
const URL_WEIGHT: u32 = 2;
const TAG_WEIGHT: u32 = 1;

/// Score of one entry, or `None` if some keyword matches no field.
pub fn score(keywords: &Keywords, entry: &CorpusEntry) -> Option<u32> {
    score_fields(
        keywords,
        &entry.record.title,
        &entry.record.url,
        &entry.tags.tags,
    )
}

pub fn score_fields(keywords: &Keywords, title: &str, url: &str, tags: &[String]) -> Option<u32> {
    let title = title.to_lowercase();
    let url = url.to_lowercase();
    let tags = tags.iter().map(|t| t.to_lowercase()).collect::<Vec<_>>();

    let mut total = 0;
    for keyword in keywords.iter() {
        let mut keyword_score = 0;

        if title.contains(keyword) {
            keyword_score += TITLE_WEIGHT;
        }
        if url.contains(keyword) {
            keyword_score += URL_WEIGHT;
        }
        if tags.iter().any(|tag| tag.contains(keyword)) {
            keyword_score += TAG_WEIGHT;
        }

        if keyword_score == 0 {
            return None;
        }
        total += keyword_score;
    }

    Some(total)
}

pub fn rank(keywords: &Keywords, corpus: &[CorpusEntry]) -> Vec<SearchResult> {
    let mut results = corpus
        .iter()
        .filter_map(|entry| score(keywords, entry).map(|s| SearchResult::scored(entry, s)))
        .collect::<Vec<_>>();

    // stable: ties stay in traversal order
    results.sort_by(|a, b| b.score.cmp(&a.score));
    results
}

#[derive(Debug, Default)]
pub struct QueryEngine {
    cache: QueryCache,
}

impl QueryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached lookup; the library is only read on a miss.
    pub fn search(
        &mut self,
        keywords: &Keywords,
        library: &Library,
    ) -> anyhow::Result<Vec<SearchResult>> {
        if let Some(results) = self.cache.get(keywords) {
            log::debug!("query cache hit for {:?}", keywords.cache_key());
            return Ok(results.clone());
        }

        let corpus = library.corpus()?;
        let results = rank(keywords, &corpus);

        log::debug!(
            "{} of {} bookmarks match {:?}",
            results.len(),
            corpus.len(),
            keywords.cache_key()
        );

        self.cache.insert(keywords, results.clone());
        Ok(results)
    }

    #[cfg(test)]
    pub fn cached_queries(&self) -> usize {
        self.cache.len()
    }
}
