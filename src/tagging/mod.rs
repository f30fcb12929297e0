//! Automatic tagging: page metadata goes in, a tag entry comes out.
//!
//! The tag generator is a remote service and is allowed to fail. A failure
//! is logged and the bookmark simply stays untagged; it never reaches the
//! caller as an error.

mod batch;
mod chat;

use std::future::Future;

use serde::Serialize;

pub use batch::{retag_all, BatchOpts, BatchReport};
pub use chat::{build_prompt, parse_tags, ChatTagGenerator};

use crate::{
    bookmarks::BookmarkRecord,
    metadata::{PageMetadata, PageSource},
    tags::{TagEntry, TagStore},
};

pub trait TagGenerator: Send + Sync {
    fn generate(
        &self,
        page: &PageMetadata,
    ) -> impl Future<Output = anyhow::Result<Vec<String>>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "count", rename_all = "snake_case")]
pub enum TagOutcome {
    /// stored this many tags
    Tagged(usize),
    /// the url already had a tag entry
    Skipped,
    /// the generator failed or returned nothing
    Untagged,
}

pub struct Tagger<G, P> {
    generator: G,
    pages: P,
    tags: TagStore,
}

impl<G: TagGenerator, P: PageSource> Tagger<G, P> {
    pub fn new(generator: G, pages: P, tags: TagStore) -> Self {
        Self {
            generator,
            pages,
            tags,
        }
    }

    /// Fetches, generates and stores, replacing any previous entry for `url`.
    /// Only a failing tag store is an error.
    pub async fn tag_page(&self, url: &str, title: &str) -> anyhow::Result<TagOutcome> {
        let page = self.pages.fetch(url, title).await;

        let tags = match self.generator.generate(&page).await {
            Ok(tags) => tags,
            Err(err) => {
                log::error!("tag generation failed for {url}: {err:#}");
                return Ok(TagOutcome::Untagged);
            }
        };

        if tags.is_empty() {
            log::warn!("no tags generated for {url}");
            return Ok(TagOutcome::Untagged);
        }

        log::info!("tagged {url}: {}", tags.join(", "));
        let count = tags.len();
        self.tags.set_entry(url, TagEntry::new(tags, page.favicon))?;

        Ok(TagOutcome::Tagged(count))
    }

    #[cfg(test)]
    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Like [`Tagger::tag_page`], but leaves urls that already have an entry alone.
    pub async fn tag_bookmark(&self, bookmark: &BookmarkRecord) -> anyhow::Result<TagOutcome> {
        if self.tags.get(&bookmark.url)?.is_some() {
            log::debug!("{} already has tags, skipping", bookmark.url);
            return Ok(TagOutcome::Skipped);
        }

        self.tag_page(&bookmark.url, &bookmark.title).await
    }
}
