use std::{collections::HashSet, sync::Arc};

use serde::Serialize;

use crate::{
    app::errors::AppError,
    bookmarks::{self, BookmarkCreate, BookmarkRecord, BookmarkStore},
    codec::{self, ExportFile, ExportRecord, Format, ImportRecord},
    files::PickedFile,
    search::SearchResult,
    tags::{TagEntry, TagStore},
};

/// A bookmark joined with its tag entry (empty when the url has none).
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusEntry {
    pub record: BookmarkRecord,
    pub tags: TagEntry,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub failed: usize,
}

/// Read access to bookmarks and tags, plus the import/export flows that
/// touch both.
#[derive(Clone)]
pub struct Library {
    bookmarks: Arc<dyn BookmarkStore>,
    tags: TagStore,
}

impl Library {
    pub fn new(bookmarks: Arc<dyn BookmarkStore>, tags: TagStore) -> Self {
        Self { bookmarks, tags }
    }

    pub fn bookmarks(&self) -> &Arc<dyn BookmarkStore> {
        &self.bookmarks
    }

    pub fn tags(&self) -> &TagStore {
        &self.tags
    }

    /// Flattened bookmarks in traversal order; a url seen twice keeps its
    /// first occurrence.
    pub fn records(&self) -> anyhow::Result<Vec<BookmarkRecord>> {
        let mut seen = HashSet::new();
        let mut records = bookmarks::flatten(&self.bookmarks.get_tree()?);
        records.retain(|record| seen.insert(record.url.clone()));
        Ok(records)
    }

    pub fn corpus(&self) -> anyhow::Result<Vec<CorpusEntry>> {
        let records = self.records()?;
        let mut tag_map = self.tags.get_all()?;

        Ok(records
            .into_iter()
            .map(|record| {
                let tags = tag_map.remove(&record.url).unwrap_or_default();
                CorpusEntry { record, tags }
            })
            .collect())
    }

    /// Every bookmark, newest first.
    pub fn all_newest_first(&self) -> anyhow::Result<Vec<SearchResult>> {
        let records = bookmarks::newest_first(self.records()?);
        self.attach_tags(records)
    }

    /// The `count` newest bookmarks, one per url (the newest copy wins).
    pub fn latest(&self, count: usize) -> anyhow::Result<Vec<SearchResult>> {
        let mut wanted = count;
        loop {
            let recent = self.bookmarks.get_recent(wanted)?;
            let exhausted = recent.len() < wanted;

            let mut seen = HashSet::new();
            let mut records = recent;
            records.retain(|record| seen.insert(record.url.clone()));

            if records.len() >= count || exhausted {
                records.truncate(count);
                return self.attach_tags(records);
            }

            // duplicates pushed some bookmarks out of the window
            wanted += count - records.len();
        }
    }

    fn attach_tags(&self, records: Vec<BookmarkRecord>) -> anyhow::Result<Vec<SearchResult>> {
        let tag_map = self.tags.get_all()?;
        Ok(records
            .into_iter()
            .map(|record| {
                let tags = tag_map.get(&record.url).cloned().unwrap_or_default();
                SearchResult::scored(&CorpusEntry { record, tags }, 0)
            })
            .collect())
    }

    pub fn export(&self, format: Format) -> Result<ExportFile, AppError> {
        let records = self
            .corpus()?
            .into_iter()
            .map(ExportRecord::from)
            .collect::<Vec<_>>();

        let content = codec::encode(&records, format)?;
        log::info!("exported {} bookmarks as {}", records.len(), format.name());

        Ok(ExportFile::new(
            format,
            content,
            records.len(),
            chrono::Local::now().date_naive(),
        ))
    }

    /// Parses the whole file first; a malformed file creates nothing.
    /// After that every record is created independently and nothing is
    /// rolled back on a failure. Tags replace any existing entry.
    pub fn import(&self, file: &PickedFile) -> Result<ImportReport, AppError> {
        let format = Format::from_content_type(&file.content_type)
            .ok_or_else(|| AppError::UnsupportedContentType(file.content_type.clone()))?;

        let records = codec::decode(&file.bytes, format)?;
        log::info!("importing {} bookmarks from {}", records.len(), file.name);

        let mut report = ImportReport::default();
        for record in records {
            let url = record.url.clone();
            match self.import_one(record) {
                Ok(()) => report.imported += 1,
                Err(err) => {
                    log::error!("failed to import {url}: {err:#}");
                    report.failed += 1;
                }
            }
        }

        log::info!(
            "import finished: {} imported, {} failed",
            report.imported,
            report.failed
        );

        Ok(report)
    }

    fn import_one(&self, record: ImportRecord) -> anyhow::Result<()> {
        let node = self.bookmarks.create(BookmarkCreate {
            title: record.title,
            url: record.url,
            parent_id: None,
        })?;

        let url = node.url.unwrap_or_default();
        self.tags.set_entry(&url, TagEntry::new(record.tags, None))
    }
}
