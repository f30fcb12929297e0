use std::{sync::Arc, time::Duration};

use serde::Serialize;
use tokio::task::JoinSet;

use super::{TagGenerator, TagOutcome, Tagger};
use crate::{bookmarks::BookmarkRecord, metadata::PageSource};

#[derive(Debug, Clone, Copy)]
pub struct BatchOpts {
    pub size: usize,
    pub delay: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub total: usize,
    /// tagged, skipped and untagged bookmarks
    pub success_count: usize,
    pub failure_count: usize,
    pub tagged: usize,
    pub skipped: usize,
    pub untagged: usize,
}

impl BatchReport {
    pub fn processed(&self) -> usize {
        self.success_count + self.failure_count
    }

    fn record(&mut self, outcome: TagOutcome) {
        self.success_count += 1;
        match outcome {
            TagOutcome::Tagged(_) => self.tagged += 1,
            TagOutcome::Skipped => self.skipped += 1,
            TagOutcome::Untagged => self.untagged += 1,
        }
    }
}

/// Tags every bookmark that has no entry yet, `opts.size` at a time with a
/// pause between batches. A failing bookmark is counted and the run goes on.
/// `on_batch` sees the running totals after each batch.
pub async fn retag_all<G, P>(
    tagger: Arc<Tagger<G, P>>,
    bookmarks: Vec<BookmarkRecord>,
    opts: BatchOpts,
    mut on_batch: impl FnMut(&BatchReport),
) -> BatchReport
where
    G: TagGenerator + 'static,
    P: PageSource + 'static,
{
    let size = opts.size.max(1);
    let batches = bookmarks.len().div_ceil(size);
    let mut report = BatchReport {
        total: bookmarks.len(),
        ..Default::default()
    };

    for (idx, batch) in bookmarks.chunks(size).enumerate() {
        log::info!(
            "processing batch {}/{batches} with {} bookmarks",
            idx + 1,
            batch.len()
        );

        let mut set = JoinSet::new();
        for bookmark in batch.iter().cloned() {
            let tagger = tagger.clone();
            set.spawn(async move {
                let outcome = tagger.tag_bookmark(&bookmark).await;
                (bookmark.url, outcome)
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((_, Ok(outcome))) => report.record(outcome),
                Ok((url, Err(err))) => {
                    log::error!("failed to tag {url}: {err:#}");
                    report.failure_count += 1;
                }
                Err(err) => {
                    log::error!("tagging task crashed: {err}");
                    report.failure_count += 1;
                }
            }
        }

        log::info!(
            "progress {}/{}: {} ok, {} failed",
            report.processed(),
            report.total,
            report.success_count,
            report.failure_count
        );
        on_batch(&report);

        if idx + 1 < batches {
            tokio::time::sleep(opts.delay).await;
        }
    }

    log::info!(
        "retag finished. total: {}, success: {}, failure: {} (tagged {}, skipped {}, untagged {})",
        report.total,
        report.success_count,
        report.failure_count,
        report.tagged,
        report.skipped,
        report.untagged
    );

    report
}
