//! One interactive search session: input handling, result display state and
//! tag edits, scoped to a single UI mount.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use anyhow::anyhow;
use serde::Serialize;

use crate::{
    app::errors::AppError,
    codec::ExportFile,
    command::{Command, Input},
    eid::Eid,
    files::{Downloader, FilePicker},
    library::Library,
    search::{engine, Debouncer, Keywords, QueryEngine, SearchResult, Sequencer},
    selection::{Selection, Snapshot},
};

/// What happened to one input.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    /// input was empty, display cleared
    Cleared,
    Results {
        results: Vec<SearchResult>,
    },
    Exported {
        #[serde(flatten)]
        file: ExportFile,
        saved_to: String,
    },
    Imported {
        imported: usize,
        failed: usize,
    },
    /// no picker attached: the UI has to upload the file itself
    ImportPending,
    ImportCancelled,
    /// a newer input started before this one finished
    Stale,
}

pub struct SessionFiles {
    pub picker: Option<Arc<dyn FilePicker>>,
    pub downloader: Arc<dyn Downloader>,
}

struct Ranked {
    sequence: u64,
    keywords: Keywords,
    results: anyhow::Result<Vec<SearchResult>>,
}

#[derive(Default)]
struct View {
    selection: Selection,
    /// keywords behind the displayed results; `None` for command listings
    keywords: Option<Keywords>,
    /// sequence of the input currently displayed
    applied: u64,
}

pub struct Session {
    id: Eid,
    library: Library,
    files: SessionFiles,
    engine: Mutex<QueryEngine>,
    debouncer: Debouncer<Arc<Ranked>>,
    sequencer: Sequencer,
    view: Mutex<View>,
    closed: AtomicBool,
}

impl Session {
    pub fn new(library: Library, files: SessionFiles, debounce: Duration) -> Self {
        Self {
            id: Eid::new(),
            library,
            files,
            engine: Mutex::new(QueryEngine::new()),
            debouncer: Debouncer::new(debounce),
            sequencer: Sequencer::default(),
            view: Mutex::new(View::default()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &Eid {
        &self.id
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub async fn input(&self, text: &str) -> Result<Outcome, AppError> {
        let sequence = self.sequencer.issue();

        match Input::parse(text) {
            Input::Empty => {
                let mut view = self.view.lock().unwrap();
                if !self.sequencer.is_current(sequence) {
                    return Ok(Outcome::Stale);
                }
                view.selection.clear();
                view.keywords = None;
                view.applied = sequence;
                Ok(Outcome::Cleared)
            }
            Input::Search(keywords) => self.search(sequence, keywords).await,
            Input::Command(command) => self.run_command(sequence, command),
        }
    }

    async fn search(&self, sequence: u64, keywords: Keywords) -> Result<Outcome, AppError> {
        let ranked = self
            .debouncer
            .call(|| async {
                let results = self.engine.lock().unwrap().search(&keywords, &self.library);
                Arc::new(Ranked {
                    sequence,
                    keywords: keywords.clone(),
                    results,
                })
            })
            .await;

        // the caller owning this window went away mid-query
        let Some(ranked) = ranked else {
            return Ok(Outcome::Stale);
        };

        if !self.sequencer.is_current(ranked.sequence) {
            log::debug!("dropping results of superseded query #{}", ranked.sequence);
            return Ok(Outcome::Stale);
        }

        let results = match &ranked.results {
            Ok(results) => results.clone(),
            Err(err) => return Err(anyhow!("search failed: {err:#}").into()),
        };

        Ok(self.present(ranked.sequence, Some(ranked.keywords.clone()), results))
    }

    fn run_command(&self, sequence: u64, command: Command) -> Result<Outcome, AppError> {
        log::debug!("running command {command:?}");

        match command {
            Command::All => {
                let results = self.library.all_newest_first()?;
                Ok(self.present(sequence, None, results))
            }
            Command::Latest(Some(count)) => {
                let results = self.library.latest(count)?;
                Ok(self.present(sequence, None, results))
            }
            Command::Latest(None) | Command::Unknown => Ok(self.present(sequence, None, vec![])),
            Command::Export(format) => {
                let file = self.library.export(format)?;
                let saved_to = self.files.downloader.download(&file)?;
                Ok(Outcome::Exported {
                    file,
                    saved_to: saved_to.display().to_string(),
                })
            }
            Command::Import => {
                let Some(picker) = &self.files.picker else {
                    return Ok(Outcome::ImportPending);
                };

                match picker.pick()? {
                    Some(file) => {
                        let report = self.library.import(&file)?;
                        Ok(Outcome::Imported {
                            imported: report.imported,
                            failed: report.failed,
                        })
                    }
                    None => Ok(Outcome::ImportCancelled),
                }
            }
        }
    }

    /// Displays `results` unless a newer input has started meanwhile.
    fn present(
        &self,
        sequence: u64,
        keywords: Option<Keywords>,
        results: Vec<SearchResult>,
    ) -> Outcome {
        let mut view = self.view.lock().unwrap();
        if !self.sequencer.is_current(sequence) {
            return Outcome::Stale;
        }

        // callers coalesced into one debounce window share a sequence
        if sequence > view.applied {
            view.selection.show(results.clone());
            view.keywords = keywords;
            view.applied = sequence;
        }

        Outcome::Results { results }
    }

    pub fn move_selection(&self, delta: isize) -> Option<usize> {
        self.view.lock().unwrap().selection.move_by(delta)
    }

    pub fn hover(&self, index: usize) -> Option<usize> {
        self.view.lock().unwrap().selection.hover(index)
    }

    /// Url of the selected result. Ends the session.
    pub fn open_selected(&self) -> Option<String> {
        self.sequencer.issue();
        let mut view = self.view.lock().unwrap();
        let selected = view.selection.take_selected()?;

        view.keywords = None;
        self.closed.store(true, Ordering::SeqCst);
        Some(selected.url)
    }

    /// Clears everything and ends the session.
    pub fn cancel(&self) {
        self.sequencer.issue();
        let mut view = self.view.lock().unwrap();
        view.selection.clear();
        view.keywords = None;
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> Snapshot {
        self.view.lock().unwrap().selection.snapshot()
    }

    pub fn add_tag(&self, url: &str, tag: &str) -> Result<Vec<String>, AppError> {
        let tag = clean_tag(tag)?;
        let tags = self.library.tags().set_tag(url, &tag)?;
        self.refresh(url, &tags);
        Ok(tags)
    }

    pub fn delete_tag(&self, url: &str, tag: &str) -> Result<Vec<String>, AppError> {
        let tags = self.library.tags().delete_tag(url, tag)?;
        self.refresh(url, &tags);
        Ok(tags)
    }

    pub fn rename_tag(&self, url: &str, old: &str, new: &str) -> Result<Vec<String>, AppError> {
        let new = clean_tag(new)?;
        let tags = self.library.tags().rename_tag(url, old, &new)?;
        self.refresh(url, &tags);
        Ok(tags)
    }

    /// Pushes edited tags into the displayed results. The query cache is
    /// left alone.
    fn refresh(&self, url: &str, tags: &[String]) {
        let mut view = self.view.lock().unwrap();
        let View {
            selection,
            keywords,
            ..
        } = &mut *view;

        let Some(shown) = selection.matches().iter().find(|m| m.url == url) else {
            return;
        };

        let score = match keywords {
            Some(keywords) => engine::score_fields(keywords, &shown.title, &shown.url, tags),
            None => Some(shown.score),
        };

        selection.retag(url, tags, score);
    }
}

fn clean_tag(tag: &str) -> Result<String, AppError> {
    let tag = tag.trim();
    if tag.is_empty() {
        return Err(AppError::InvalidTag(tag.to_string()));
    }
    Ok(tag.to_string())
}
