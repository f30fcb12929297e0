pub mod errors;

use std::{
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};

use anyhow::Context;
use homedir::my_home;

use crate::{
    bookmarks::{BackendJson, BookmarkCreate, BookmarkRecord, BookmarkStore},
    config::Config,
    files::{DirDownloader, FilePicker},
    library::Library,
    metadata::HttpPages,
    session::{Session, SessionFiles},
    storage::{self, KvStore},
    tagging::{BatchOpts, ChatTagGenerator, Tagger},
    tags::TagStore,
};

pub type DefaultTagger = Tagger<ChatTagGenerator, HttpPages>;

/// Everything a front end needs: configuration, the library and session
/// construction.
#[derive(Clone)]
pub struct App {
    config: Arc<RwLock<Config>>,
    library: Library,
    base_path: PathBuf,
}

impl App {
    /// `TAGMARK_BASE_PATH`, else `~/.local/share/tagmark`.
    pub fn base_path() -> anyhow::Result<String> {
        if let Ok(base_path) = std::env::var("TAGMARK_BASE_PATH") {
            return Ok(base_path);
        }

        let home = my_home()
            .context("Could not determine home directory")?
            .context("Home directory path is empty")?;
        Ok(format!("{}/.local/share/tagmark", home.to_string_lossy()))
    }

    pub fn open(base_path: &str) -> anyhow::Result<Self> {
        let config = Config::load_with(base_path)?;
        let storage = storage::BackendLocal::new(base_path)
            .with_context(|| format!("failed to create {base_path}"))?;

        let bookmarks = Arc::new(BackendJson::load(storage.clone())?);
        let kv: Arc<dyn KvStore> = Arc::new(storage);

        Ok(Self::with_stores(config, bookmarks, kv, Path::new(base_path)))
    }

    pub fn with_stores(
        config: Config,
        bookmarks: Arc<dyn BookmarkStore>,
        kv: Arc<dyn KvStore>,
        base_path: &Path,
    ) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            library: Library::new(bookmarks, TagStore::new(kv)),
            base_path: base_path.to_path_buf(),
        }
    }

    pub fn config(&self) -> Config {
        self.config.read().unwrap().clone()
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    pub fn dir(&self) -> &Path {
        &self.base_path
    }

    pub fn new_session(&self, picker: Option<Arc<dyn FilePicker>>) -> Session {
        let config = self.config();
        let files = SessionFiles {
            picker,
            downloader: Arc::new(DirDownloader {
                dir: config.export_dir().to_path_buf(),
            }),
        };

        Session::new(self.library.clone(), files, config.debounce())
    }

    pub fn tagger(&self) -> anyhow::Result<DefaultTagger> {
        let config = self.config().tagging;
        Ok(Tagger::new(
            ChatTagGenerator::new(&config)?,
            HttpPages::new(config.timeout())?,
            self.library.tags().clone(),
        ))
    }

    pub fn batch_opts(&self) -> BatchOpts {
        let config = self.config().tagging;
        BatchOpts {
            size: config.batch_size,
            delay: config.batch_delay(),
        }
    }

    pub fn add_bookmark(&self, title: &str, url: &str) -> anyhow::Result<BookmarkRecord> {
        let node = self.library.bookmarks().create(BookmarkCreate {
            title: title.to_string(),
            url: url.to_string(),
            parent_id: None,
        })?;

        log::info!("added bookmark {url}");

        Ok(BookmarkRecord {
            id: node.id,
            title: node.title,
            url: node.url.unwrap_or_default(),
            date_added: node.date_added,
        })
    }
}
