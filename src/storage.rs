use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::RwLock,
};

use anyhow::Context;

use crate::eid::Eid;

pub trait StorageManager: Send + Sync {
    fn write(&self, ident: &str, data: &[u8]) -> std::io::Result<()>;
    fn read(&self, ident: &str) -> std::io::Result<Vec<u8>>;
    fn exists(&self, ident: &str) -> bool;
}

/// Persistent key-value store holding JSON documents.
///
/// A missing key reads as `None`; there is no partial update primitive, so
/// callers rewrite the whole value on every change.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> anyhow::Result<Option<serde_json::Value>>;
    fn set(&self, key: &str, value: serde_json::Value) -> anyhow::Result<()>;
}

#[derive(Clone, Debug)]
pub struct BackendLocal {
    pub base_dir: PathBuf,
}

impl BackendLocal {
    pub fn new(storage_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = storage_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&path)?;
        Ok(BackendLocal { base_dir: path })
    }

    fn path(&self, ident: &str) -> PathBuf {
        self.base_dir.join(ident)
    }
}

impl StorageManager for BackendLocal {
    fn exists(&self, ident: &str) -> bool {
        std::fs::metadata(self.path(ident)).is_ok()
    }

    fn read(&self, ident: &str) -> std::io::Result<Vec<u8>> {
        std::fs::read(self.path(ident))
    }

    fn write(&self, ident: &str, data: &[u8]) -> std::io::Result<()> {
        let temp_path = self.path(&format!("{}-{ident}", Eid::new()));

        std::fs::write(&temp_path, data)?;

        std::fs::rename(&temp_path, self.path(ident))
    }
}

impl KvStore for BackendLocal {
    fn get(&self, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
        let ident = format!("{key}.json");
        if !self.exists(&ident) {
            return Ok(None);
        }

        let data = self
            .read(&ident)
            .with_context(|| format!("failed to read {ident}"))?;
        let value = serde_json::from_slice(&data)
            .with_context(|| format!("{ident} is not valid json"))?;

        Ok(Some(value))
    }

    fn set(&self, key: &str, value: serde_json::Value) -> anyhow::Result<()> {
        let ident = format!("{key}.json");
        let data = serde_json::to_vec_pretty(&value)?;
        self.write(&ident, &data)
            .with_context(|| format!("failed to write {ident}"))
    }
}

/// Volatile store, used when durability is someone else's concern.
#[derive(Debug, Default)]
pub struct MemoryKv {
    values: RwLock<HashMap<String, serde_json::Value>>,
}

impl KvStore for MemoryKv {
    fn get(&self, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
        Ok(self.values.read().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: serde_json::Value) -> anyhow::Result<()> {
        self.values.write().unwrap().insert(key.to_string(), value);
        Ok(())
    }
}
