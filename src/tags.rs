use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::{
    collections::{BTreeMap, HashSet},
    sync::{Arc, Mutex},
};

use crate::storage::KvStore;

/// Key of the url → tags mapping inside the key-value store.
pub const TAGS_KEY: &str = "bookmarkTags";

pub type TagMap = BTreeMap<String, TagEntry>;

/// Tags stored for one url. Case is preserved, duplicates are exact-match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagEntry {
    #[serde(default, deserialize_with = "lenient_tags")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub favicon: Option<String>,
}

impl TagEntry {
    pub fn new(tags: Vec<String>, favicon: Option<String>) -> Self {
        let mut entry = TagEntry { tags, favicon };
        entry.dedup();
        entry
    }

    fn dedup(&mut self) {
        let mut seen = HashSet::new();
        self.tags.retain(|tag| seen.insert(tag.clone()));
    }
}

/// Anything that is not an array reads as no tags; non-string items are dropped.
fn lenient_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let tags = match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(tag) => Some(tag),
                _ => None,
            })
            .collect(),
        _ => vec![],
    };

    Ok(tags)
}

/// Accessor for the shared url → [`TagEntry`] mapping.
///
/// Every mutation reads the whole mapping, changes one entry and writes the
/// whole mapping back. Writers inside this process are serialized; writers in
/// other processes are not, and the last write wins.
#[derive(Clone)]
pub struct TagStore {
    kv: Arc<dyn KvStore>,
    write_lock: Arc<Mutex<()>>,
}

impl TagStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self {
            kv,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn get_all(&self) -> anyhow::Result<TagMap> {
        let Some(value) = self.kv.get(TAGS_KEY)? else {
            return Ok(TagMap::new());
        };

        let Value::Object(entries) = value else {
            log::warn!("{TAGS_KEY} is not a mapping, treating it as empty");
            return Ok(TagMap::new());
        };

        let map = entries
            .into_iter()
            .map(|(url, raw)| {
                let entry = serde_json::from_value::<TagEntry>(raw).unwrap_or_else(|err| {
                    log::warn!("malformed tag entry for {url}: {err}");
                    TagEntry::default()
                });
                (url, entry)
            })
            .collect();

        Ok(map)
    }

    pub fn get(&self, url: &str) -> anyhow::Result<Option<TagEntry>> {
        Ok(self.get_all()?.remove(url))
    }

    pub fn get_tags(&self, url: &str) -> anyhow::Result<Vec<String>> {
        Ok(self.get(url)?.map(|entry| entry.tags).unwrap_or_default())
    }

    /// Adds `tag` unless an identical one is already present.
    pub fn set_tag(&self, url: &str, tag: &str) -> anyhow::Result<Vec<String>> {
        self.update(url, true, |entry| {
            if entry.tags.iter().any(|t| t == tag) {
                return false;
            }
            entry.tags.push(tag.to_string());
            true
        })
    }

    pub fn delete_tag(&self, url: &str, tag: &str) -> anyhow::Result<Vec<String>> {
        self.update(url, false, |entry| {
            let before = entry.tags.len();
            entry.tags.retain(|t| t != tag);
            entry.tags.len() != before
        })
    }

    /// Replaces every `old` with `new`. If `new` was already present the
    /// duplicate is folded into its first occurrence.
    pub fn rename_tag(&self, url: &str, old: &str, new: &str) -> anyhow::Result<Vec<String>> {
        self.update(url, false, |entry| {
            if !entry.tags.iter().any(|t| t == old) {
                return false;
            }
            for tag in entry.tags.iter_mut().filter(|t| *t == old) {
                *tag = new.to_string();
            }
            entry.dedup();
            true
        })
    }

    /// Overwrites the entry for `url`.
    pub fn set_entry(&self, url: &str, entry: TagEntry) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock().unwrap();

        let mut map = self.get_all()?;
        map.insert(url.to_string(), entry);
        self.write(&map)
    }

    fn update(
        &self,
        url: &str,
        create: bool,
        mutate: impl FnOnce(&mut TagEntry) -> bool,
    ) -> anyhow::Result<Vec<String>> {
        let _guard = self.write_lock.lock().unwrap();

        let mut map = self.get_all()?;
        let existed = map.contains_key(url);
        if !existed && !create {
            return Ok(vec![]);
        }

        let entry = map.entry(url.to_string()).or_default();
        let changed = mutate(entry);
        let tags = entry.tags.clone();

        if changed {
            self.write(&map)?;
        }

        Ok(tags)
    }

    fn write(&self, map: &TagMap) -> anyhow::Result<()> {
        self.kv.set(TAGS_KEY, serde_json::to_value(map)?)
    }
}
