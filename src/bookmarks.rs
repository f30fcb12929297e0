use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use std::{
    sync::{Arc, RwLock},
    time::Instant,
};

use crate::storage::{BackendLocal, StorageManager};

const TREE_FILE: &str = "bookmarks.json";

/// A node of the bookmark tree. Folders have `children` and no `url`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkNode {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<BookmarkNode>>,
    #[serde(default)]
    pub date_added: i64,
}

/// A flattened bookmark. `date_added` is in unix milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkRecord {
    pub id: String,
    pub title: String,
    pub url: String,
    pub date_added: i64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BookmarkCreate {
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

pub trait BookmarkStore: Send + Sync {
    fn get_tree(&self) -> anyhow::Result<Vec<BookmarkNode>>;
    fn get_recent(&self, count: usize) -> anyhow::Result<Vec<BookmarkRecord>>;
    fn create(&self, bookmark: BookmarkCreate) -> anyhow::Result<BookmarkNode>;
}

/// Depth-first, pre-order flattening. Folders are dropped, order is kept.
pub fn flatten(nodes: &[BookmarkNode]) -> Vec<BookmarkRecord> {
    fn walk(node: &BookmarkNode, out: &mut Vec<BookmarkRecord>) {
        if let Some(url) = &node.url {
            out.push(BookmarkRecord {
                id: node.id.clone(),
                title: node.title.clone(),
                url: url.clone(),
                date_added: node.date_added,
            });
        }

        for child in node.children.iter().flatten() {
            walk(child, out);
        }
    }

    let mut out = vec![];
    for node in nodes {
        walk(node, &mut out);
    }
    out
}

/// Most recently added first; equal timestamps keep traversal order.
pub fn newest_first(mut records: Vec<BookmarkRecord>) -> Vec<BookmarkRecord> {
    records.sort_by(|a, b| b.date_added.cmp(&a.date_added));
    records
}

#[derive(Debug, Clone)]
pub struct BackendJson {
    tree: Arc<RwLock<Vec<BookmarkNode>>>,
    storage: BackendLocal,
}

impl BackendJson {
    pub fn load(storage: BackendLocal) -> anyhow::Result<Self> {
        if !storage.exists(TREE_FILE) {
            log::info!(
                "Creating new bookmark tree at {}",
                storage.base_dir.join(TREE_FILE).display()
            );
            storage.write(TREE_FILE, b"[]")?;
        }

        let now = Instant::now();
        let data = storage.read(TREE_FILE)?;
        let tree: Vec<BookmarkNode> =
            serde_json::from_slice(&data).context("bookmark tree is malformed")?;

        log::debug!(
            "took {}ms to read bookmark tree",
            now.elapsed().as_micros() as f64 / 1000.0
        );

        Ok(BackendJson {
            tree: Arc::new(RwLock::new(tree)),
            storage,
        })
    }

    fn save(&self, tree: &[BookmarkNode]) -> anyhow::Result<()> {
        let data = serde_json::to_vec_pretty(tree)?;
        self.storage.write(TREE_FILE, &data)?;
        Ok(())
    }

    #[cfg(test)]
    pub fn create_folder(&self, title: &str, parent_id: Option<&str>) -> anyhow::Result<String> {
        let mut tree = self.tree.write().unwrap();
        let folder = BookmarkNode {
            id: next_id(&tree).to_string(),
            title: title.to_string(),
            url: None,
            children: Some(vec![]),
            date_added: chrono::Utc::now().timestamp_millis(),
        };
        let id = folder.id.clone();
        insert(&mut tree, folder, parent_id)?;
        self.save(&tree)?;
        Ok(id)
    }
}

fn next_id(nodes: &[BookmarkNode]) -> u64 {
    fn max_id(nodes: &[BookmarkNode]) -> u64 {
        nodes
            .iter()
            .map(|node| {
                let own = node.id.parse::<u64>().unwrap_or_default();
                let nested = node.children.as_deref().map(max_id).unwrap_or_default();
                own.max(nested)
            })
            .max()
            .unwrap_or_default()
    }

    max_id(nodes) + 1
}

fn find_folder<'a>(nodes: &'a mut [BookmarkNode], id: &str) -> Option<&'a mut Vec<BookmarkNode>> {
    for node in nodes.iter_mut() {
        let Some(children) = node.children.as_mut() else {
            continue;
        };

        if node.id == id {
            return Some(children);
        }

        if let Some(found) = find_folder(children, id) {
            return Some(found);
        }
    }

    None
}

fn insert(
    tree: &mut Vec<BookmarkNode>,
    node: BookmarkNode,
    parent_id: Option<&str>,
) -> anyhow::Result<()> {
    match parent_id {
        Some(parent_id) => find_folder(tree, parent_id)
            .ok_or_else(|| anyhow!("folder {parent_id} not found"))?
            .push(node),
        None => tree.push(node),
    }
    Ok(())
}

impl BookmarkStore for BackendJson {
    fn get_tree(&self) -> anyhow::Result<Vec<BookmarkNode>> {
        Ok(self.tree.read().unwrap().clone())
    }

    fn get_recent(&self, count: usize) -> anyhow::Result<Vec<BookmarkRecord>> {
        let records = flatten(&self.tree.read().unwrap());
        Ok(newest_first(records).into_iter().take(count).collect())
    }

    fn create(&self, bookmark: BookmarkCreate) -> anyhow::Result<BookmarkNode> {
        if bookmark.url.trim().is_empty() {
            anyhow::bail!("bookmark url is empty");
        }

        let mut tree = self.tree.write().unwrap();

        let node = BookmarkNode {
            id: next_id(&tree).to_string(),
            title: bookmark.title,
            url: Some(bookmark.url),
            children: None,
            date_added: chrono::Utc::now().timestamp_millis(),
        };

        insert(&mut tree, node.clone(), bookmark.parent_id.as_deref())?;
        self.save(&tree)?;

        log::debug!("created bookmark {} ({})", node.id, node.url.as_deref().unwrap_or_default());

        Ok(node)
    }
}
