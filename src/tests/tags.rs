use std::sync::Arc;

use serde_json::json;

use crate::storage::{KvStore, MemoryKv};
use crate::tags::{TagEntry, TagStore, TAGS_KEY};

fn store() -> (TagStore, Arc<MemoryKv>) {
    let kv = Arc::new(MemoryKv::default());
    (TagStore::new(kv.clone()), kv)
}

const URL: &str = "https://github.com/facebook/react";

#[test]
pub fn test_missing_url_is_empty() {
    let (tags, kv) = store();

    assert!(tags.get_all().unwrap().is_empty());
    assert!(tags.get_tags(URL).unwrap().is_empty());
    assert!(tags.get(URL).unwrap().is_none());

    // delete and rename on an absent url do not create an entry
    assert!(tags.delete_tag(URL, "react").unwrap().is_empty());
    assert!(tags.rename_tag(URL, "react", "vue").unwrap().is_empty());
    assert!(kv.get(TAGS_KEY).unwrap().is_none());
}

#[test]
pub fn test_set_tag_appends_once() {
    let (tags, _) = store();

    assert_eq!(tags.set_tag(URL, "react").unwrap(), vec!["react"]);
    assert_eq!(tags.set_tag(URL, "UI").unwrap(), vec!["react", "UI"]);
    assert_eq!(tags.set_tag(URL, "react").unwrap(), vec!["react", "UI"]);
    // exact-match dedup: case is significant
    assert_eq!(tags.set_tag(URL, "ui").unwrap(), vec!["react", "UI", "ui"]);

    let entry = tags.get(URL).unwrap().unwrap();
    assert_eq!(entry.favicon, None);
}

#[test]
pub fn test_delete_and_rename() {
    let (tags, _) = store();
    tags.set_entry(
        URL,
        TagEntry::new(
            vec!["react".into(), "js".into(), "framework".into()],
            Some("https://github.com/favicon.ico".into()),
        ),
    )
    .unwrap();

    assert_eq!(tags.delete_tag(URL, "js").unwrap(), vec!["react", "framework"]);
    assert_eq!(tags.delete_tag(URL, "js").unwrap(), vec!["react", "framework"]);

    assert_eq!(
        tags.rename_tag(URL, "framework", "library").unwrap(),
        vec!["react", "library"]
    );
    // renaming onto an existing tag folds the duplicate
    assert_eq!(tags.rename_tag(URL, "library", "react").unwrap(), vec!["react"]);

    // the favicon survives tag edits
    let entry = tags.get(URL).unwrap().unwrap();
    assert_eq!(entry.favicon.as_deref(), Some("https://github.com/favicon.ico"));
}

#[test]
pub fn test_other_entries_are_preserved() {
    let (tags, _) = store();
    tags.set_tag("https://a.com", "a").unwrap();
    tags.set_tag("https://b.com", "b").unwrap();
    tags.delete_tag("https://a.com", "a").unwrap();

    let all = tags.get_all().unwrap();
    assert_eq!(all.len(), 2);
    assert!(all["https://a.com"].tags.is_empty());
    assert_eq!(all["https://b.com"].tags, vec!["b"]);
}

#[test]
pub fn test_lenient_reads() {
    let (tags, kv) = store();
    kv.set(
        TAGS_KEY,
        json!({
            "https://a.com": {"tags": ["a", 1, null, "b"], "favicon": "https://a.com/i.png"},
            "https://b.com": {"tags": "not a list"},
            "https://c.com": {},
            "https://d.com": 42
        }),
    )
    .unwrap();

    let all = tags.get_all().unwrap();
    assert_eq!(all["https://a.com"].tags, vec!["a", "b"]);
    assert!(all["https://b.com"].tags.is_empty());
    assert!(all["https://c.com"].tags.is_empty());
    assert_eq!(all["https://d.com"], TagEntry::default());

    kv.set(TAGS_KEY, json!(["not", "a", "mapping"])).unwrap();
    assert!(tags.get_all().unwrap().is_empty());
}

#[test]
pub fn test_concurrent_writers_do_not_lose_updates() {
    let (tags, _) = store();

    let handles = (0..8)
        .map(|i| {
            let tags = tags.clone();
            std::thread::spawn(move || {
                for j in 0..10 {
                    tags.set_tag(&format!("https://site{i}.com"), &format!("t{j}"))
                        .unwrap();
                }
            })
        })
        .collect::<Vec<_>>();

    for handle in handles {
        handle.join().unwrap();
    }

    let all = tags.get_all().unwrap();
    assert_eq!(all.len(), 8);
    assert!(all.values().all(|entry| entry.tags.len() == 10));
}
