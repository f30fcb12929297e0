mod tags;
mod web;

use serde_json::{json, Value};

use crate::{app::App, tags::TagEntry};

/// Creates an isolated App in a unique temp directory, so parallel tests
/// never collide and no real data is touched.
pub fn create_app() -> (App, tempfile::TempDir) {
    create_app_with(None, "")
}

/// Like [`create_app`], with a bookmark tree and config written before the
/// app is opened.
pub fn create_app_with(tree: Option<Value>, config_yaml: &str) -> (App, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("failed to create temp dir");

    if let Some(tree) = tree {
        std::fs::write(tmp.path().join("bookmarks.json"), tree.to_string())
            .expect("failed to write bookmark tree");
    }
    if !config_yaml.is_empty() {
        std::fs::write(tmp.path().join("config.yaml"), config_yaml)
            .expect("failed to write config");
    }

    let app = App::open(tmp.path().to_str().unwrap()).expect("failed to open app");
    (app, tmp)
}

/// Two folders, four distinct urls and one url bookmarked twice.
pub fn sample_tree() -> Value {
    json!([
        {
            "id": "1",
            "title": "Bookmarks bar",
            "dateAdded": 0,
            "children": [
                {
                    "id": "2",
                    "title": "GitHub - facebook/react",
                    "url": "https://github.com/facebook/react",
                    "dateAdded": 1000
                },
                {
                    "id": "3",
                    "title": "Vue.js",
                    "url": "https://vuejs.org",
                    "dateAdded": 3000
                },
                {
                    "id": "4",
                    "title": "Dev",
                    "dateAdded": 0,
                    "children": [
                        {
                            "id": "5",
                            "title": "Rust Programming Language",
                            "url": "https://www.rust-lang.org",
                            "dateAdded": 2000
                        },
                        {
                            "id": "6",
                            "title": "React mirror",
                            "url": "https://github.com/facebook/react",
                            "dateAdded": 5000
                        }
                    ]
                }
            ]
        },
        {
            "id": "7",
            "title": "Svelte",
            "url": "https://svelte.dev",
            "dateAdded": 4000
        }
    ])
}

pub fn sample_app() -> (App, tempfile::TempDir) {
    let (app, tmp) = create_app_with(Some(sample_tree()), "");
    tag(&app, "https://github.com/facebook/react", &["react", "framework"]);
    tag(&app, "https://vuejs.org", &["vue", "javascript"]);
    (app, tmp)
}

pub fn tag(app: &App, url: &str, tags: &[&str]) {
    let tags = tags.iter().map(|t| t.to_string()).collect();
    app.library()
        .tags()
        .set_entry(url, TagEntry::new(tags, None))
        .expect("failed to store tags");
}

pub fn urls<'a>(results: impl IntoIterator<Item = &'a crate::search::SearchResult>) -> Vec<&'a str> {
    results.into_iter().map(|r| r.url.as_str()).collect()
}
