use std::future::Future;

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

/// What the tag generator gets to see of a page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetadata {
    pub url: String,
    pub title: String,
    pub description: String,
    pub keywords: String,
    pub favicon: Option<String>,
}

impl PageMetadata {
    /// Used when the page could not be fetched.
    pub fn basic(url: &str, title: &str) -> Self {
        PageMetadata {
            url: url.to_string(),
            title: title.to_string(),
            favicon: fallback_favicon(url),
            ..Default::default()
        }
    }
}

static META_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("meta").expect("valid meta selector"));
static ICON_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("link[rel*=icon][href]").expect("valid icon selector"));

pub fn parse_page(html: &str, url: &str, title: &str) -> PageMetadata {
    let document = Html::parse_document(html);

    let mut description = None;
    let mut og_description = None;
    let mut keywords = None;

    for element in document.select(&META_SELECTOR) {
        let meta_key = element
            .attr("name")
            .or(element.attr("property"))
            .unwrap_or_default()
            .to_lowercase();
        let meta_value = element.attr("content").unwrap_or_default().trim();
        if meta_value.is_empty() {
            continue;
        }

        match meta_key.as_str() {
            "description" if description.is_none() => description = Some(meta_value),
            "og:description" if og_description.is_none() => og_description = Some(meta_value),
            "keywords" if keywords.is_none() => keywords = Some(meta_value),
            _ => {}
        }
    }

    let favicon = document
        .select(&ICON_SELECTOR)
        .filter_map(|element| element.attr("href"))
        .find_map(|href| resolve_icon(url, href))
        .or_else(|| fallback_favicon(url));

    PageMetadata {
        url: url.to_string(),
        title: title.to_string(),
        description: description.or(og_description).unwrap_or_default().to_string(),
        keywords: keywords.unwrap_or_default().to_string(),
        favicon,
    }
}

fn resolve_icon(page_url: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    if href.starts_with("data:") {
        log::debug!("base64 icons are not supported");
        return None;
    }

    let base = url::Url::parse(page_url).ok()?;
    base.join(href).ok().map(|icon| icon.to_string())
}

/// `<scheme>://<host>/favicon.ico`
pub fn fallback_favicon(page_url: &str) -> Option<String> {
    let parsed = url::Url::parse(page_url).ok()?;
    let host = parsed.host_str()?;
    let port = parsed.port().map(|p| format!(":{p}")).unwrap_or_default();
    Some(format!("{}://{host}{port}/favicon.ico", parsed.scheme()))
}

/// Where page metadata comes from.
pub trait PageSource: Send + Sync {
    /// Never fails: an unreachable page yields [`PageMetadata::basic`].
    fn fetch(&self, url: &str, title: &str) -> impl Future<Output = PageMetadata> + Send;
}

pub struct HttpPages {
    client: reqwest::Client,
}

impl HttpPages {
    pub fn new(timeout: std::time::Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tagmark/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    async fn get_html(&self, url: &str) -> reqwest::Result<String> {
        self.client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
}

impl PageSource for HttpPages {
    async fn fetch(&self, url: &str, title: &str) -> PageMetadata {
        match self.get_html(url).await {
            Ok(html) => parse_page(&html, url, title),
            Err(err) => {
                log::warn!("failed to fetch {url}: {err}");
                PageMetadata::basic(url, title)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_page() {
        let html = r#"<html><head>
            <meta property="og:description" content="og text">
            <meta name="Description" content="plain text">
            <meta name="keywords" content="rust, async">
            <link rel="shortcut icon" href="/static/icon.png">
        </head><body></body></html>"#;

        let meta = parse_page(html, "https://example.com/blog/post", "Post");
        assert_eq!(meta.title, "Post");
        assert_eq!(meta.description, "plain text");
        assert_eq!(meta.keywords, "rust, async");
        assert_eq!(
            meta.favicon.as_deref(),
            Some("https://example.com/static/icon.png")
        );
    }

    #[test]
    fn test_og_description_and_relative_icon() {
        let html = r#"<head>
            <meta property="og:description" content="og text">
            <link rel="icon" href="data:image/png;base64,AAAA">
            <link rel="icon" href="favicon.svg">
        </head>"#;

        let meta = parse_page(html, "https://example.com/docs/", "");
        assert_eq!(meta.description, "og text");
        assert_eq!(
            meta.favicon.as_deref(),
            Some("https://example.com/docs/favicon.svg")
        );
    }

    #[test]
    fn test_favicon_fallback() {
        let meta = parse_page("<p>no head</p>", "http://localhost:3000/x", "x");
        assert_eq!(
            meta.favicon.as_deref(),
            Some("http://localhost:3000/favicon.ico")
        );
        assert_eq!(meta.description, "");

        assert_eq!(PageMetadata::basic("not a url", "t").favicon, None);
    }
}
