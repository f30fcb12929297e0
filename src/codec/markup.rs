use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

use super::{split_tags, CodecError, ExportRecord, Format, ImportRecord};

const DOCTYPE: &str = "<!DOCTYPE NETSCAPE-Bookmark-file-1>";
const TAGS_LINE_PREFIX: &str = "Tags:";

static ANCHOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("valid anchor selector"));

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn encode(records: &[ExportRecord]) -> String {
    let mut out = String::new();
    out.push_str(DOCTYPE);
    out.push('\n');
    out.push_str("<!-- This is an automatically generated file.\n     It will be read and overwritten.\n     DO NOT EDIT! -->\n");
    out.push_str("<META HTTP-EQUIV=\"Content-Type\" CONTENT=\"text/html; charset=UTF-8\">\n");
    out.push_str("<TITLE>Bookmarks</TITLE>\n");
    out.push_str("<H1>Bookmarks</H1>\n");
    out.push_str("<DL><p>\n");

    for record in records {
        let mut attrs = format!(
            "HREF=\"{}\" ADD_DATE=\"{}\"",
            escape(&record.url),
            record.date_added.div_euclid(1000)
        );
        if !record.tags.is_empty() {
            attrs.push_str(&format!(" TAGS=\"{}\"", escape(&record.tags.join(","))));
        }
        if let Some(favicon) = &record.favicon {
            attrs.push_str(&format!(" ICON_URI=\"{}\"", escape(favicon)));
        }

        out.push_str(&format!("    <DT><A {attrs}>{}</A>\n", escape(&record.title)));

        if !record.tags.is_empty() {
            out.push_str(&format!(
                "    <DD>{TAGS_LINE_PREFIX} {}\n",
                escape(&record.tags.join(", "))
            ));
        }
    }

    out.push_str("</DL><p>\n");
    out
}

/// Tags come from the `TAGS` attribute, else from a `<DD>Tags: ...` line
/// directly following the entry.
pub fn decode(bytes: &[u8]) -> Result<Vec<ImportRecord>, CodecError> {
    let text = String::from_utf8_lossy(bytes);
    if !text
        .trim_start()
        .get(..DOCTYPE.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(DOCTYPE))
    {
        return Err(CodecError::malformed(
            Format::Html,
            "missing NETSCAPE-Bookmark-file-1 doctype",
        ));
    }

    let document = Html::parse_document(&text);

    let records = document
        .select(&ANCHOR_SELECTOR)
        .map(|anchor| {
            let tags = match anchor.value().attr("tags") {
                Some(tags) => split_tags(tags, ','),
                None => annotation_tags(anchor),
            };

            ImportRecord {
                title: anchor.text().collect::<String>().trim().to_string(),
                url: anchor.value().attr("href").unwrap_or_default().trim().to_string(),
                tags,
            }
        })
        .collect();

    Ok(records)
}

fn annotation_tags(anchor: ElementRef) -> Vec<String> {
    let annotation = anchor
        .parent()
        .and_then(|entry| entry.next_siblings().find_map(ElementRef::wrap))
        .filter(|sibling| sibling.value().name() == "dd")
        .map(|dd| dd.text().collect::<String>());

    match annotation {
        Some(line) => match line.trim().strip_prefix(TAGS_LINE_PREFIX) {
            Some(tags) => split_tags(tags, ','),
            None => vec![],
        },
        None => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_escapes_and_annotates() {
        let out = encode(&[ExportRecord {
            title: "Q&A <beta>".to_string(),
            url: "https://example.com/?a=1&b=\"2\"".to_string(),
            date_added: 1_700_000_000_999,
            tags: vec!["qa".to_string(), "forum".to_string()],
            favicon: None,
        }]);

        assert!(out.starts_with(DOCTYPE));
        assert!(out.contains(
            "<DT><A HREF=\"https://example.com/?a=1&amp;b=&quot;2&quot;\" ADD_DATE=\"1700000000\" TAGS=\"qa,forum\">Q&amp;A &lt;beta&gt;</A>"
        ));
        assert!(out.contains("<DD>Tags: qa, forum\n"));
    }

    #[test]
    fn test_decode_reads_own_output() {
        let out = encode(&[
            ExportRecord {
                title: "Q&A <beta>".to_string(),
                url: "https://example.com/?a=1&b=2".to_string(),
                date_added: 0,
                tags: vec!["qa".to_string(), "forum".to_string()],
                favicon: Some("https://example.com/icon.png".to_string()),
            },
            ExportRecord {
                title: "Untagged".to_string(),
                url: "https://untagged.example".to_string(),
                date_added: 0,
                tags: vec![],
                favicon: None,
            },
        ]);

        let records = decode(out.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title, "Q&A <beta>");
        assert_eq!(records[0].url, "https://example.com/?a=1&b=2");
        assert_eq!(records[0].tags, vec!["qa", "forum"]);
        assert_eq!(records[1].tags, Vec::<String>::new());
    }

    #[test]
    fn test_decode_reads_annotation_lines() {
        let input = r#"<!DOCTYPE NETSCAPE-Bookmark-file-1>
<META HTTP-EQUIV="Content-Type" CONTENT="text/html; charset=UTF-8">
<TITLE>Bookmarks</TITLE>
<H1>Bookmarks</H1>
<DL><p>
    <DT><A HREF="https://untagged.example" ADD_DATE="0">Untagged</A>
    <DT><A HREF="https://docs.rs" ADD_DATE="0">Docs.rs</A>
    <DD>Tags: rust, docs &amp; crates
    <DT><A HREF="https://tokio.rs">Tokio</A>
    <DD>An async runtime
</DL><p>
"#;

        let records = decode(input.as_bytes()).unwrap();
        assert_eq!(records.len(), 3);

        assert_eq!(records[0].url, "https://untagged.example");
        assert!(records[0].tags.is_empty());

        assert_eq!(records[1].title, "Docs.rs");
        assert_eq!(records[1].tags, vec!["rust", "docs & crates"]);

        // a description is not a tag line
        assert!(records[2].tags.is_empty());
    }

    #[test]
    fn test_decode_requires_doctype() {
        let err = decode(b"<html><body><a href=\"https://a.com\">a</a></body></html>").unwrap_err();
        assert!(err.to_string().contains("missing NETSCAPE-Bookmark-file-1 doctype"));
    }
}
