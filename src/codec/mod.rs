//! Interchange formats for the bookmark + tag corpus.

mod delimited;
mod markup;
mod structured;

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::library::CorpusEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Comma separated values, tags joined with `;`
    Csv,
    /// JSON array of records
    Json,
    /// Netscape bookmark file
    Html,
}

impl Format {
    pub fn name(&self) -> &'static str {
        match self {
            Format::Csv => "csv",
            Format::Json => "json",
            Format::Html => "html",
        }
    }

    /// Case-insensitive lookup by name.
    pub fn from_name(name: &str) -> Option<Format> {
        match name.to_lowercase().as_str() {
            "csv" => Some(Format::Csv),
            "json" => Some(Format::Json),
            "html" => Some(Format::Html),
            _ => None,
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            Format::Csv => "text/csv",
            Format::Json => "application/json",
            Format::Html => "text/html",
        }
    }

    /// Parameters such as `; charset=utf-8` are ignored.
    pub fn from_content_type(content_type: &str) -> Option<Format> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();

        match essence.as_str() {
            "text/csv" | "application/csv" | "application/vnd.ms-excel" => Some(Format::Csv),
            "application/json" | "text/json" => Some(Format::Json),
            "text/html" => Some(Format::Html),
            _ => None,
        }
    }

    pub fn schema(&self) -> &'static str {
        match self {
            Format::Csv => "a header row `Title,URL,Date Added,Tags` followed by one row per bookmark",
            Format::Json => "a JSON array of {title, url, dateAdded, tags, favicon} objects",
            Format::Html => "a NETSCAPE-Bookmark-file-1 document with <A HREF> entries",
        }
    }
}

impl Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    #[error("invalid {format} file: {message}; expected {}", .format.schema())]
    Malformed { format: Format, message: String },

    #[error("failed to encode {format}: {message}")]
    Encode { format: Format, message: String },
}

impl CodecError {
    fn malformed(format: Format, message: impl Into<String>) -> Self {
        Self::Malformed {
            format,
            message: message.into(),
        }
    }

    fn encode(format: Format, message: impl Display) -> Self {
        Self::Encode {
            format,
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRecord {
    pub title: String,
    pub url: String,
    pub date_added: i64,
    pub tags: Vec<String>,
    pub favicon: Option<String>,
}

impl From<CorpusEntry> for ExportRecord {
    fn from(entry: CorpusEntry) -> Self {
        ExportRecord {
            title: entry.record.title,
            url: entry.record.url,
            date_added: entry.record.date_added,
            tags: entry.tags.tags,
            favicon: entry.tags.favicon,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRecord {
    pub title: String,
    pub url: String,
    pub tags: Vec<String>,
}

/// Content handed to the download trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportFile {
    pub filename: String,
    pub mime: String,
    /// number of bookmarks written
    pub count: usize,
    #[serde(skip)]
    pub content: String,
}

impl ExportFile {
    pub fn new(format: Format, content: String, count: usize, date: chrono::NaiveDate) -> Self {
        ExportFile {
            filename: format!("bookmarks-{date}.{}", format.name()),
            mime: format.mime().to_string(),
            count,
            content,
        }
    }
}

pub fn encode(records: &[ExportRecord], format: Format) -> Result<String, CodecError> {
    match format {
        Format::Csv => delimited::encode(records),
        Format::Json => structured::encode(records),
        Format::Html => Ok(markup::encode(records)),
    }
}

pub fn decode(bytes: &[u8], format: Format) -> Result<Vec<ImportRecord>, CodecError> {
    let records = match format {
        Format::Csv => delimited::decode(bytes)?,
        Format::Json => structured::decode(bytes)?,
        Format::Html => markup::decode(bytes)?,
    };

    if let Some(position) = records.iter().position(|r| r.url.trim().is_empty()) {
        return Err(CodecError::malformed(
            format,
            format!("record {} has no url", position + 1),
        ));
    }

    Ok(records)
}

/// Splits a joined tag list, dropping blanks.
fn split_tags(joined: &str, separator: char) -> Vec<String> {
    joined
        .split(separator)
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_lookup() {
        assert_eq!(Format::from_name("JSON"), Some(Format::Json));
        assert_eq!(Format::from_name("Html"), Some(Format::Html));
        assert_eq!(Format::from_name("xml"), None);

        assert_eq!(
            Format::from_content_type("text/csv; charset=utf-8"),
            Some(Format::Csv)
        );
        assert_eq!(Format::from_content_type("Application/JSON"), Some(Format::Json));
        assert_eq!(Format::from_content_type("text/plain"), None);
    }

    #[test]
    fn test_error_names_schema() {
        let err = decode(b"[{\"title\": 1}]", Format::Json).unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("invalid json file"), "{msg}");
        assert!(msg.contains("{title, url, dateAdded, tags, favicon}"), "{msg}");
    }

    #[test]
    fn test_export_filename() {
        let date = chrono::NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let file = ExportFile::new(Format::Html, String::new(), 0, date);
        assert_eq!(file.filename, "bookmarks-2024-03-09.html");
        assert_eq!(file.mime, "text/html");
    }
}
