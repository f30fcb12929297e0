use serde::Deserialize;

use super::{CodecError, ExportRecord, Format, ImportRecord};

/// Import side is looser than the export side: only `url` is required and
/// `dateAdded`/`favicon` are ignored.
#[derive(Deserialize)]
struct JsonRecord {
    #[serde(default)]
    title: String,
    url: String,
    #[serde(default)]
    tags: Vec<String>,
}

pub fn encode(records: &[ExportRecord]) -> Result<String, CodecError> {
    serde_json::to_string_pretty(records).map_err(|err| CodecError::encode(Format::Json, err))
}

pub fn decode(bytes: &[u8]) -> Result<Vec<ImportRecord>, CodecError> {
    let records: Vec<JsonRecord> = serde_json::from_slice(bytes)
        .map_err(|err| CodecError::malformed(Format::Json, err.to_string()))?;

    Ok(records
        .into_iter()
        .map(|record| ImportRecord {
            title: record.title,
            url: record.url,
            tags: record.tags,
        })
        .collect())
}
