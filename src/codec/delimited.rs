use chrono::{DateTime, SecondsFormat};

use super::{split_tags, CodecError, ExportRecord, Format, ImportRecord};

const HEADERS: [&str; 4] = ["Title", "URL", "Date Added", "Tags"];
const TAG_SEPARATOR: char = ';';
const BOM: &[u8] = b"\xEF\xBB\xBF";

pub fn encode(records: &[ExportRecord]) -> Result<String, CodecError> {
    let mut out = HEADERS.join(",").into_bytes();
    out.push(b'\n');

    let mut csv_wrt = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(out);

    for record in records {
        let date_added = DateTime::from_timestamp_millis(record.date_added)
            .map(|date| date.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_default();

        csv_wrt
            .write_record([
                record.title.as_str(),
                record.url.as_str(),
                date_added.as_str(),
                record.tags.join(&TAG_SEPARATOR.to_string()).as_str(),
            ])
            .map_err(|err| CodecError::encode(Format::Csv, err))?;
    }

    let out = csv_wrt
        .into_inner()
        .map_err(|err| CodecError::encode(Format::Csv, err))?;

    String::from_utf8(out).map_err(|err| CodecError::encode(Format::Csv, err))
}

pub fn decode(bytes: &[u8]) -> Result<Vec<ImportRecord>, CodecError> {
    let bytes = bytes.strip_prefix(BOM).unwrap_or(bytes);
    let malformed = |message: String| CodecError::malformed(Format::Csv, message);

    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(bytes);

    let headers = csv_reader
        .headers()
        .map_err(|err| malformed(err.to_string()))?;

    let header_matches = headers.len() == HEADERS.len()
        && headers
            .iter()
            .zip(HEADERS)
            .all(|(found, expected)| found.trim().eq_ignore_ascii_case(expected));
    if !header_matches {
        let found = headers.iter().collect::<Vec<_>>().join(",");
        return Err(malformed(format!("unexpected header `{found}`")));
    }

    let mut records = vec![];
    for row in csv_reader.records() {
        let row = row.map_err(|err| malformed(err.to_string()))?;
        records.push(ImportRecord {
            title: row.get(0).unwrap_or_default().to_string(),
            url: row.get(1).unwrap_or_default().trim().to_string(),
            tags: split_tags(row.get(3).unwrap_or_default(), TAG_SEPARATOR),
        });
    }

    Ok(records)
}
