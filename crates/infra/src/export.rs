//! Snapshot serialization: the canonical CSV layout and the plain-text export.
//!
//! The CSV layout is also the on-disk format of the file-backed ledger, so
//! the raw store artifact and the tabular export are byte-for-byte the same
//! thing.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::Deserialize;

use roster_core::{Lang, ParticipantRecord, SourceTag, UserId};

use crate::ledger::{LedgerError, LedgerResult};

/// Column order of every export and of the stored file.
pub const COLUMNS: [&str; 7] = [
    "user_id",
    "username",
    "full_name",
    "first_seen",
    "last_participated",
    "source",
    "lang",
];

/// Export format requested by the caller.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ExportFormat {
    /// Comma-separated with quoting, rows in storage order.
    #[default]
    Csv,
    /// Tab-separated plain text, newest participation first.
    Tsv,
}

impl ExportFormat {
    /// Resolve a requested format name; unknown names fall back to CSV.
    pub fn parse(name: Option<&str>) -> Self {
        match name.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("tsv" | "txt" | "text" | "tab") => ExportFormat::Tsv,
            _ => ExportFormat::Csv,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Tsv => "text/tab-separated-values; charset=utf-8",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "participants.csv",
            ExportFormat::Tsv => "participants.tsv",
        }
    }

    pub fn encode(&self, records: &[ParticipantRecord]) -> LedgerResult<Vec<u8>> {
        match self {
            ExportFormat::Csv => encode_csv(records),
            ExportFormat::Tsv => Ok(encode_tsv(records)),
        }
    }
}

/// Fixed-width UTC timestamp; sorts lexicographically in time order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an RFC 3339 timestamp, or a naive ISO-8601 one taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = raw.parse::<DateTime<Utc>>() {
        return Some(ts);
    }
    raw.parse::<NaiveDateTime>().ok().map(|naive| naive.and_utc())
}

pub fn encode_csv(records: &[ParticipantRecord]) -> LedgerResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(COLUMNS)?;
    for r in records {
        writer.write_record([
            r.user_id.to_string().as_str(),
            r.username.as_str(),
            r.full_name.as_str(),
            format_timestamp(&r.first_seen).as_str(),
            format_timestamp(&r.last_participated).as_str(),
            r.source.as_str(),
            r.lang.as_str(),
        ])?;
    }
    writer
        .into_inner()
        .map_err(|e| LedgerError::Csv(e.into_error().into()))
}

/// Tab-separated export, newest first; tabs and line breaks in text fields become spaces.
pub fn encode_tsv(records: &[ParticipantRecord]) -> Vec<u8> {
    let mut sorted = records.to_vec();
    sorted.sort_by(|a, b| b.last_participated.cmp(&a.last_participated));

    let mut out = COLUMNS.join("\t");
    out.push('\n');
    for r in &sorted {
        let fields = [
            r.user_id.to_string(),
            flatten(&r.username),
            flatten(&r.full_name),
            format_timestamp(&r.first_seen),
            format_timestamp(&r.last_participated),
            flatten(r.source.as_str()),
            r.lang.as_str().to_string(),
        ];
        out.push_str(&fields.join("\t"));
        out.push('\n');
    }
    out.into_bytes()
}

fn flatten(field: &str) -> String {
    field.replace(['\t', '\r', '\n'], " ")
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    user_id: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    full_name: String,
    first_seen: String,
    last_participated: String,
    source: String,
    #[serde(default)]
    lang: Option<String>,
}

/// Decode the canonical CSV layout.
///
/// Missing or unsupported `lang` values read as the default language; rows with
/// an unparsable id, timestamp or empty source are reported as corrupt.
pub fn decode_csv(bytes: &[u8]) -> LedgerResult<Vec<ParticipantRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes);

    let mut records = Vec::new();
    for (idx, row) in reader.deserialize::<CsvRow>().enumerate() {
        let row = row?;
        // +2: one for the header, one for 1-based line numbers.
        let line = idx + 2;
        records.push(decode_row(row).map_err(|e| LedgerError::corrupt(format!("line {line}: {e}")))?);
    }
    Ok(records)
}

fn decode_row(row: CsvRow) -> Result<ParticipantRecord, String> {
    let user_id: UserId = row.user_id.parse().map_err(|e| format!("{e}"))?;
    let first_seen = parse_timestamp(&row.first_seen)
        .ok_or_else(|| format!("bad first_seen {:?}", row.first_seen))?;
    let last_participated = parse_timestamp(&row.last_participated)
        .ok_or_else(|| format!("bad last_participated {:?}", row.last_participated))?;
    let source = SourceTag::new(row.source).map_err(|e| e.to_string())?;

    Ok(ParticipantRecord {
        user_id,
        username: row.username,
        full_name: row.full_name,
        first_seen,
        last_participated: last_participated.max(first_seen),
        source,
        lang: Lang::or_default(row.lang.as_deref()),
    })
}
