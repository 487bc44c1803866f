use std::fs;

use log::info;
use strum::{Display, EnumString};

use crate::config::StorageConfig;
use crate::database::Database;
use crate::error::BbuError;
use crate::records::{ImportEntry, RecordSummary, SerialRecord};

pub const ALL_HEADER: [&str; 3] = ["Serial Number", "Scan Count", "Last Used Date"];
pub const THRESHOLD_HEADER: [&str; 3] = ["Serial Number", "Scanned Count", "Last Scanned Time"];

pub const ALL_FILENAME: &str = "serialNumbers_History.csv";

#[derive(Clone, Copy, Debug, Display, EnumString, PartialEq, Eq)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ExportFormat {
    Csv,
    Json,
}

pub fn threshold_filename(threshold: i64) -> String {
    format!("above_threshold_{}.csv", threshold)
}

/// Every record as CSV with the full-history header.
pub fn export_all(db: &Database) -> Result<String, BbuError> {
    let records = SerialRecord::all(db)?;
    Ok(to_csv(&ALL_HEADER, &records))
}

/// Records above `threshold` as CSV with the threshold header.
pub fn export_above_threshold(db: &Database, threshold: i64) -> Result<String, BbuError> {
    let records = SerialRecord::above_threshold(db, threshold)?;
    Ok(to_csv(&THRESHOLD_HEADER, &records))
}

pub fn to_csv(header: &[&str; 3], records: &[RecordSummary]) -> String {
    let mut out = String::new();
    out.push_str(&header.join(","));
    out.push_str("\r\n");

    for record in records {
        out.push_str(&csv_escape(&record.serial));
        out.push(',');
        out.push_str(&record.total_count.to_string());
        out.push(',');
        out.push_str(&csv_escape(record.last_used.as_deref().unwrap_or("")));
        out.push_str("\r\n");
    }

    out
}

fn csv_escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// One parsed CSV record and the line it starts on.
struct CsvRecord {
    line: usize,
    fields: Vec<String>,
}

/// Splits CSV text into records, honoring double-quoted fields. Line breaks
/// inside quotes belong to the field; outside quotes `\n`, `\r\n` or a lone
/// `\r` ends the record.
fn split_csv_records(text: &str) -> Vec<CsvRecord> {
    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line = 1;
    let mut record_line = 1;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' if field.is_empty() => in_quotes = true,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            '\r' | '\n' if !in_quotes => {
                if c == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                fields.push(std::mem::take(&mut field));
                records.push(CsvRecord {
                    line: record_line,
                    fields: std::mem::take(&mut fields),
                });
                line += 1;
                record_line = line;
            }
            _ => {
                if c == '\n' {
                    line += 1;
                }
                field.push(c);
            }
        }
    }

    if !field.is_empty() || !fields.is_empty() {
        fields.push(field);
        records.push(CsvRecord {
            line: record_line,
            fields,
        });
    }

    records
}

/// Reads a CSV produced by [`export_all`] or [`export_above_threshold`] back
/// into import entries. The header row is skipped; blank lines are ignored.
pub fn parse_export_csv(text: &str) -> Result<Vec<ImportEntry>, BbuError> {
    let mut entries = Vec::new();

    for CsvRecord { line, fields } in split_csv_records(text).into_iter().skip(1) {
        if fields.len() == 1 && fields[0].trim().is_empty() {
            continue;
        }

        if fields.len() != 3 {
            return Err(BbuError::Error(format!(
                "Line {}: expected 3 fields, found {}",
                line,
                fields.len()
            )));
        }

        let total_count = fields[1].trim().parse::<i64>().map_err(|_| {
            BbuError::Error(format!("Line {}: invalid scan count '{}'", line, fields[1]))
        })?;

        let mut fields = fields.into_iter();
        let serial = fields.next().unwrap_or_default();
        let last_used = fields.nth(1).filter(|s| !s.is_empty());

        entries.push(ImportEntry {
            serial,
            total_count: Some(total_count),
            last_used,
            ..Default::default()
        });
    }

    Ok(entries)
}

/// Serializes every row as a JSON import document and writes it to the
/// configured snapshot path. Returns the document.
pub fn write_snapshot(db: &Database, storage: &StorageConfig) -> Result<String, BbuError> {
    let records = SerialRecord::all_records(db)?;
    let json = serde_json::to_string_pretty(&records)?;
    fs::write(&storage.snapshot_path, &json)?;

    info!(
        "Wrote snapshot of {} records to {}",
        records.len(),
        storage.snapshot_path.display()
    );

    Ok(json)
}
