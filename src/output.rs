use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::Result;

/// Byte-order marker so spreadsheet tools pick the file up as UTF-8.
const BOM: &str = "\u{feff}";

/// Flattened row as persisted: one store joined with its prefecture and
/// municipality names. `store_url` is the dedup key; the field names double
/// as the CSV header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreRecord {
    pub prefecture: String,
    pub municipality: String,
    pub store_name: String,
    pub store_url: String,
    pub opening_date: String,
}

/// Append one record, deduplicating by store URL. Returns whether the write
/// succeeded; failures are logged rather than raised so a long run keeps
/// going past a bad row.
pub fn append_store(record: &StoreRecord, path: &Path) -> bool {
    match try_append(record, path) {
        Ok(()) => true,
        Err(e) => {
            error!("failed to persist {}: {e}", record.store_url);
            false
        }
    }
}

fn try_append(record: &StoreRecord, path: &Path) -> Result<()> {
    let mut rows = if path.exists() {
        load_records(path)?
    } else {
        Vec::new()
    };
    rows.push(record.clone());

    // Keep the first occurrence of each store URL; a re-scrape must not
    // duplicate or override what is already on disk.
    let mut seen = HashSet::new();
    rows.retain(|r| seen.insert(r.store_url.clone()));

    write_records(&rows, path)
}

/// Read all records back from a CSV written by [`write_records`].
pub fn load_records(path: &Path) -> Result<Vec<StoreRecord>> {
    let raw = fs::read_to_string(path)?;
    let body = raw.strip_prefix(BOM).unwrap_or(&raw);

    let mut reader = csv::Reader::from_reader(body.as_bytes());
    let mut rows = Vec::new();
    for row in reader.deserialize::<StoreRecord>() {
        rows.push(row?);
    }
    Ok(rows)
}

/// Rewrite the destination in full: BOM, header row, one row per store.
pub fn write_records(rows: &[StoreRecord], path: &Path) -> Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(BOM.as_bytes())?;

    let mut writer = csv::Writer::from_writer(file);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

// ── Tests ──
