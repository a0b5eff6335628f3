use anyhow::{Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

use super::{StoreFuture, TermStore};
use crate::backup;
use crate::termbase::{RawTable, TermTable};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Reads a CSV file's bytes, skipping a leading BOM. Rows may be ragged.
pub fn read_csv_table(bytes: &[u8]) -> Result<RawTable> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);
    let mut records = reader.records();
    let Some(first) = records.next() else {
        return Ok(RawTable::default());
    };
    let headers = first
        .with_context(|| "failed to read csv header")?
        .iter()
        .map(|value| value.to_string())
        .collect();
    let mut rows = Vec::new();
    for (idx, record) in records.enumerate() {
        let record = record.with_context(|| format!("failed to read csv row {}", idx + 2))?;
        rows.push(record.iter().map(|value| value.to_string()).collect());
    }
    Ok(RawTable { headers, rows })
}

/// Serializes with a UTF-8 BOM so spreadsheet tools detect the encoding.
pub fn write_csv_table(raw: &RawTable) -> Result<Vec<u8>> {
    let mut out = UTF8_BOM.to_vec();
    {
        let mut writer = WriterBuilder::new().flexible(true).from_writer(&mut out);
        writer.write_record(&raw.headers)?;
        for row in &raw.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
    }
    Ok(out)
}

#[derive(Debug, Clone)]
pub struct CsvStore {
    path: PathBuf,
    backup: bool,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>, backup: bool) -> Self {
        Self {
            path: path.into(),
            backup,
        }
    }

    fn load_sync(&self) -> Result<RawTable> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "termbase file not found; starting empty");
            return Ok(RawTable::default());
        }
        let bytes = fs::read(&self.path)
            .with_context(|| format!("failed to read termbase: {}", self.path.display()))?;
        read_csv_table(&bytes)
            .with_context(|| format!("failed to parse termbase: {}", self.path.display()))
    }

    fn save_sync(&self, table: &TermTable) -> Result<()> {
        if self.backup && self.path.is_file() {
            if let Err(err) = backup::backup_termbase(&self.path, backup::DEFAULT_TTL_DAYS) {
                warn!("termbase backup failed: {:#}", err);
            }
        }
        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create directory: {}", dir.display()))?;
        }
        let bytes = write_csv_table(&table.to_raw())?;
        fs::write(&self.path, bytes)
            .with_context(|| format!("failed to write termbase: {}", self.path.display()))?;
        debug!(path = %self.path.display(), rows = table.len(), "termbase saved");
        Ok(())
    }
}

impl TermStore for CsvStore {
    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }

    fn load(&self) -> StoreFuture<'_, RawTable> {
        Box::pin(async move { self.load_sync() })
    }

    fn save<'a>(&'a self, table: &'a TermTable) -> StoreFuture<'a, ()> {
        Box::pin(async move { self.save_sync(table) })
    }
}
