use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::debug;

use crate::paths;

const META_FILE_NAME: &str = "meta.json";
const SECONDS_PER_DAY: i64 = 86_400;
pub const DEFAULT_TTL_DAYS: i64 = 30;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BackupEntry {
    pub id: String,
    pub src: String,
    pub backup: String,
    pub created_at: i64,
    pub expires_at: i64,
    /// RFC 3339 rendering of `created_at`.
    #[serde(default)]
    pub created: String,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct BackupMeta {
    entries: Vec<BackupEntry>,
}

pub fn backup_dir() -> PathBuf {
    paths::backup_dir()
}

/// Copies a termbase file aside before it is overwritten. Expired copies are
/// pruned on every call.
pub fn backup_termbase(src: &Path, ttl_days: i64) -> Result<BackupEntry> {
    let metadata = fs::metadata(src)
        .with_context(|| format!("failed to read file metadata: {}", src.display()))?;
    if !metadata.is_file() {
        return Err(anyhow!("backup source is not a file: {}", src.display()));
    }

    let ttl_days = if ttl_days <= 0 { DEFAULT_TTL_DAYS } else { ttl_days };
    let now = OffsetDateTime::now_utc();
    let created_at = now.unix_timestamp();
    let expires_at = created_at.saturating_add(ttl_days.saturating_mul(SECONDS_PER_DAY));

    let dir = backup_dir();
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create backup dir: {}", dir.display()))?;

    let mut meta = read_meta(&dir)?;
    prune_expired(&mut meta, created_at);

    let file_name = src
        .file_name()
        .and_then(|value| value.to_str())
        .unwrap_or("termbase.csv");
    let id_seed = format!("{}:{}:{}", now.unix_timestamp_nanos(), src.display(), metadata.len());
    let id = format!("{:x}", md5::compute(id_seed.as_bytes()));
    let backup_path = dir.join(format!("{}_{}", id, sanitize_file_name(file_name)));

    fs::copy(src, &backup_path).with_context(|| {
        format!(
            "failed to copy backup from {} to {}",
            src.display(),
            backup_path.display()
        )
    })?;
    debug!(path = %backup_path.display(), "termbase backed up");

    let entry = BackupEntry {
        id,
        src: src.to_string_lossy().to_string(),
        backup: backup_path.to_string_lossy().to_string(),
        created_at,
        expires_at,
        created: now.format(&Rfc3339).unwrap_or_default(),
    };
    meta.entries.push(entry.clone());
    write_meta(&dir, &meta)?;
    Ok(entry)
}

pub fn list_backups() -> Result<Vec<BackupEntry>> {
    Ok(read_meta(&backup_dir())?.entries)
}

fn read_meta(dir: &Path) -> Result<BackupMeta> {
    let path = dir.join(META_FILE_NAME);
    if !path.exists() {
        return Ok(BackupMeta::default());
    }
    let content = fs::read_to_string(&path).with_context(|| "failed to read backup meta")?;
    serde_json::from_str(&content).with_context(|| "failed to parse backup meta")
}

fn write_meta(dir: &Path, meta: &BackupMeta) -> Result<()> {
    let content = serde_json::to_string_pretty(meta)?;
    fs::write(dir.join(META_FILE_NAME), content).with_context(|| "failed to write backup meta")
}

fn prune_expired(meta: &mut BackupMeta, now: i64) {
    meta.entries.retain(|entry| {
        let path = Path::new(&entry.backup);
        if entry.expires_at > now && path.exists() {
            return true;
        }
        if path.exists() {
            let _ = fs::remove_file(path);
        }
        false
    });
}

fn sanitize_file_name(value: &str) -> String {
    let out: String = value
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if out.is_empty() { "termbase.csv".to_string() } else { out }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::with_temp_home;
    use tempfile::tempdir;

    #[test]
    fn backup_records_meta_entry() {
        with_temp_home(|_| {
            let dir = tempdir().expect("tempdir");
            let file_path = dir.path().join("詞庫 master.csv");
            fs::write(&file_path, "en_canonical\nCT\n").expect("write file");

            let entry = backup_termbase(&file_path, 1).expect("backup");
            assert!(Path::new(&entry.backup).exists());
            assert!(entry.backup.ends_with("___master.csv"));
            assert_eq!(entry.expires_at, entry.created_at + SECONDS_PER_DAY);

            let entries = list_backups().expect("list");
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].id, entry.id);
        });
    }

    #[test]
    fn expired_backups_are_pruned() {
        with_temp_home(|_| {
            let dir = tempdir().expect("tempdir");
            let file_path = dir.path().join("termbase.csv");
            fs::write(&file_path, "x").expect("write file");
            let first = backup_termbase(&file_path, 1).expect("backup");

            let mut meta = read_meta(&backup_dir()).expect("meta");
            prune_expired(&mut meta, first.expires_at);
            assert!(meta.entries.is_empty());
            assert!(!Path::new(&first.backup).exists());
        });
    }

    #[test]
    fn directories_are_not_backed_up() {
        with_temp_home(|home| {
            assert!(backup_termbase(home, 1).is_err());
        });
    }
}
