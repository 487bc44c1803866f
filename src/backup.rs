use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use log::{info, warn};

use crate::config::StorageConfig;
use crate::database::Database;
use crate::error::BbuError;

/// Timestamp suffix used in backup file names.
pub const BACKUP_STAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// Files produced by a clear.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ClearOutcome {
    pub deleted: usize,
    pub db_backup: Option<PathBuf>,
    pub snapshot_backup: Option<PathBuf>,
}

/// Deletes every record, closes the store, then renames the database file
/// and the JSON snapshot (when present) to timestamped backup names.
///
/// Consumes the `Database` since the file is moved out from under it.
pub fn clear_all(db: Database, storage: &StorageConfig) -> Result<ClearOutcome, BbuError> {
    clear_all_at(db, storage, Local::now().naive_local())
}

pub fn clear_all_at(
    db: Database,
    storage: &StorageConfig,
    now: NaiveDateTime,
) -> Result<ClearOutcome, BbuError> {
    let deleted = db.conn().execute("DELETE FROM serial_numbers", [])?;
    db.close()?;

    info!("Cleared {} records from {}", deleted, storage.db_path.display());

    let stamp = now.format(BACKUP_STAMP_FORMAT).to_string();

    let db_backup = backup_file(
        &storage.db_path,
        &storage.backup_dir,
        &storage.db_backup_prefix,
        &stamp,
        "db",
    )?;

    let snapshot_backup = backup_file(
        &storage.snapshot_path,
        &storage.backup_dir,
        &storage.snapshot_backup_prefix,
        &stamp,
        "json",
    )?;

    Ok(ClearOutcome {
        deleted,
        db_backup,
        snapshot_backup,
    })
}

fn backup_file(
    source: &Path,
    backup_dir: &Path,
    prefix: &str,
    stamp: &str,
    extension: &str,
) -> Result<Option<PathBuf>, BbuError> {
    if !source.exists() {
        return Ok(None);
    }

    let target = unique_backup_path(backup_dir, prefix, stamp, extension);
    fs::rename(source, &target)?;
    info!("Backed up {} to {}", source.display(), target.display());

    Ok(Some(target))
}

/// `{prefix}_{stamp}.{ext}`, with `-N` appended if that name is taken.
fn unique_backup_path(backup_dir: &Path, prefix: &str, stamp: &str, extension: &str) -> PathBuf {
    let candidate = backup_dir.join(format!("{}_{}.{}", prefix, stamp, extension));
    if !candidate.exists() {
        return candidate;
    }

    let mut n = 1;
    loop {
        let candidate = backup_dir.join(format!("{}_{}-{}.{}", prefix, stamp, n, extension));
        if !candidate.exists() {
            warn!("Backup name for {} already taken, using {}", stamp, candidate.display());
            return candidate;
        }
        n += 1;
    }
}
