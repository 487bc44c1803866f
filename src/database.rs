use log::{debug, info};
use rusqlite::{Connection, OptionalExtension};

use crate::config::StorageConfig;
use crate::error::BbuError;
use crate::schema::{CREATE_SCHEMA_SQL, SCHEMA_VERSION, UPGRADE_LEGACY_SQL};

/// A scoped connection to the record store.
///
/// Each request opens its own `Database`; the underlying connection is
/// released when the value is dropped, on every exit path.
pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(storage: &StorageConfig) -> Result<Self, BbuError> {
        let db_path = &storage.db_path;

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                return Err(BbuError::Error(format!(
                    "Database folder '{}' does not exist or is not a directory",
                    parent.display()
                )));
            }
        }

        let conn = Connection::open(db_path)?;
        debug!("Database opened at: {}", db_path.display());

        let db = Self { conn };
        db.ensure_schema()?;

        Ok(db)
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Closes the connection explicitly so the file can be renamed.
    pub fn close(self) -> Result<(), BbuError> {
        self.conn.close().map_err(|(_, e)| BbuError::DatabaseError(e))
    }

    fn ensure_schema(&self) -> Result<(), BbuError> {
        if !self.table_exists("serial_numbers")? {
            return self.create_schema();
        }

        let stored_version: Option<String> = if self.table_exists("meta")? {
            self.conn
                .query_row(
                    "SELECT value FROM meta WHERE key = 'schema_version'",
                    [],
                    |row| row.get(0),
                )
                .optional()?
        } else {
            None
        };

        match stored_version.as_deref() {
            Some(SCHEMA_VERSION) => Ok(()), // Schema is up to date
            Some(other) => Err(BbuError::Error(format!(
                "Schema version mismatch: found {}, expected {}",
                other, SCHEMA_VERSION
            ))),
            None => {
                info!("Upgrading legacy serial_numbers table to schema version {}", SCHEMA_VERSION);
                self.conn.execute_batch(UPGRADE_LEGACY_SQL)?;
                Ok(())
            }
        }
    }

    fn create_schema(&self) -> Result<(), BbuError> {
        self.conn.execute_batch(CREATE_SCHEMA_SQL)?;
        Ok(())
    }

    fn table_exists(&self, name: &str) -> Result<bool, BbuError> {
        let count: i64 = self.conn.query_row(
            "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
            [name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

/// True when `err` reports a table that has not been created.
pub fn is_missing_table(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(msg)) => msg.starts_with("no such table"),
        _ => false,
    }
}
