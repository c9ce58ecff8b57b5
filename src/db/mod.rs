mod schema;
pub mod faces;
pub mod videos;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use std::path::Path;
use tracing::debug;

use crate::error::{RegistryError, Result};

pub use faces::{display_name_for, Face, FaceView, NewFace, RegistryStats, UNCLUSTERED};
pub use schema::{MIGRATIONS, POST_MIGRATION_INDEXES, SCHEMA};
pub use videos::{IngestRecord, NewVideo, Video};

/// Handle to the registry store.
///
/// Opened once at startup and passed by reference to every component. All
/// mutating operations run inside a single SQLite transaction; file-backed
/// stores use WAL mode so readers only ever see committed state.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) a registry at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| RegistryError::io(parent, e))?;
            }
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        debug!("Opened registry at {:?}", path);
        Ok(Self { conn })
    }

    /// Open a throwaway in-memory registry.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self { conn })
    }

    pub fn initialize(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        self.run_migrations()?;
        self.conn.execute_batch(POST_MIGRATION_INDEXES)?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        for migration in MIGRATIONS {
            // Already-applied migrations fail with "duplicate column"
            if let Err(e) = self.conn.execute(migration, []) {
                debug!("Skipping migration {:?}: {}", migration, e);
            }
        }
        Ok(())
    }
}

/// Format a timestamp for the `upload_date` column.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_initialize_is_repeatable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("registry.db");
        let db = Database::open(&path).unwrap();
        db.initialize().unwrap();
        db.initialize().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_timestamp_format_sorts_lexically() {
        let early = test_support::at(0);
        let late = test_support::at(3600);
        assert!(format_timestamp(&early) < format_timestamp(&late));
        assert_eq!(parse_timestamp(0, &format_timestamp(&late)).unwrap(), late);
    }
}
