use std::path::Path;

use gradewatch_core::{GradeStatus, GradeStore, PersistedGradeEntry, PersistenceError};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS grades (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    module_name TEXT NOT NULL,
    grade TEXT,
    occurrence_index INTEGER NOT NULL,
    status TEXT,
    updated_at TEXT,
    UNIQUE(module_name, occurrence_index)
);
CREATE TABLE IF NOT EXISTS system_status (
    key TEXT PRIMARY KEY,
    value TEXT,
    updated_at TEXT
);
";

/// SQLite-backed grade store.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, PersistenceError> {
        let conn = Connection::open(path).map_err(PersistenceError::backend)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory().map_err(PersistenceError::backend)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, PersistenceError> {
        conn.execute_batch(SCHEMA)
            .map_err(PersistenceError::backend)?;
        Ok(Self { conn })
    }

    pub fn status_value(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        self.conn
            .query_row(
                "SELECT value FROM system_status WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(PersistenceError::backend)
    }

    fn set_status(&self, key: &str, value: &str, at: &str) -> Result<(), PersistenceError> {
        self.conn
            .execute(
                "INSERT INTO system_status (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, at],
            )
            .map_err(PersistenceError::backend)?;
        Ok(())
    }
}

impl GradeStore for SqliteStore {
    fn count(&self) -> Result<usize, PersistenceError> {
        let count: i64 = self
            .conn
            .query_row("SELECT count(*) FROM grades", [], |row| row.get(0))
            .map_err(PersistenceError::backend)?;
        Ok(count as usize)
    }

    fn find(
        &self,
        module: &str,
        occurrence_index: u32,
    ) -> Result<Option<PersistedGradeEntry>, PersistenceError> {
        self.conn
            .query_row(
                "SELECT grade, status, updated_at FROM grades
                 WHERE module_name = ?1 AND occurrence_index = ?2",
                params![module, occurrence_index],
                |row| {
                    Ok(PersistedGradeEntry {
                        module: module.to_string(),
                        occurrence_index,
                        grade: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                        status: row
                            .get::<_, Option<String>>(1)?
                            .map(|status| GradeStatus::from_stored(&status))
                            .unwrap_or(GradeStatus::Existing),
                        updated_at: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    })
                },
            )
            .optional()
            .map_err(PersistenceError::backend)
    }

    fn insert(&mut self, entry: &PersistedGradeEntry) -> Result<(), PersistenceError> {
        let result = self.conn.execute(
            "INSERT INTO grades (module_name, grade, occurrence_index, status, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.module,
                entry.grade,
                entry.occurrence_index,
                entry.status.as_str(),
                entry.updated_at,
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(PersistenceError::Duplicate {
                    module: entry.module.clone(),
                    occurrence_index: entry.occurrence_index,
                })
            }
            Err(err) => Err(PersistenceError::backend(err)),
        }
    }

    fn update(
        &mut self,
        module: &str,
        occurrence_index: u32,
        grade: &str,
        updated_at: &str,
    ) -> Result<(), PersistenceError> {
        let changed = self
            .conn
            .execute(
                "UPDATE grades SET grade = ?1, updated_at = ?2
                 WHERE module_name = ?3 AND occurrence_index = ?4",
                params![grade, updated_at, module, occurrence_index],
            )
            .map_err(PersistenceError::backend)?;
        if changed == 0 {
            return Err(PersistenceError::NotFound {
                module: module.to_string(),
                occurrence_index,
            });
        }
        Ok(())
    }

    fn record_check(&mut self, at: &str) -> Result<(), PersistenceError> {
        self.set_status("last_check", at, at)
    }
}
