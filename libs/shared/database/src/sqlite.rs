use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, OpenFlags, Params, Transaction};
use tracing::{debug, info, warn};

use shared_config::{AppConfig, DatabaseLocation};

use crate::error::DatabaseError;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// One row of `pragma_table_info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub cid: i64,
    pub name: String,
    pub declared_type: String,
    pub not_null: bool,
    pub default_value: Option<String>,
    pub primary_key: bool,
}

impl ColumnInfo {
    /// `INTEGER PRIMARY KEY` aliases the rowid and is filled in by SQLite.
    pub fn is_rowid_alias(&self) -> bool {
        self.primary_key && self.declared_type.eq_ignore_ascii_case("INTEGER")
    }
}

/// A single connection to the clinic database file, held for one maintenance run.
#[derive(Debug)]
pub struct Database {
    conn: Connection,
    path: PathBuf,
}

impl Database {
    pub fn open(config: &AppConfig) -> Result<Self, DatabaseError> {
        match config.locate_database() {
            DatabaseLocation::Explicit(path) => Self::open_path(&path),
            DatabaseLocation::Candidate { path, shadowed } => {
                if !shadowed.is_empty() {
                    warn!(
                        "{} other database file(s) exist; verify {} is the live one",
                        shadowed.len(),
                        path.display()
                    );
                }
                Self::open_path(&path)
            }
            DatabaseLocation::NotFound { searched } => Err(DatabaseError::NotLocated {
                searched: searched
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }

    /// Opens an existing file. Never creates one, so a wrong path fails loudly.
    pub fn open_path(path: &Path) -> Result<Self, DatabaseError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        Self::open_with_flags(path, flags)
    }

    /// Opens or creates the file. Used by fixtures and first-time setup.
    pub fn create(path: &Path) -> Result<Self, DatabaseError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        Self::open_with_flags(path, flags)
    }

    fn open_with_flags(path: &Path, flags: OpenFlags) -> Result<Self, DatabaseError> {
        let conn = Connection::open_with_flags(path, flags).map_err(|source| {
            DatabaseError::Open {
                path: path.to_path_buf(),
                source,
            }
        })?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        info!("Opened database {}", path.display());

        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn transaction(&mut self) -> Result<Transaction<'_>, DatabaseError> {
        Ok(self.conn.transaction()?)
    }

    pub fn table_exists(&self, table: &str) -> Result<bool, DatabaseError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Reads the live column list. Empty when the table does not exist.
    pub fn table_columns(&self, table: &str) -> Result<Vec<ColumnInfo>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT cid, name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?1)",
        )?;

        let columns = stmt
            .query_map([table], |row| {
                Ok(ColumnInfo {
                    cid: row.get(0)?,
                    name: row.get(1)?,
                    declared_type: row.get(2)?,
                    not_null: row.get::<_, i64>(3)? != 0,
                    default_value: row.get(4)?,
                    primary_key: row.get::<_, i64>(5)? != 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        debug!("Table {} has {} columns", table, columns.len());
        Ok(columns)
    }

    pub fn find_column(
        &self,
        table: &str,
        column: &str,
    ) -> Result<Option<ColumnInfo>, DatabaseError> {
        Ok(self
            .table_columns(table)?
            .into_iter()
            .find(|c| c.name.eq_ignore_ascii_case(column)))
    }

    pub fn execute<P: Params>(&self, sql: &str, params: P) -> Result<usize, DatabaseError> {
        Ok(self.conn.execute(sql, params)?)
    }

    /// Runs an INSERT and returns the generated rowid.
    pub fn insert<P: Params>(&self, sql: &str, params: P) -> Result<i64, DatabaseError> {
        self.conn.execute(sql, params)?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn close(self) -> Result<(), DatabaseError> {
        let path = self.path;
        self.conn.close().map_err(|(_, err)| DatabaseError::Sqlite(err))?;
        debug!("Closed database {}", path.display());
        Ok(())
    }
}

pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    fn scratch() -> (TempDir, Database) {
        let dir = TempDir::new().unwrap();
        let db = Database::create(&dir.path().join("scratch.sqlite")).unwrap();
        db.execute(
            "CREATE TABLE visits (id INTEGER PRIMARY KEY, label TEXT NOT NULL DEFAULT 'x', score REAL)",
            [],
        )
        .unwrap();
        (dir, db)
    }

    #[test]
    fn test_open_path_refuses_to_create_missing_file() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("typo.sqlite");

        let result = Database::open_path(&missing);

        assert_matches!(result, Err(DatabaseError::Open { .. }));
        assert!(!missing.exists());
    }

    #[test]
    fn test_table_columns_reports_pragma_tuples() {
        let (_dir, db) = scratch();

        let columns = db.table_columns("visits").unwrap();

        assert_eq!(columns.len(), 3);
        assert!(columns[0].is_rowid_alias());
        assert_eq!(columns[1].name, "label");
        assert!(columns[1].not_null);
        assert_eq!(columns[1].default_value.as_deref(), Some("'x'"));
        assert_eq!(columns[2].declared_type, "REAL");
        assert!(!columns[2].not_null);
    }

    #[test]
    fn test_missing_table_has_no_columns() {
        let (_dir, db) = scratch();

        assert!(db.table_columns("nope").unwrap().is_empty());
        assert!(!db.table_exists("nope").unwrap());
        assert!(db.table_exists("visits").unwrap());
    }

    #[test]
    fn test_find_column_ignores_ascii_case() {
        let (_dir, db) = scratch();

        assert!(db.find_column("visits", "LABEL").unwrap().is_some());
        assert!(db.find_column("visits", "notes").unwrap().is_none());
    }

    #[test]
    fn test_insert_returns_rowid_and_execute_counts_rows() {
        let (_dir, db) = scratch();

        let first = db.insert("INSERT INTO visits (label) VALUES (?1)", ["a"]).unwrap();
        let second = db.insert("INSERT INTO visits (label) VALUES (?1)", ["b"]).unwrap();
        assert_eq!(second, first + 1);

        let updated = db.execute("UPDATE visits SET score = 1.5", []).unwrap();
        assert_eq!(updated, 2);
    }

    #[test]
    fn test_duplicate_column_is_recognised() {
        let (_dir, db) = scratch();

        let err = db
            .execute("ALTER TABLE visits ADD COLUMN label TEXT", [])
            .unwrap_err();

        assert!(err.is_duplicate_column());
    }

    #[test]
    fn test_quote_identifier_escapes_quotes() {
        assert_eq!(quote_identifier("isNewPatient"), "\"isNewPatient\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_close_releases_connection() {
        let (dir, db) = scratch();
        db.close().unwrap();

        let reopened = Database::open_path(&dir.path().join("scratch.sqlite")).unwrap();
        assert!(reopened.table_exists("visits").unwrap());
    }
}
