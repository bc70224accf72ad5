use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("No database file found (searched: {searched})")]
    NotLocated { searched: String },

    #[error("Failed to open database {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl DatabaseError {
    /// SQLite reports a re-added column as a generic failure; the message is the only signal.
    pub fn is_duplicate_column(&self) -> bool {
        match self {
            DatabaseError::Sqlite(rusqlite::Error::SqliteFailure(_, Some(message))) => {
                message.contains("duplicate column name")
            }
            _ => false,
        }
    }
}
