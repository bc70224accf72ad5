pub mod error;
pub mod sqlite;

pub use error::DatabaseError;
pub use sqlite::{quote_identifier, ColumnInfo, Database};
