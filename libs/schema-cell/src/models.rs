// libs/schema-cell/src/models.rs
use std::fmt;
use std::str::FromStr;

use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_database::{quote_identifier, DatabaseError};
use shared_models::AppError;

// ==============================================================================
// COLUMN DESCRIPTORS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Text,
    Integer,
    Real,
    Boolean,
    Blob,
}

impl ColumnType {
    pub fn sql(&self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Blob => "BLOB",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Text => write!(f, "text"),
            ColumnType::Integer => write!(f, "integer"),
            ColumnType::Real => write!(f, "real"),
            ColumnType::Boolean => write!(f, "boolean"),
            ColumnType::Blob => write!(f, "blob"),
        }
    }
}

impl FromStr for ColumnType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(ColumnType::Text),
            "integer" | "int" => Ok(ColumnType::Integer),
            "real" | "float" => Ok(ColumnType::Real),
            "boolean" | "bool" => Ok(ColumnType::Boolean),
            "blob" => Ok(ColumnType::Blob),
            other => Err(SchemaError::InvalidSpec(format!("unknown column type '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnDefault {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Boolean(bool),
}

impl ColumnDefault {
    /// Parses an operator-supplied default for a column of the given type.
    pub fn parse(raw: &str, column_type: ColumnType) -> Result<Self, SchemaError> {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("null") {
            return Ok(ColumnDefault::Null);
        }

        let invalid = || {
            SchemaError::InvalidSpec(format!("'{}' is not a valid {} default", raw, column_type))
        };

        match column_type {
            ColumnType::Text => Ok(ColumnDefault::Text(raw.to_string())),
            ColumnType::Integer => trimmed
                .parse()
                .map(ColumnDefault::Integer)
                .map_err(|_| invalid()),
            ColumnType::Real => match trimmed.parse::<f64>() {
                Ok(value) if value.is_finite() => Ok(ColumnDefault::Real(value)),
                _ => Err(invalid()),
            },
            ColumnType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(ColumnDefault::Boolean(true)),
                "false" | "0" => Ok(ColumnDefault::Boolean(false)),
                _ => Err(invalid()),
            },
            ColumnType::Blob => Err(invalid()),
        }
    }

    pub fn sql_literal(&self) -> String {
        match self {
            ColumnDefault::Null => "NULL".to_string(),
            ColumnDefault::Integer(value) => value.to_string(),
            ColumnDefault::Real(value) => format!("{:?}", value),
            ColumnDefault::Text(value) => format!("'{}'", value.replace('\'', "''")),
            ColumnDefault::Boolean(value) => if *value { "1" } else { "0" }.to_string(),
        }
    }

    /// The value SQLite hands back for a row that omitted the column.
    pub fn expected_value(&self) -> Value {
        match self {
            ColumnDefault::Null => Value::Null,
            ColumnDefault::Integer(value) => Value::Integer(*value),
            ColumnDefault::Real(value) => Value::Real(*value),
            ColumnDefault::Text(value) => Value::Text(value.clone()),
            ColumnDefault::Boolean(value) => Value::Integer(i64::from(*value)),
        }
    }
}

impl fmt::Display for ColumnDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql_literal())
    }
}

/// A column that must exist on a table.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub table: String,
    pub column: String,
    pub column_type: ColumnType,
    pub default: ColumnDefault,
}

impl ColumnSpec {
    pub fn new(table: &str, column: &str, column_type: ColumnType, default: ColumnDefault) -> Self {
        Self {
            table: table.to_string(),
            column: column.to_string(),
            column_type,
            default,
        }
    }

    /// The only structural statement the guard ever issues.
    pub fn add_column_sql(&self) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {} {} DEFAULT {}",
            quote_identifier(&self.table),
            quote_identifier(&self.column),
            self.column_type.sql(),
            self.default.sql_literal()
        )
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.table, self.column)
    }
}

/// Columns the maintenance tools rely on in the appointments table.
pub fn appointment_columns(table: &str) -> Vec<ColumnSpec> {
    vec![
        ColumnSpec::new(table, "isNewPatient", ColumnType::Boolean, ColumnDefault::Boolean(false)),
        ColumnSpec::new(table, "patient_info", ColumnType::Text, ColumnDefault::Null),
    ]
}

// ==============================================================================
// OUTCOMES & ERRORS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnsureOutcome {
    Applied,
    AlreadyPresent,
}

impl fmt::Display for EnsureOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnsureOutcome::Applied => write!(f, "applied"),
            EnsureOutcome::AlreadyPresent => write!(f, "already present"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GuardOptions {
    /// Run an insert/read/delete round trip after adding a column.
    pub round_trip: bool,
}

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Failed to read schema of {table}: {source}")]
    Introspection {
        table: String,
        #[source]
        source: DatabaseError,
    },

    #[error("Failed to add column {table}.{column}: {source}")]
    AlterationFailed {
        table: String,
        column: String,
        #[source]
        source: DatabaseError,
    },

    #[error("Column {table}.{column} not usable after ALTER in {database}: {reason}")]
    VerificationFailed {
        table: String,
        column: String,
        database: String,
        reason: String,
    },

    #[error("Invalid column spec: {0}")]
    InvalidSpec(String),
}

impl From<SchemaError> for AppError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::AlterationFailed { .. } => AppError::SchemaAlteration(err.to_string()),
            SchemaError::VerificationFailed { .. } => AppError::SchemaVerification(err.to_string()),
            SchemaError::Introspection { .. } => AppError::Database(err.to_string()),
            SchemaError::InvalidSpec(msg) => AppError::ValidationError(msg),
        }
    }
}
