use rusqlite::types::Value;
use rusqlite::{params_from_iter, Transaction};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use shared_database::{quote_identifier, ColumnInfo, Database, DatabaseError};

use crate::models::{ColumnSpec, ColumnType};

#[derive(Error, Debug)]
pub enum RoundTripError {
    /// Existing columns refused the synthetic row before the new column was involved.
    #[error("synthetic row rejected by existing columns: {0}")]
    RowRejected(#[source] rusqlite::Error),

    #[error("round trip statement failed: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("round trip could not read schema: {0}")]
    Database(#[from] DatabaseError),

    #[error("omitted column read back as {actual:?}, expected default {expected:?}")]
    DefaultMismatch { expected: Value, actual: Value },

    #[error("{column_type} value {written:?} was rejected: {source}")]
    ValueRejected {
        column_type: ColumnType,
        written: Value,
        source: rusqlite::Error,
    },

    #[error("{column_type} value {written:?} read back as {actual:?}")]
    ValueMismatch {
        column_type: ColumnType,
        written: Value,
        actual: Value,
    },

    #[error("synthetic row was not removed ({deleted} rows deleted)")]
    RowNotRemoved { deleted: usize },
}

impl RoundTripError {
    /// False when the failure lies with other columns of the table.
    pub fn implicates_column(&self) -> bool {
        !matches!(self, RoundTripError::RowRejected(_))
    }
}

/// Writes two synthetic rows through `spec.column` inside one transaction:
/// the first omits the column and must read back the declared default, the
/// second supplies a value of the declared type and must read it back unchanged.
/// The transaction is always rolled back, so nothing survives, not even an
/// AUTOINCREMENT sequence bump.
pub(crate) fn check(db: &mut Database, spec: &ColumnSpec) -> Result<(), RoundTripError> {
    let columns = db.table_columns(&spec.table)?;
    let marker = format!("schema-check-{}", Uuid::new_v4());

    let filled: Vec<(String, Value)> = columns
        .iter()
        .filter(|c| !c.name.eq_ignore_ascii_case(&spec.column))
        .filter(|c| !c.is_rowid_alias())
        .filter(|c| c.primary_key || (c.not_null && c.default_value.is_none()))
        .map(|c| (quote_identifier(&c.name), placeholder(c, &marker)))
        .collect();

    let table = quote_identifier(&spec.table);
    let column = quote_identifier(&spec.column);

    let tx = db.transaction()?;

    let rowid = insert_row(&tx, &table, &filled, None).map_err(RoundTripError::RowRejected)?;
    let actual = read_back(&tx, &table, &column, rowid)?;
    remove_row(&tx, &table, rowid)?;

    let expected = spec.default.expected_value();
    if !values_match(&expected, &actual) {
        return Err(RoundTripError::DefaultMismatch { expected, actual });
    }

    // Same placeholders as before; only the new column differs.
    let written = sample_value(spec.column_type, &marker);
    let rowid = insert_row(&tx, &table, &filled, Some((column.as_str(), &written)))
        .map_err(|source| RoundTripError::ValueRejected {
            column_type: spec.column_type,
            written: written.clone(),
            source,
        })?;
    let actual = read_back(&tx, &table, &column, rowid)?;
    remove_row(&tx, &table, rowid)?;

    if !values_match(&written, &actual) {
        return Err(RoundTripError::ValueMismatch {
            column_type: spec.column_type,
            written,
            actual,
        });
    }

    tx.rollback()?;
    Ok(())
}

fn insert_row(
    tx: &Transaction<'_>,
    table: &str,
    filled: &[(String, Value)],
    extra: Option<(&str, &Value)>,
) -> rusqlite::Result<i64> {
    let mut names: Vec<&str> = filled.iter().map(|(name, _)| name.as_str()).collect();
    let mut values: Vec<&Value> = filled.iter().map(|(_, value)| value).collect();
    if let Some((name, value)) = extra {
        names.push(name);
        values.push(value);
    }

    let sql = if names.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES", table)
    } else {
        let slots: Vec<String> = (1..=names.len()).map(|i| format!("?{}", i)).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            names.join(", "),
            slots.join(", ")
        )
    };

    debug!("Round trip insert: {}", sql);
    tx.execute(&sql, params_from_iter(values))?;
    Ok(tx.last_insert_rowid())
}

fn read_back(
    tx: &Transaction<'_>,
    table: &str,
    column: &str,
    rowid: i64,
) -> Result<Value, RoundTripError> {
    let value = tx.query_row(
        &format!("SELECT {} FROM {} WHERE rowid = ?1", column, table),
        [rowid],
        |row| row.get(0),
    )?;
    Ok(value)
}

fn remove_row(tx: &Transaction<'_>, table: &str, rowid: i64) -> Result<(), RoundTripError> {
    let deleted = tx.execute(&format!("DELETE FROM {} WHERE rowid = ?1", table), [rowid])?;
    if deleted != 1 {
        return Err(RoundTripError::RowNotRemoved { deleted });
    }
    Ok(())
}

/// A value satisfying the column's affinity, following SQLite's affinity rules.
fn placeholder(column: &ColumnInfo, marker: &str) -> Value {
    let declared = column.declared_type.to_ascii_uppercase();

    if declared.contains("INT") {
        if column.primary_key {
            // Keyed integer columns need a value no real row uses.
            let unique = (Uuid::new_v4().as_u128() >> 66) as i64;
            return Value::Integer(-unique - 1);
        }
        Value::Integer(0)
    } else if declared.contains("CHAR") || declared.contains("CLOB") || declared.contains("TEXT") {
        Value::Text(marker.to_string())
    } else if declared.contains("BLOB") || declared.is_empty() {
        Value::Blob(marker.as_bytes().to_vec())
    } else if declared.contains("REAL") || declared.contains("FLOA") || declared.contains("DOUB") {
        Value::Real(0.0)
    } else {
        Value::Integer(0)
    }
}

/// A value of the declared type for the new column to store.
fn sample_value(column_type: ColumnType, marker: &str) -> Value {
    match column_type {
        ColumnType::Text => Value::Text(marker.to_string()),
        ColumnType::Integer => Value::Integer(42),
        ColumnType::Real => Value::Real(2.5),
        ColumnType::Boolean => Value::Integer(1),
        ColumnType::Blob => Value::Blob(marker.as_bytes().to_vec()),
    }
}

fn values_match(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Integer(a), Value::Real(b)) | (Value::Real(b), Value::Integer(a)) => {
            (*a as f64 - b).abs() < f64::EPSILON
        }
        (Value::Text(a), Value::Integer(b)) => a.trim().parse::<i64>().ok() == Some(*b),
        _ => expected == actual,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, declared_type: &str, primary_key: bool) -> ColumnInfo {
        ColumnInfo {
            cid: 0,
            name: name.to_string(),
            declared_type: declared_type.to_string(),
            not_null: true,
            default_value: None,
            primary_key,
        }
    }

    #[test]
    fn test_placeholder_follows_affinity() {
        assert_eq!(placeholder(&column("doctor_id", "INTEGER", false), "m"), Value::Integer(0));
        assert_eq!(
            placeholder(&column("date", "VARCHAR(10)", false), "m"),
            Value::Text("m".to_string())
        );
        assert_eq!(placeholder(&column("fee", "DOUBLE", false), "m"), Value::Real(0.0));
        assert_eq!(
            placeholder(&column("raw", "", false), "m"),
            Value::Blob(b"m".to_vec())
        );
        assert_eq!(placeholder(&column("amount", "NUMERIC", false), "m"), Value::Integer(0));
    }

    #[test]
    fn test_keyed_integer_placeholder_is_negative() {
        match placeholder(&column("code", "INT", true), "m") {
            Value::Integer(value) => assert!(value < 0),
            other => panic!("unexpected placeholder {:?}", other),
        }
    }

    #[test]
    fn test_sample_value_matches_declared_type() {
        assert_eq!(sample_value(ColumnType::Boolean, "m"), Value::Integer(1));
        assert_eq!(sample_value(ColumnType::Real, "m"), Value::Real(2.5));
        assert_eq!(sample_value(ColumnType::Text, "m"), Value::Text("m".to_string()));
    }

    #[test]
    fn test_values_match_across_numeric_storage() {
        assert!(values_match(&Value::Integer(1), &Value::Real(1.0)));
        assert!(values_match(&Value::Null, &Value::Null));
        assert!(!values_match(&Value::Integer(0), &Value::Null));
        assert!(!values_match(
            &Value::Text("a".into()),
            &Value::Text("b".into())
        ));
    }

    #[test]
    fn test_only_rejected_synthetic_rows_spare_the_column() {
        let rejected = RoundTripError::RowRejected(rusqlite::Error::QueryReturnedNoRows);
        let mismatch = RoundTripError::DefaultMismatch {
            expected: Value::Integer(0),
            actual: Value::Null,
        };
        let stored_wrong = RoundTripError::ValueMismatch {
            column_type: ColumnType::Integer,
            written: Value::Integer(42),
            actual: Value::Text("42x".into()),
        };

        assert!(!rejected.implicates_column());
        assert!(mismatch.implicates_column());
        assert!(stored_wrong.implicates_column());
    }
}
