// libs/schema-cell/src/services/guard.rs
use tracing::{debug, error, info, warn};

use shared_database::Database;

use crate::models::{ColumnSpec, EnsureOutcome, GuardOptions, SchemaError};
use crate::services::round_trip;

/// Result of ensuring one column, kept per column so a batch reports every outcome.
#[derive(Debug)]
pub struct ColumnReport {
    pub spec: ColumnSpec,
    pub result: Result<EnsureOutcome, SchemaError>,
}

impl ColumnReport {
    pub fn is_failure(&self) -> bool {
        self.result.is_err()
    }
}

/// Adds columns to a live table at most once. Only `ADD COLUMN` is ever issued.
pub struct SchemaEvolutionGuard {
    options: GuardOptions,
}

impl SchemaEvolutionGuard {
    pub fn new(options: GuardOptions) -> Self {
        Self { options }
    }

    pub fn ensure_column(
        &self,
        db: &mut Database,
        spec: &ColumnSpec,
    ) -> Result<EnsureOutcome, SchemaError> {
        debug!("Ensuring column {} ({})", spec.qualified_name(), spec.column_type);

        if self.column_present(db, spec)? {
            info!("Column {} already present", spec.qualified_name());
            return Ok(EnsureOutcome::AlreadyPresent);
        }

        if self.apply(db, spec)? == EnsureOutcome::AlreadyPresent {
            return Ok(EnsureOutcome::AlreadyPresent);
        }

        if !self.column_present(db, spec)? {
            error!(
                "Column {} missing after ALTER on {}",
                spec.qualified_name(),
                db.path().display()
            );
            return Err(verification_failed(db, spec, "column missing on re-read".to_string()));
        }

        if self.options.round_trip {
            match round_trip::check(db, spec) {
                Ok(()) => debug!("Round trip on {} succeeded", spec.qualified_name()),
                Err(err) if !err.implicates_column() => {
                    warn!("Round trip on {} skipped: {}", spec.qualified_name(), err);
                }
                Err(err) => {
                    error!("Round trip on {} failed: {}", spec.qualified_name(), err);
                    return Err(verification_failed(db, spec, err.to_string()));
                }
            }
        }

        info!("Column {} added", spec.qualified_name());
        Ok(EnsureOutcome::Applied)
    }

    /// Ensures each column in order. A failure on one column does not skip the rest.
    pub fn ensure_columns(&self, db: &mut Database, specs: &[ColumnSpec]) -> Vec<ColumnReport> {
        specs
            .iter()
            .map(|spec| ColumnReport {
                spec: spec.clone(),
                result: self.ensure_column(db, spec),
            })
            .collect()
    }

    fn column_present(&self, db: &Database, spec: &ColumnSpec) -> Result<bool, SchemaError> {
        db.find_column(&spec.table, &spec.column)
            .map(|column| column.is_some())
            .map_err(|source| SchemaError::Introspection {
                table: spec.table.clone(),
                source,
            })
    }

    fn apply(&self, db: &Database, spec: &ColumnSpec) -> Result<EnsureOutcome, SchemaError> {
        let sql = spec.add_column_sql();
        info!("Executing: {}", sql);

        match db.execute(&sql, []) {
            Ok(_) => Ok(EnsureOutcome::Applied),
            Err(err) if err.is_duplicate_column() => {
                // Another caller added it between our check and our ALTER.
                warn!("Column {} was added concurrently", spec.qualified_name());
                Ok(EnsureOutcome::AlreadyPresent)
            }
            Err(source) => {
                error!("ALTER on {} rejected: {}", spec.qualified_name(), source);
                Err(SchemaError::AlterationFailed {
                    table: spec.table.clone(),
                    column: spec.column.clone(),
                    source,
                })
            }
        }
    }
}

fn verification_failed(db: &Database, spec: &ColumnSpec, reason: String) -> SchemaError {
    SchemaError::VerificationFailed {
        table: spec.table.clone(),
        column: spec.column.clone(),
        database: db.path().display().to_string(),
        reason,
    }
}
