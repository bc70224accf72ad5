use thiserror::Error;

/// Top-level failure classes a maintenance run can end with.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Schema alteration failed: {0}")]
    SchemaAlteration(String),

    #[error("Schema verification failed: {0}")]
    SchemaVerification(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Alteration and verification failures get distinct codes; the operator's next
    /// step differs (check permissions vs. check which file was opened).
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::SchemaAlteration(_) => 2,
            AppError::SchemaVerification(_) => 3,
            AppError::Config(_) | AppError::ValidationError(_) => 64,
            AppError::Database(_) | AppError::Internal(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_failures_have_distinct_exit_codes() {
        let alteration = AppError::SchemaAlteration("appointments.patient_info".into());
        let verification = AppError::SchemaVerification("appointments.patient_info".into());

        assert_ne!(alteration.exit_code(), verification.exit_code());
        assert_eq!(AppError::Database("locked".into()).exit_code(), 1);
    }

    #[test]
    fn test_every_error_exits_non_zero() {
        for err in [
            AppError::Config("x".into()),
            AppError::Database("x".into()),
            AppError::ValidationError("x".into()),
            AppError::Internal("x".into()),
        ] {
            assert_ne!(err.exit_code(), 0);
        }
    }
}
