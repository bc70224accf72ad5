// libs/patient-identity-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use shared_database::DatabaseError;
use shared_models::AppError;

// ==============================================================================
// PATIENT INFO PAYLOAD
// ==============================================================================

/// The structured `patient_info` payload stored as JSON on an appointment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_actual_patient: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booker_name: Option<String>,
    /// Historically written as either a number or a string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booker_id: Option<Value>,
}

impl PatientInfo {
    /// Payload recording a patient named inline by the booker.
    pub fn declared(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            is_actual_patient: Some(true),
            ..Default::default()
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ==============================================================================
// RESOLUTION RESULT
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentitySource {
    PatientInfo,
    LegacyNotes,
    BookingAccount,
}

impl fmt::Display for IdentitySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentitySource::PatientInfo => write!(f, "patient_info"),
            IdentitySource::LegacyNotes => write!(f, "notes"),
            IdentitySource::BookingAccount => write!(f, "booking account"),
        }
    }
}

/// Who an appointment is for, kept apart from who booked it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientDisplay {
    pub display_name: String,
    pub booker_name: String,
    pub is_actual_patient_distinct: bool,
    pub source: IdentitySource,
}

// ==============================================================================
// BACKFILL REPORTING
// ==============================================================================

/// A row the backfill may fill in, read without touching its other columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPatientInfo {
    pub rowid: i64,
    /// `None` when the stored id is not an integer.
    pub appointment_id: Option<i64>,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillWrite {
    pub appointment_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowFailure {
    /// The rowid when the stored appointment id is unusable.
    pub appointment_id: i64,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillSummary {
    pub dry_run: bool,
    /// Rows that had no `patient_info` when the run started.
    pub scanned: usize,
    /// Written rows, or rows that would be written in a dry run.
    pub writes: Vec<BackfillWrite>,
    pub without_marker: usize,
    /// Rows that gained `patient_info` between the scan and the write.
    pub already_resolved: usize,
    pub failed: Vec<RowFailure>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl BackfillSummary {
    pub fn succeeded(&self) -> usize {
        self.writes.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

#[derive(Error, Debug)]
pub enum PatientIdentityError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Query failed: {0}")]
    Query(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to write patient_info for appointment {appointment_id}: {message}")]
    RowWriteFailed { appointment_id: i64, message: String },
}

impl From<PatientIdentityError> for AppError {
    fn from(err: PatientIdentityError) -> Self {
        match err {
            PatientIdentityError::Serialization(_) => AppError::Internal(err.to_string()),
            _ => AppError::Database(err.to_string()),
        }
    }
}
