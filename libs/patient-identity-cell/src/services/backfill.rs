use chrono::Utc;
use rusqlite::params;
use tracing::{debug, info, warn};

use shared_database::{quote_identifier, Database};

use crate::models::{
    BackfillSummary, BackfillWrite, PatientIdentityError, PatientInfo, RowFailure,
};
use crate::services::appointments::AppointmentReader;
use crate::services::legacy_notes::extract_declared_patient;

enum RowOutcome {
    Written(String),
    NoMarker,
    AlreadyResolved,
}

/// One-time migration that turns inline `就診者：` notes into a `patient_info` payload.
pub struct PatientInfoBackfill<'a> {
    reader: &'a AppointmentReader,
    dry_run: bool,
}

impl<'a> PatientInfoBackfill<'a> {
    pub fn new(reader: &'a AppointmentReader, dry_run: bool) -> Self {
        Self { reader, dry_run }
    }

    /// Rows are written one at a time; a failed row is recorded and the rest continue.
    /// Rows that already have `patient_info` are never overwritten.
    pub fn run(&self, db: &Database) -> Result<BackfillSummary, PatientIdentityError> {
        let started_at = Utc::now();
        let candidates = self.reader.missing_patient_info(db)?;

        info!(
            "Backfilling patient_info: {} rows without it{}",
            candidates.len(),
            if self.dry_run { " (dry run)" } else { "" }
        );

        let mut writes = Vec::new();
        let mut failed = Vec::new();
        let mut without_marker = 0;
        let mut already_resolved = 0;

        for candidate in &candidates {
            let Some(appointment_id) = candidate.appointment_id else {
                warn!("Row {} has a non-integer appointment id", candidate.rowid);
                failed.push(RowFailure {
                    appointment_id: candidate.rowid,
                    error: format!("row {} has a non-integer appointment id", candidate.rowid),
                });
                continue;
            };

            match self.backfill_row(db, appointment_id, &candidate.notes) {
                Ok(RowOutcome::Written(name)) => writes.push(BackfillWrite {
                    appointment_id,
                    name,
                }),
                Ok(RowOutcome::NoMarker) => without_marker += 1,
                Ok(RowOutcome::AlreadyResolved) => already_resolved += 1,
                Err(err) => {
                    warn!("{}", err);
                    failed.push(RowFailure {
                        appointment_id,
                        error: err.to_string(),
                    });
                }
            }
        }

        let summary = BackfillSummary {
            dry_run: self.dry_run,
            scanned: candidates.len(),
            writes,
            without_marker,
            already_resolved,
            failed,
            started_at,
            completed_at: Utc::now(),
        };

        info!(
            "Backfill finished: {} written, {} failed, {} without marker",
            summary.succeeded(),
            summary.failed.len(),
            summary.without_marker
        );

        Ok(summary)
    }

    fn backfill_row(
        &self,
        db: &Database,
        appointment_id: i64,
        notes: &str,
    ) -> Result<RowOutcome, PatientIdentityError> {
        let Some(name) = extract_declared_patient(notes) else {
            return Ok(RowOutcome::NoMarker);
        };

        if self.dry_run {
            return Ok(RowOutcome::Written(name));
        }

        let payload = PatientInfo::declared(&name).to_json()?;
        let sql = format!(
            "UPDATE {} SET patient_info = ?1
             WHERE id = ?2 AND (patient_info IS NULL OR TRIM(patient_info) = '')",
            quote_identifier(self.reader.appointments_table())
        );

        let affected = db.execute(&sql, params![payload, appointment_id]).map_err(|err| {
            PatientIdentityError::RowWriteFailed {
                appointment_id,
                message: err.to_string(),
            }
        })?;

        if affected == 0 {
            debug!("Appointment {} gained patient_info since the scan", appointment_id);
            return Ok(RowOutcome::AlreadyResolved);
        }

        debug!("Appointment {} -> {}", appointment_id, name);
        Ok(RowOutcome::Written(name))
    }
}
