use rusqlite::types::Value;
use rusqlite::Row;
use tracing::debug;

use shared_config::AppConfig;
use shared_database::{quote_identifier, Database};
use shared_models::{AppointmentRecord, BookedAppointment};

use crate::models::{PatientIdentityError, PendingPatientInfo};

const APPOINTMENT_COLUMNS: &str = concat!(
    "a.id, a.patient_id, a.doctor_id, a.date, a.time, a.status, ",
    "a.notes, a.patient_info, a.isNewPatient"
);

/// Reads appointment rows. Expects `patient_info` and `isNewPatient` to exist, so
/// callers run the schema guard first.
pub struct AppointmentReader {
    appointments_table: String,
    users_table: String,
}

impl AppointmentReader {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            appointments_table: config.appointments_table.clone(),
            users_table: config.users_table.clone(),
        }
    }

    pub fn appointments_table(&self) -> &str {
        &self.appointments_table
    }

    /// Most recent appointments first, each with its booking account's display name.
    pub fn list_booked(
        &self,
        db: &Database,
        limit: usize,
    ) -> Result<Vec<BookedAppointment>, PatientIdentityError> {
        let sql = format!(
            "SELECT {columns}, NULLIF(TRIM(u.name), ''), u.email
             FROM {appointments} a
             LEFT JOIN {users} u ON u.id = a.patient_id
             ORDER BY a.date DESC, a.time DESC, a.id DESC
             LIMIT ?1",
            columns = APPOINTMENT_COLUMNS,
            appointments = quote_identifier(&self.appointments_table),
            users = quote_identifier(&self.users_table),
        );

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = db.connection().prepare(&sql)?;
        let rows = stmt
            .query_map([limit], |row| {
                let appointment = appointment_from_row(row)?;
                let name: Option<String> = row.get(9)?;
                let email: Option<String> = row.get(10)?;
                let booking_account_name = name
                    .or(email)
                    .unwrap_or_else(|| format!("account #{}", appointment.booking_account_id));

                Ok(BookedAppointment {
                    appointment,
                    booking_account_name,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        debug!("Loaded {} appointments", rows.len());
        Ok(rows)
    }

    /// Rows with no usable `patient_info` that carry notes. Only the id and notes
    /// are read, so a malformed value elsewhere in a row cannot fail the scan.
    pub fn missing_patient_info(
        &self,
        db: &Database,
    ) -> Result<Vec<PendingPatientInfo>, PatientIdentityError> {
        let sql = format!(
            "SELECT a.rowid, a.id, a.notes
             FROM {appointments} a
             WHERE (a.patient_info IS NULL OR TRIM(a.patient_info) = '')
               AND a.notes IS NOT NULL
             ORDER BY a.rowid",
            appointments = quote_identifier(&self.appointments_table),
        );

        let mut stmt = db.connection().prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(PendingPatientInfo {
                    rowid: row.get(0)?,
                    appointment_id: loose_integer(row.get(1)?),
                    notes: text_or_empty(row.get(2)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }
}

/// Maps the first nine selected columns. Text and flag columns are read loosely;
/// the id columns must hold integers.
fn appointment_from_row(row: &Row<'_>) -> rusqlite::Result<AppointmentRecord> {
    Ok(AppointmentRecord {
        id: row.get(0)?,
        booking_account_id: row.get(1)?,
        doctor_id: row.get(2)?,
        date: text_or_empty(row.get(3)?),
        time: text_or_empty(row.get(4)?),
        status: text_or_empty(row.get(5)?),
        notes: optional_text(row.get(6)?),
        patient_info: optional_text(row.get(7)?),
        is_new_patient: flag(row.get(8)?),
    })
}

fn loose_integer(value: Value) -> Option<i64> {
    match value {
        Value::Integer(n) => Some(n),
        Value::Real(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => Some(n as i64),
        Value::Text(text) => text.trim().parse().ok(),
        Value::Null | Value::Real(_) | Value::Blob(_) => None,
    }
}

fn optional_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Text(text) => Some(text),
        Value::Blob(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Value::Integer(n) => Some(n.to_string()),
        Value::Real(n) => Some(n.to_string()),
    }
}

fn text_or_empty(value: Value) -> String {
    optional_text(value).unwrap_or_default()
}

fn flag(value: Value) -> bool {
    match value {
        Value::Integer(n) => n != 0,
        Value::Real(n) => n != 0.0,
        Value::Text(text) => matches!(text.trim().to_ascii_lowercase().as_str(), "1" | "true"),
        Value::Null | Value::Blob(_) => false,
    }
}
