use serde_json::Value;
use tracing::debug;

use shared_models::AppointmentRecord;

use crate::models::{IdentitySource, PatientDisplay};
use crate::services::legacy_notes::extract_declared_patient;

/// Decides whose name to show as "the patient" for an appointment.
///
/// Precedence: a non-empty `name` (or legacy `patientName`) in `patient_info`, then a
/// patient declared inline in `notes`, then the booking account itself. Never fails
/// and never touches the record.
pub fn resolve_patient_display(
    appointment: &AppointmentRecord,
    booking_account_name: &str,
) -> PatientDisplay {
    let booker_name = booking_account_name.to_string();

    if let Some(name) = appointment.patient_info.as_deref().and_then(patient_info_name) {
        return distinct_patient(name, booker_name, IdentitySource::PatientInfo);
    }

    if let Some(name) = appointment.notes.as_deref().and_then(extract_declared_patient) {
        return distinct_patient(name, booker_name, IdentitySource::LegacyNotes);
    }

    PatientDisplay {
        display_name: booker_name.clone(),
        booker_name,
        is_actual_patient_distinct: false,
        source: IdentitySource::BookingAccount,
    }
}

/// Reads the patient name out of a raw `patient_info` payload. Anything that is not a
/// JSON object with a non-blank string name yields `None`.
pub fn patient_info_name(raw: &str) -> Option<String> {
    if raw.trim().is_empty() {
        return None;
    }

    let payload: Value = match serde_json::from_str(raw) {
        Ok(payload) => payload,
        Err(err) => {
            debug!("Ignoring malformed patient_info: {}", err);
            return None;
        }
    };

    let object = payload.as_object()?;

    ["name", "patientName"]
        .iter()
        .filter_map(|key| object.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|name| !name.is_empty())
        .map(str::to_string)
}

fn distinct_patient(
    display_name: String,
    booker_name: String,
    source: IdentitySource,
) -> PatientDisplay {
    PatientDisplay {
        is_actual_patient_distinct: display_name != booker_name,
        display_name,
        booker_name,
        source,
    }
}
