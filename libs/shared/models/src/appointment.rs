use serde::{Deserialize, Serialize};

/// One row of the `appointments` table as the maintenance tools see it.
///
/// `booking_account_id` is stored in the legacy `patient_id` column. It names the
/// account that made the booking, which is not necessarily the person treated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentRecord {
    pub id: i64,
    pub booking_account_id: i64,
    pub doctor_id: i64,
    pub date: String,
    pub time: String,
    pub status: String,
    pub notes: Option<String>,
    /// Raw serialized payload; may be absent or malformed on older rows.
    pub patient_info: Option<String>,
    #[serde(default)]
    pub is_new_patient: bool,
}

/// Appointment joined with the display name of its booking account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookedAppointment {
    #[serde(flatten)]
    pub appointment: AppointmentRecord,
    pub booking_account_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_new_patient_defaults_to_false() {
        let json = r#"{"id":1,"bookingAccountId":7,"doctorId":3,"date":"2025-03-01",
            "time":"10:00","status":"pending","notes":null,"patientInfo":null}"#;

        let parsed: AppointmentRecord = serde_json::from_str(json).unwrap();
        assert!(!parsed.is_new_patient);
    }
}
