pub mod appointments;
pub mod backfill;
pub mod legacy_notes;
pub mod resolver;

pub use appointments::AppointmentReader;
pub use backfill::PatientInfoBackfill;
pub use legacy_notes::extract_declared_patient;
pub use resolver::{patient_info_name, resolve_patient_display};
