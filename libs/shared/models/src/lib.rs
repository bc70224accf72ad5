pub mod appointment;
pub mod error;

pub use appointment::{AppointmentRecord, BookedAppointment};
pub use error::AppError;
