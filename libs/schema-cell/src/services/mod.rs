pub mod guard;
mod round_trip;

pub use guard::{ColumnReport, SchemaEvolutionGuard};
pub use round_trip::RoundTripError;
