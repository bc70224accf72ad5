use clap::{Parser, Subcommand};

use schema_cell::ColumnType;

#[derive(Debug, Parser)]
#[command(
    name = "clinic-maint",
    version,
    about = "Maintenance tools for the clinic booking database"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Add any missing appointment columns (isNewPatient, patient_info)
    Migrate {
        /// Round-trip a synthetic row through each newly added column
        #[arg(long)]
        round_trip: bool,
    },
    /// Ensure a single column exists on a table
    AddColumn {
        /// Defaults to APPOINTMENTS_TABLE
        #[arg(long)]
        table: Option<String>,
        #[arg(long)]
        column: String,
        /// text, integer, real, boolean or blob
        #[arg(long = "type")]
        column_type: ColumnType,
        #[arg(long, default_value = "null")]
        default: String,
        #[arg(long)]
        round_trip: bool,
    },
    /// Move patient names declared in notes into patient_info
    BackfillPatientInfo {
        /// Report what would be written without writing
        #[arg(long)]
        dry_run: bool,
    },
    /// List recent appointments with who booked and who is treated
    Appointments {
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// Print one JSON object per line
        #[arg(long)]
        json: bool,
    },
    /// Show the live column list of a table
    Schema {
        /// Defaults to APPOINTMENTS_TABLE
        table: Option<String>,
    },
    /// Report which environment variables are set (never their values)
    Env,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Migrate { .. } => "migrate",
            Command::AddColumn { .. } => "add-column",
            Command::BackfillPatientInfo { .. } => "backfill-patient-info",
            Command::Appointments { .. } => "appointments",
            Command::Schema { .. } => "schema",
            Command::Env => "env",
        }
    }
}
