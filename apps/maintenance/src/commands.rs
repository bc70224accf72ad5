use serde::Serialize;
use tracing::{debug, warn};

use patient_identity_cell::{
    resolve_patient_display, AppointmentReader, BackfillSummary, PatientDisplay,
    PatientInfoBackfill,
};
use schema_cell::{
    appointment_columns, ColumnDefault, ColumnSpec, EnsureOutcome, GuardOptions,
    SchemaEvolutionGuard,
};
use shared_config::AppConfig;
use shared_database::Database;
use shared_models::{AppError, BookedAppointment};

use crate::cli::Command;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AppointmentView<'a> {
    #[serde(flatten)]
    booked: &'a BookedAppointment,
    patient: &'a PatientDisplay,
}

/// Runs one command. The connection is opened once and closed on every exit path.
pub fn run(config: &AppConfig, command: Command) -> Result<(), AppError> {
    if let Command::Env = command {
        print_env_report(config);
        return Ok(());
    }

    let mut db = Database::open(config).map_err(|err| AppError::Database(err.to_string()))?;
    println!("Database: {}", db.path().display());

    let result = run_with_database(config, &mut db, command);

    if let Err(err) = db.close() {
        warn!("Failed to close database cleanly: {}", err);
        result?;
        return Err(AppError::Database(err.to_string()));
    }

    result
}

fn run_with_database(
    config: &AppConfig,
    db: &mut Database,
    command: Command,
) -> Result<(), AppError> {
    match command {
        Command::Migrate { round_trip } => {
            ensure_columns(db, &appointment_columns(&config.appointments_table), round_trip)
        }
        Command::AddColumn {
            table,
            column,
            column_type,
            default,
            round_trip,
        } => {
            let table = table.unwrap_or_else(|| config.appointments_table.clone());
            let default = ColumnDefault::parse(&default, column_type)?;
            let spec = ColumnSpec::new(&table, &column, column_type, default);
            ensure_columns(db, &[spec], round_trip)
        }
        Command::BackfillPatientInfo { dry_run } => {
            ensure_columns(db, &appointment_columns(&config.appointments_table), false)?;
            let reader = AppointmentReader::new(config);
            let summary = PatientInfoBackfill::new(&reader, dry_run).run(db)?;
            print_backfill_summary(&summary);
            Ok(())
        }
        Command::Appointments { limit, json } => {
            ensure_columns(db, &appointment_columns(&config.appointments_table), false)?;
            list_appointments(config, db, limit, json)
        }
        Command::Schema { table } => {
            let table = table.unwrap_or_else(|| config.appointments_table.clone());
            print_schema(db, &table)
        }
        Command::Env => {
            print_env_report(config);
            Ok(())
        }
    }
}

/// Prints one line per column and fails with the first schema error, after every
/// column has been attempted.
fn ensure_columns(
    db: &mut Database,
    specs: &[ColumnSpec],
    round_trip: bool,
) -> Result<(), AppError> {
    let guard = SchemaEvolutionGuard::new(GuardOptions { round_trip });
    let mut first_failure = None;

    for report in guard.ensure_columns(db, specs) {
        let name = report.spec.qualified_name();
        match report.result {
            Ok(EnsureOutcome::Applied) => println!("✅ {}: applied", name),
            Ok(EnsureOutcome::AlreadyPresent) => println!("✅ {}: already present", name),
            Err(err) => {
                println!("❌ {}: {}", name, err);
                if first_failure.is_none() {
                    first_failure = Some(AppError::from(err));
                }
            }
        }
    }

    match first_failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn list_appointments(
    config: &AppConfig,
    db: &Database,
    limit: usize,
    json: bool,
) -> Result<(), AppError> {
    let reader = AppointmentReader::new(config);
    let booked = reader.list_booked(db, limit)?;
    debug!("Resolving {} appointments", booked.len());

    for entry in &booked {
        let patient = resolve_patient_display(&entry.appointment, &entry.booking_account_name);

        if json {
            let view = AppointmentView { booked: entry, patient: &patient };
            let line =
                serde_json::to_string(&view).map_err(|err| AppError::Internal(err.to_string()))?;
            println!("{}", line);
            continue;
        }

        let appointment = &entry.appointment;
        let for_whom = if patient.is_actual_patient_distinct {
            format!("{} (booked by {})", patient.display_name, patient.booker_name)
        } else {
            patient.display_name.clone()
        };
        println!(
            "#{} {} {} [{}] doctor {} - {}{} ({})",
            appointment.id,
            appointment.date,
            appointment.time,
            appointment.status,
            appointment.doctor_id,
            for_whom,
            if appointment.is_new_patient { " [new patient]" } else { "" },
            patient.source
        );
    }

    if booked.is_empty() {
        println!("No appointments found");
    }

    Ok(())
}

fn print_backfill_summary(summary: &BackfillSummary) {
    let verb = if summary.dry_run { "would write" } else { "wrote" };

    for write in &summary.writes {
        println!("  #{}: {} patient_info for {}", write.appointment_id, verb, write.name);
    }
    for failure in &summary.failed {
        println!("❌ #{}: {}", failure.appointment_id, failure.error);
    }

    println!(
        "Backfill {}: {} rows without patient_info, {} {}, {} without marker, {} already resolved, {} failed ({} ms)",
        if summary.dry_run { "dry run" } else { "complete" },
        summary.scanned,
        summary.succeeded(),
        verb,
        summary.without_marker,
        summary.already_resolved,
        summary.failed.len(),
        (summary.completed_at - summary.started_at).num_milliseconds()
    );
}

fn print_schema(db: &Database, table: &str) -> Result<(), AppError> {
    let exists = db
        .table_exists(table)
        .map_err(|err| AppError::Database(err.to_string()))?;
    if !exists {
        return Err(AppError::ValidationError(format!("table '{}' not found", table)));
    }

    let columns = db
        .table_columns(table)
        .map_err(|err| AppError::Database(err.to_string()))?;

    println!("{} ({} columns)", table, columns.len());
    for column in columns {
        println!(
            "  {:>2} {:<20} {:<10} {}{}{}",
            column.cid,
            column.name,
            column.declared_type,
            if column.not_null { "NOT NULL " } else { "" },
            column
                .default_value
                .map(|value| format!("DEFAULT {} ", value))
                .unwrap_or_default(),
            if column.primary_key { "PRIMARY KEY" } else { "" }
        );
    }

    Ok(())
}

fn print_env_report(config: &AppConfig) {
    for status in config.env_report() {
        let marker = match (status.set, status.required) {
            (true, _) => "✅",
            (false, true) => "❌",
            (false, false) => "➖",
        };
        println!("{} {}", marker, status.name);
    }

    match config.locate_database() {
        shared_config::DatabaseLocation::Explicit(path) => {
            println!("Database (DATABASE_PATH): {}", path.display())
        }
        shared_config::DatabaseLocation::Candidate { path, shadowed } => {
            println!("Database (candidate): {}", path.display());
            for other in shadowed {
                println!("  ⚠️ also present: {}", other.display());
            }
        }
        shared_config::DatabaseLocation::NotFound { searched } => {
            println!("Database: none of {:?} exist", searched);
        }
    }
}
