use assert_matches::assert_matches;

use schema_cell::*;
use shared_database::Database;
use shared_utils::test_utils::{add_appointment, add_user, AppointmentSeed, TestDatabase};

fn schema_version(db: &Database) -> i64 {
    db.connection()
        .query_row("PRAGMA schema_version", [], |row| row.get(0))
        .expect("Failed to read schema_version")
}

fn row_count(db: &Database, table: &str) -> i64 {
    db.connection()
        .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
        .expect("Failed to count rows")
}

fn is_new_patient_spec() -> ColumnSpec {
    ColumnSpec::new(
        "appointments",
        "isNewPatient",
        ColumnType::Boolean,
        ColumnDefault::Boolean(false),
    )
}

#[test]
fn test_ensure_column_is_idempotent() {
    let fixture = TestDatabase::legacy();
    let mut db = fixture.open();
    let guard = SchemaEvolutionGuard::new(GuardOptions::default());
    let spec = is_new_patient_spec();

    let first = guard.ensure_column(&mut db, &spec).unwrap();
    let schema_after_first = db.table_columns("appointments").unwrap();

    let second = guard.ensure_column(&mut db, &spec).unwrap();
    let schema_after_second = db.table_columns("appointments").unwrap();

    assert_eq!(first, EnsureOutcome::Applied);
    assert_eq!(second, EnsureOutcome::AlreadyPresent);
    assert_eq!(schema_after_first, schema_after_second);
}

#[test]
fn test_already_present_column_issues_no_write() {
    let fixture = TestDatabase::current();
    let mut db = fixture.open();
    let guard = SchemaEvolutionGuard::new(GuardOptions { round_trip: true });

    let columns_before = db.table_columns("appointments").unwrap().len();
    let version_before = schema_version(&db);

    let outcome = guard.ensure_column(&mut db, &is_new_patient_spec()).unwrap();

    assert_eq!(outcome, EnsureOutcome::AlreadyPresent);
    assert_eq!(db.table_columns("appointments").unwrap().len(), columns_before);
    assert_eq!(schema_version(&db), version_before);
}

#[test]
fn test_applied_column_carries_declared_default() {
    let fixture = TestDatabase::legacy();
    let mut db = fixture.open();
    let account = add_user(&db, Some("abc"), "abc@example.com");
    add_appointment(&db, &AppointmentSeed::booked_by(account));
    let guard = SchemaEvolutionGuard::new(GuardOptions { round_trip: true });

    let outcome = guard.ensure_column(&mut db, &is_new_patient_spec()).unwrap();
    assert_eq!(outcome, EnsureOutcome::Applied);

    let column = db
        .find_column("appointments", "isNewPatient")
        .unwrap()
        .expect("column should exist");
    assert_eq!(column.declared_type, "BOOLEAN");
    assert_eq!(column.default_value.as_deref(), Some("0"));

    // Existing rows pick up the default.
    let existing: i64 = db
        .connection()
        .query_row("SELECT isNewPatient FROM appointments", [], |row| row.get(0))
        .unwrap();
    assert_eq!(existing, 0);

    // A new row omitting the column reads back the default.
    let id = add_appointment(&db, &AppointmentSeed::booked_by(account));
    let fresh: i64 = db
        .connection()
        .query_row(
            "SELECT isNewPatient FROM appointments WHERE id = ?1",
            [id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(fresh, 0);
}

#[test]
fn test_round_trip_leaves_no_rows_behind() {
    let fixture = TestDatabase::legacy();
    let mut db = fixture.open();
    let account = add_user(&db, Some("abc"), "abc@example.com");
    add_appointment(&db, &AppointmentSeed::booked_by(account));
    let guard = SchemaEvolutionGuard::new(GuardOptions { round_trip: true });

    let spec = ColumnSpec::new(
        "appointments",
        "patient_info",
        ColumnType::Text,
        ColumnDefault::Null,
    );
    guard.ensure_column(&mut db, &spec).unwrap();

    assert_eq!(row_count(&db, "appointments"), 1);
}

#[test]
fn test_missing_table_is_an_alteration_failure() {
    let fixture = TestDatabase::legacy();
    let mut db = fixture.open();
    let guard = SchemaEvolutionGuard::new(GuardOptions::default());
    let spec = ColumnSpec::new("bookings", "patient_info", ColumnType::Text, ColumnDefault::Null);

    let result = guard.ensure_column(&mut db, &spec);

    assert_matches!(
        result,
        Err(SchemaError::AlterationFailed { ref table, ref column, .. })
            if table == "bookings" && column == "patient_info"
    );
}

#[test]
fn test_constraint_on_other_column_does_not_fail_new_column() {
    let fixture = TestDatabase::legacy();
    let mut db = fixture.open();
    db.execute(
        "CREATE TABLE triage (
            id INTEGER PRIMARY KEY,
            level TEXT NOT NULL CHECK (level IN ('low', 'high'))
        )",
        [],
    )
    .unwrap();
    let guard = SchemaEvolutionGuard::new(GuardOptions { round_trip: true });
    let spec = ColumnSpec::new(
        "triage",
        "reviewed",
        ColumnType::Boolean,
        ColumnDefault::Boolean(false),
    );

    // `level` rejects the synthetic row, which says nothing about `reviewed`.
    let first = guard.ensure_column(&mut db, &spec);
    let second = guard.ensure_column(&mut db, &spec);

    assert_matches!(first, Ok(EnsureOutcome::Applied));
    assert_matches!(second, Ok(EnsureOutcome::AlreadyPresent));
    assert_eq!(row_count(&db, "triage"), 0);

    db.execute("INSERT INTO triage (level) VALUES ('low')", []).unwrap();
    let reviewed: i64 = db
        .connection()
        .query_row("SELECT reviewed FROM triage", [], |row| row.get(0))
        .unwrap();
    assert_eq!(reviewed, 0);
}

#[test]
fn test_round_trip_stores_each_declared_type() {
    let fixture = TestDatabase::legacy();
    let mut db = fixture.open();
    db.execute(
        "CREATE TABLE visits (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT NOT NULL UNIQUE
        )",
        [],
    )
    .unwrap();
    let guard = SchemaEvolutionGuard::new(GuardOptions { round_trip: true });
    let specs = vec![
        ColumnSpec::new("visits", "summary", ColumnType::Text, ColumnDefault::Null),
        ColumnSpec::new("visits", "attempts", ColumnType::Integer, ColumnDefault::Integer(0)),
        ColumnSpec::new("visits", "fee", ColumnType::Real, ColumnDefault::Real(0.5)),
        ColumnSpec::new("visits", "paid", ColumnType::Boolean, ColumnDefault::Boolean(true)),
        ColumnSpec::new("visits", "scan", ColumnType::Blob, ColumnDefault::Null),
    ];

    for report in guard.ensure_columns(&mut db, &specs) {
        assert_matches!(report.result, Ok(EnsureOutcome::Applied), "{}", report.spec.column);
    }

    assert_eq!(row_count(&db, "visits"), 0);
    let sequence: i64 = db
        .connection()
        .query_row(
            "SELECT COUNT(*) FROM sqlite_sequence WHERE name = 'visits'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(sequence, 0);
}

#[test]
fn test_ensure_columns_reports_each_column() {
    let fixture = TestDatabase::legacy();
    let mut db = fixture.open();
    let guard = SchemaEvolutionGuard::new(GuardOptions::default());
    let specs = appointment_columns("appointments");

    let first: Vec<_> = guard
        .ensure_columns(&mut db, &specs)
        .into_iter()
        .map(|report| report.result.unwrap())
        .collect();
    let second: Vec<_> = guard
        .ensure_columns(&mut db, &specs)
        .into_iter()
        .map(|report| report.result.unwrap())
        .collect();

    assert_eq!(first, vec![EnsureOutcome::Applied, EnsureOutcome::Applied]);
    assert_eq!(
        second,
        vec![EnsureOutcome::AlreadyPresent, EnsureOutcome::AlreadyPresent]
    );
}

#[test]
fn test_failure_on_one_column_does_not_skip_the_next() {
    let fixture = TestDatabase::legacy();
    let mut db = fixture.open();
    let guard = SchemaEvolutionGuard::new(GuardOptions::default());
    let specs = vec![
        ColumnSpec::new("bookings", "patient_info", ColumnType::Text, ColumnDefault::Null),
        ColumnSpec::new("appointments", "patient_info", ColumnType::Text, ColumnDefault::Null),
    ];

    let reports = guard.ensure_columns(&mut db, &specs);

    assert!(reports[0].is_failure());
    assert_matches!(reports[1].result, Ok(EnsureOutcome::Applied));
}

#[test]
fn test_guard_runs_against_reopened_file() {
    let fixture = TestDatabase::legacy();
    let guard = SchemaEvolutionGuard::new(GuardOptions::default());

    let mut first = fixture.open();
    guard.ensure_column(&mut first, &is_new_patient_spec()).unwrap();
    first.close().unwrap();

    // A separate run sees the live schema rather than anything cached.
    let mut second = fixture.open();
    let outcome = guard.ensure_column(&mut second, &is_new_patient_spec()).unwrap();
    assert_eq!(outcome, EnsureOutcome::AlreadyPresent);
}
