use std::path::PathBuf;

use rusqlite::params;
use tempfile::TempDir;

use shared_config::AppConfig;
use shared_database::Database;

/// Shape of the booking database before `isNewPatient` and `patient_info` existed.
pub const LEGACY_SCHEMA: &str = "
    CREATE TABLE users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT,
        email TEXT NOT NULL,
        role TEXT NOT NULL DEFAULT 'patient'
    );
    CREATE TABLE appointments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        patient_id INTEGER NOT NULL,
        doctor_id INTEGER NOT NULL,
        date TEXT NOT NULL,
        time TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        notes TEXT,
        created_at TEXT DEFAULT CURRENT_TIMESTAMP
    );
";

pub const CURRENT_COLUMNS: &str = "
    ALTER TABLE appointments ADD COLUMN isNewPatient BOOLEAN DEFAULT 0;
    ALTER TABLE appointments ADD COLUMN patient_info TEXT DEFAULT NULL;
";

/// A throwaway database file that lives as long as the fixture.
pub struct TestDatabase {
    _dir: TempDir,
    pub path: PathBuf,
}

impl TestDatabase {
    pub fn legacy() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("database.sqlite");

        let db = Database::create(&path).expect("Failed to create test database");
        db.connection()
            .execute_batch(LEGACY_SCHEMA)
            .expect("Failed to create legacy schema");
        db.close().expect("Failed to close test database");

        Self { _dir: dir, path }
    }

    pub fn current() -> Self {
        let fixture = Self::legacy();
        let db = fixture.open();
        db.connection()
            .execute_batch(CURRENT_COLUMNS)
            .expect("Failed to add current columns");
        fixture
    }

    pub fn open(&self) -> Database {
        Database::open_path(&self.path).expect("Failed to open test database")
    }

    pub fn config(&self) -> AppConfig {
        AppConfig {
            database_path: Some(self.path.clone()),
            database_candidates: Vec::new(),
            appointments_table: "appointments".to_string(),
            users_table: "users".to_string(),
        }
    }
}

pub fn add_user(db: &Database, name: Option<&str>, email: &str) -> i64 {
    db.insert(
        "INSERT INTO users (name, email) VALUES (?1, ?2)",
        params![name, email],
    )
    .expect("Failed to insert user")
}

#[derive(Debug, Clone)]
pub struct AppointmentSeed {
    pub booking_account_id: i64,
    pub doctor_id: i64,
    pub date: String,
    pub time: String,
    pub status: String,
    pub notes: Option<String>,
    pub patient_info: Option<String>,
}

impl AppointmentSeed {
    pub fn booked_by(booking_account_id: i64) -> Self {
        Self {
            booking_account_id,
            doctor_id: 1,
            date: "2025-03-14".to_string(),
            time: "10:30".to_string(),
            status: "confirmed".to_string(),
            notes: None,
            patient_info: None,
        }
    }

    pub fn notes(mut self, notes: &str) -> Self {
        self.notes = Some(notes.to_string());
        self
    }

    pub fn patient_info(mut self, raw: &str) -> Self {
        self.patient_info = Some(raw.to_string());
        self
    }
}

/// Inserts an appointment. `patient_info` is only written when set, so legacy
/// fixtures without the column can still be seeded.
pub fn add_appointment(db: &Database, seed: &AppointmentSeed) -> i64 {
    let inserted = match &seed.patient_info {
        Some(raw) => db.insert(
            "INSERT INTO appointments (patient_id, doctor_id, date, time, status, notes, patient_info)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                seed.booking_account_id,
                seed.doctor_id,
                seed.date,
                seed.time,
                seed.status,
                seed.notes,
                raw
            ],
        ),
        None => db.insert(
            "INSERT INTO appointments (patient_id, doctor_id, date, time, status, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                seed.booking_account_id,
                seed.doctor_id,
                seed.date,
                seed.time,
                seed.status,
                seed.notes
            ],
        ),
    };

    inserted.expect("Failed to insert appointment")
}

pub fn read_patient_info(db: &Database, appointment_id: i64) -> Option<String> {
    db.connection()
        .query_row(
            "SELECT patient_info FROM appointments WHERE id = ?1",
            [appointment_id],
            |row| row.get(0),
        )
        .expect("Failed to read patient_info")
}
