use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const DEFAULT_CANDIDATES: &str = "database.sqlite:data/database.sqlite:server/database.sqlite";

/// Variables the wider booking system reads at startup. Only presence is ever reported.
const OAUTH_VARS: [&str; 4] = [
    "GOOGLE_CLIENT_ID",
    "GOOGLE_CLIENT_SECRET",
    "GOOGLE_CALLBACK_URL",
    "JWT_SECRET",
];

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_path: Option<PathBuf>,
    pub database_candidates: Vec<PathBuf>,
    pub appointments_table: String,
    pub users_table: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvVarStatus {
    pub name: String,
    pub set: bool,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    Explicit(PathBuf),
    Candidate {
        path: PathBuf,
        /// Other candidates that also exist on disk.
        shadowed: Vec<PathBuf>,
    },
    NotFound { searched: Vec<PathBuf> },
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_path = lookup("DATABASE_PATH")
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        if database_path.is_none() {
            warn!("DATABASE_PATH not set, falling back to candidate paths");
        }

        let database_candidates = lookup("DATABASE_CANDIDATES")
            .unwrap_or_else(|| DEFAULT_CANDIDATES.to_string())
            .split(':')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(PathBuf::from)
            .collect();

        let config = Self {
            database_path,
            database_candidates,
            appointments_table: lookup("APPOINTMENTS_TABLE")
                .unwrap_or_else(|| "appointments".to_string()),
            users_table: lookup("USERS_TABLE").unwrap_or_else(|| "users".to_string()),
        };

        if !config.is_configured() {
            warn!("No database location configured - set DATABASE_PATH or DATABASE_CANDIDATES");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        self.database_path.is_some() || !self.database_candidates.is_empty()
    }

    /// Pick the database file to open. An explicit path always wins, even if it
    /// does not exist yet; opening it is what reports the problem.
    pub fn locate_database(&self) -> DatabaseLocation {
        if let Some(path) = &self.database_path {
            return DatabaseLocation::Explicit(path.clone());
        }

        self.locate_among(|path| path.is_file())
    }

    fn locate_among<F>(&self, exists: F) -> DatabaseLocation
    where
        F: Fn(&Path) -> bool,
    {
        let mut existing: Vec<PathBuf> = self
            .database_candidates
            .iter()
            .filter(|path| exists(path))
            .cloned()
            .collect();

        debug!("Found {} existing database candidates", existing.len());

        if existing.is_empty() {
            return DatabaseLocation::NotFound {
                searched: self.database_candidates.clone(),
            };
        }

        let path = existing.remove(0);
        if !existing.is_empty() {
            warn!(
                "Multiple database files found; using {} and ignoring {:?}",
                path.display(),
                existing
            );
        }

        DatabaseLocation::Candidate { path, shadowed: existing }
    }

    pub fn env_report(&self) -> Vec<EnvVarStatus> {
        Self::env_report_with(|key| env::var(key).ok())
    }

    pub fn env_report_with<F>(lookup: F) -> Vec<EnvVarStatus>
    where
        F: Fn(&str) -> Option<String>,
    {
        let is_set = |key: &str| lookup(key).map(|v| !v.trim().is_empty()).unwrap_or(false);

        let mut report = vec![EnvVarStatus {
            name: "DATABASE_PATH".to_string(),
            set: is_set("DATABASE_PATH"),
            required: false,
        }];

        for name in ["DATABASE_CANDIDATES", "APPOINTMENTS_TABLE", "USERS_TABLE"] {
            report.push(EnvVarStatus {
                name: name.to_string(),
                set: is_set(name),
                required: false,
            });
        }

        for name in OAUTH_VARS {
            report.push(EnvVarStatus {
                name: name.to_string(),
                set: is_set(name),
                required: true,
            });
        }

        report
    }
}
