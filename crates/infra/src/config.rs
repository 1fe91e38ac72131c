//! Configuration loading and representation.

use std::path::PathBuf;

use roster_core::ListPolicy;

/// Storage backing for the participant ledger.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum LedgerBackend {
    #[default]
    Csv,
    Sqlite,
    Memory,
}

impl LedgerBackend {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "csv" | "file" => Some(Self::Csv),
            "sqlite" | "db" => Some(Self::Sqlite),
            "memory" | "in-memory" => Some(Self::Memory),
            _ => None,
        }
    }
}

/// Ledger configuration.
///
/// | env | default |
/// |---|---|
/// | `LEDGER_BACKEND` | `csv` |
/// | `CSV_PATH` | `participants.csv` |
/// | `DATABASE_URL` | `sqlite://participants.db` |
/// | `LIST_DEFAULT` / `LIST_MIN` / `LIST_MAX` | `20` / `1` / `200` |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    pub backend: LedgerBackend,
    pub csv_path: PathBuf,
    pub database_url: String,
    pub list_policy: ListPolicy,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            backend: LedgerBackend::Csv,
            csv_path: PathBuf::from("participants.csv"),
            database_url: "sqlite://participants.db".to_string(),
            list_policy: ListPolicy::default(),
        }
    }
}

impl LedgerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unusable values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let backend = match lookup("LEDGER_BACKEND") {
            Some(raw) => LedgerBackend::parse(&raw).unwrap_or_else(|| {
                tracing::warn!(value = %raw, "unknown LEDGER_BACKEND; using csv");
                LedgerBackend::Csv
            }),
            None => defaults.backend,
        };

        let csv_path = lookup("CSV_PATH")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.csv_path);

        let database_url = lookup("DATABASE_URL")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.database_url);

        let list_policy = ListPolicy::new(
            number_or_default(&lookup, "LIST_DEFAULT", ListPolicy::DEFAULT_LIMIT),
            number_or_default(&lookup, "LIST_MIN", ListPolicy::MIN_LIMIT),
            number_or_default(&lookup, "LIST_MAX", ListPolicy::MAX_LIMIT),
        );

        Self {
            backend,
            csv_path,
            database_url,
            list_policy,
        }
    }
}

pub fn number_or_default(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: usize) -> usize {
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, default, "invalid number in environment; using default");
            default
        }),
        None => default,
    }
}
