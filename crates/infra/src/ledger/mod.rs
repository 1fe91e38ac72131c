//! Participant ledger boundary.
//!
//! One contract ([`ParticipantLedger`]) with three backings: a CSV file
//! rewritten atomically on each mutation, a transactional SQLite table, and an
//! in-memory set for tests/dev.

pub mod csv_file;
pub mod in_memory;
pub mod snapshot;
pub mod sqlite;
pub mod r#trait;

use std::sync::Arc;

pub use csv_file::CsvFileLedger;
pub use in_memory::InMemoryLedger;
pub use snapshot::Snapshot;
pub use sqlite::SqliteLedger;
pub use r#trait::{LedgerError, LedgerResult, ParticipantLedger};

use crate::config::{LedgerBackend, LedgerConfig};

/// Build the ledger selected by `config`.
///
/// Called once at process start; the handle is then shared by every request handler.
pub async fn open(config: &LedgerConfig) -> LedgerResult<Arc<dyn ParticipantLedger>> {
    let ledger: Arc<dyn ParticipantLedger> = match config.backend {
        LedgerBackend::Csv => Arc::new(CsvFileLedger::open(&config.csv_path).await?),
        LedgerBackend::Sqlite => Arc::new(SqliteLedger::open(&config.database_url).await?),
        LedgerBackend::Memory => {
            tracing::warn!("using in-memory participant ledger; data will not survive a restart");
            Arc::new(InMemoryLedger::new())
        }
    };
    Ok(ledger)
}
