//! Infrastructure layer: ledger storage backends, export codecs, config.

pub mod config;
pub mod export;
pub mod ledger;


pub use config::{LedgerBackend, LedgerConfig};
pub use export::ExportFormat;
pub use ledger::{
    CsvFileLedger, InMemoryLedger, LedgerError, LedgerResult, ParticipantLedger, SqliteLedger,
};
