use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use roster_core::{Lang, ListLimit, ParticipantRecord, Participation, UserId};

use crate::export::ExportFormat;

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Ledger storage failure.
///
/// These are **infrastructure errors** only. Bad input (unsupported language,
/// out-of-range listing size, unknown export format) is normalized before it
/// reaches storage and never shows up here.
///
/// When any of these is returned from a mutation, the backing store still holds
/// the last snapshot that was successfully committed.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{op} failed for {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv encoding failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("corrupt ledger data: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl LedgerError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Self::Corrupt(msg.into())
    }

    /// The store could not be reached right now; retrying later may succeed.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Database(sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_))
        )
    }
}

/// Durable, concurrency-safe participant ledger.
///
/// Holds at most one record per [`UserId`]. Every backend serializes mutations
/// behind a single store-wide lock and commits each one atomically: a reader
/// observes either the snapshot before a mutation or the one after it.
///
/// Mutations are durable by the time they return `Ok`.
#[async_trait]
pub trait ParticipantLedger: Send + Sync {
    /// Insert or update the record for `event.user_id`.
    ///
    /// `first_seen` is set only on creation; `lang` changes only for a supported hint.
    async fn upsert(&self, event: Participation) -> LedgerResult<()>;

    /// Stored language, or [`Lang::DEFAULT`] for an unknown user.
    async fn get_lang(&self, user_id: UserId) -> LedgerResult<Lang>;

    /// Store a language preference; unsupported codes become the default.
    ///
    /// Creates the record (tagged `"lang"`) when the user is unknown. For a known
    /// user this does not count as participation.
    async fn set_lang(&self, user_id: UserId, lang: &str) -> LedgerResult<()>;

    /// Number of distinct users.
    async fn count(&self) -> LedgerResult<usize>;

    /// Users per language; every supported language is present as a key.
    async fn count_by_lang(&self) -> LedgerResult<BTreeMap<Lang, usize>>;

    /// Most recent participants, newest first, ties in insertion order.
    async fn list_recent(&self, limit: ListLimit) -> LedgerResult<Vec<ParticipantRecord>>;

    /// Point-in-time copy of every record in storage (insertion) order.
    async fn snapshot(&self) -> LedgerResult<Vec<ParticipantRecord>>;

    /// Remove every record.
    async fn reset(&self) -> LedgerResult<()>;

    /// Serialize a consistent snapshot in the requested format.
    async fn export_snapshot(&self, format: ExportFormat) -> LedgerResult<Vec<u8>> {
        let records = self.snapshot().await?;
        format.encode(&records)
    }
}

#[async_trait]
impl<S> ParticipantLedger for Arc<S>
where
    S: ParticipantLedger + ?Sized,
{
    async fn upsert(&self, event: Participation) -> LedgerResult<()> {
        (**self).upsert(event).await
    }

    async fn get_lang(&self, user_id: UserId) -> LedgerResult<Lang> {
        (**self).get_lang(user_id).await
    }

    async fn set_lang(&self, user_id: UserId, lang: &str) -> LedgerResult<()> {
        (**self).set_lang(user_id, lang).await
    }

    async fn count(&self) -> LedgerResult<usize> {
        (**self).count().await
    }

    async fn count_by_lang(&self) -> LedgerResult<BTreeMap<Lang, usize>> {
        (**self).count_by_lang().await
    }

    async fn list_recent(&self, limit: ListLimit) -> LedgerResult<Vec<ParticipantRecord>> {
        (**self).list_recent(limit).await
    }

    async fn snapshot(&self) -> LedgerResult<Vec<ParticipantRecord>> {
        (**self).snapshot().await
    }

    async fn reset(&self) -> LedgerResult<()> {
        (**self).reset().await
    }

    async fn export_snapshot(&self, format: ExportFormat) -> LedgerResult<Vec<u8>> {
        (**self).export_snapshot(format).await
    }
}

/// Language counts with every supported language present.
pub(crate) fn empty_lang_counts() -> BTreeMap<Lang, usize> {
    Lang::ALL.iter().map(|l| (*l, 0)).collect()
}
