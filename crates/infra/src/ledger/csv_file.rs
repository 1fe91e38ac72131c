//! File-backed ledger: one CSV artifact, rewritten whole on every mutation.
//!
//! Writes go through stage-then-replace: the full new snapshot is written to
//! `<path>.tmp`, fsynced, then renamed over the canonical file. An interrupted
//! write leaves the previous canonical file untouched; a stale staging file is
//! never read and is overwritten by the next write.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use roster_core::{Clock, Lang, ListLimit, ParticipantRecord, Participation, SystemClock, UserId};

use super::r#trait::{LedgerError, LedgerResult, ParticipantLedger};
use super::snapshot::Snapshot;
use crate::export;

pub struct CsvFileLedger {
    path: PathBuf,
    staging: PathBuf,
    /// Committed snapshot; always equal to the canonical file's contents.
    state: Arc<Mutex<Snapshot>>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for CsvFileLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvFileLedger")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl CsvFileLedger {
    pub async fn open(path: impl Into<PathBuf>) -> LedgerResult<Self> {
        Self::open_with_clock(path, Arc::new(SystemClock)).await
    }

    /// Open (or create) the ledger at `path`.
    ///
    /// A missing file is created with just the header row.
    pub async fn open_with_clock(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> LedgerResult<Self> {
        let path = path.into();
        let staging = staging_path(&path);

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LedgerError::io("create directory", parent, e))?;
        }

        if tokio::fs::try_exists(&staging).await.unwrap_or(false) {
            tracing::warn!(
                path = %staging.display(),
                "found staged ledger file from an interrupted write; ignoring it"
            );
        }

        let snapshot = match tokio::fs::read(&path).await {
            Ok(bytes) => Snapshot::from_records(export::decode_csv(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let empty = Snapshot::new();
                write_snapshot(&path, &staging, &empty).await?;
                empty
            }
            Err(e) => return Err(LedgerError::io("read", &path, e)),
        };

        tracing::info!(path = %path.display(), records = snapshot.len(), "participant ledger opened");

        Ok(Self {
            path,
            staging,
            state: Arc::new(Mutex::new(snapshot)),
            clock,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `op` against a copy of the committed snapshot, persist the copy, and
    /// only then make it the committed state.
    ///
    /// Persisting and swapping run in a task that owns the lock guard, so the
    /// file and the committed snapshot move together even if the caller's
    /// future is dropped mid-write.
    async fn mutate<T>(&self, op: impl FnOnce(&mut Snapshot, DateTime<Utc>) -> T) -> LedgerResult<T> {
        let mut committed = Arc::clone(&self.state).lock_owned().await;
        let mut next = committed.clone();
        let out = op(&mut next, self.clock.now());

        let path = self.path.clone();
        let staging = self.staging.clone();
        let write = tokio::spawn(async move {
            write_snapshot(&path, &staging, &next).await?;
            *committed = next;
            Ok::<_, LedgerError>(())
        });
        write
            .await
            .map_err(|e| LedgerError::io("join ledger write", &self.path, std::io::Error::other(e)))??;
        Ok(out)
    }
}

#[async_trait]
impl ParticipantLedger for CsvFileLedger {
    async fn upsert(&self, event: Participation) -> LedgerResult<()> {
        let created = self.mutate(|snap, now| snap.upsert(&event, now)).await?;
        tracing::debug!(user_id = %event.user_id, source = %event.source, created, "participant upserted");
        Ok(())
    }

    async fn get_lang(&self, user_id: UserId) -> LedgerResult<Lang> {
        Ok(self.state.lock().await.lang_of(user_id))
    }

    async fn set_lang(&self, user_id: UserId, lang: &str) -> LedgerResult<()> {
        let lang = Lang::or_default(Some(lang));
        let created = self.mutate(|snap, now| snap.set_lang(user_id, lang, now)).await?;
        tracing::debug!(user_id = %user_id, lang = %lang, created, "language preference stored");
        Ok(())
    }

    async fn count(&self) -> LedgerResult<usize> {
        Ok(self.state.lock().await.len())
    }

    async fn count_by_lang(&self) -> LedgerResult<BTreeMap<Lang, usize>> {
        Ok(self.state.lock().await.count_by_lang())
    }

    async fn list_recent(&self, limit: ListLimit) -> LedgerResult<Vec<ParticipantRecord>> {
        Ok(self.state.lock().await.recent(limit))
    }

    async fn snapshot(&self) -> LedgerResult<Vec<ParticipantRecord>> {
        Ok(self.state.lock().await.records().to_vec())
    }

    async fn reset(&self) -> LedgerResult<()> {
        self.mutate(|snap, _now| *snap = Snapshot::new()).await?;
        tracing::info!(path = %self.path.display(), "participant ledger reset");
        Ok(())
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

async fn write_snapshot(path: &Path, staging: &Path, snapshot: &Snapshot) -> LedgerResult<()> {
    let bytes = export::encode_csv(snapshot.records())?;
    stage(staging, &bytes).await?;
    commit(staging, path).await
}

/// Write the complete payload to the staging file and fsync it.
pub(crate) async fn stage(staging: &Path, bytes: &[u8]) -> LedgerResult<()> {
    let mut file = tokio::fs::File::create(staging)
        .await
        .map_err(|e| LedgerError::io("create staging file", staging, e))?;
    file.write_all(bytes)
        .await
        .map_err(|e| LedgerError::io("write staging file", staging, e))?;
    file.flush()
        .await
        .map_err(|e| LedgerError::io("flush staging file", staging, e))?;
    file.sync_all()
        .await
        .map_err(|e| LedgerError::io("fsync staging file", staging, e))?;
    Ok(())
}

/// Atomically replace the canonical file with the staged one.
pub(crate) async fn commit(staging: &Path, path: &Path) -> LedgerResult<()> {
    tokio::fs::rename(staging, path)
        .await
        .map_err(|e| LedgerError::io("rename staging file", path, e))?;

    // Persist the directory entry too; not every platform can open a directory.
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Ok(dir) = tokio::fs::File::open(parent).await {
            let _ = dir.sync_all().await;
        }
    }
    Ok(())
}
