use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use roster_core::{Clock, Lang, ListLimit, ParticipantRecord, Participation, SystemClock, UserId};

use super::r#trait::{LedgerResult, ParticipantLedger};
use super::snapshot::Snapshot;

/// In-memory participant ledger.
///
/// Intended for tests/dev. Same semantics as the durable backends, minus durability.
pub struct InMemoryLedger {
    state: Mutex<Snapshot>,
    clock: Arc<dyn Clock>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(Snapshot::new()),
            clock,
        }
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ParticipantLedger for InMemoryLedger {
    async fn upsert(&self, event: Participation) -> LedgerResult<()> {
        let mut state = self.state.lock().await;
        state.upsert(&event, self.clock.now());
        Ok(())
    }

    async fn get_lang(&self, user_id: UserId) -> LedgerResult<Lang> {
        Ok(self.state.lock().await.lang_of(user_id))
    }

    async fn set_lang(&self, user_id: UserId, lang: &str) -> LedgerResult<()> {
        let lang = Lang::or_default(Some(lang));
        let mut state = self.state.lock().await;
        state.set_lang(user_id, lang, self.clock.now());
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
        *self.state.lock().await = Snapshot::new();
        Ok(())
    }
}
