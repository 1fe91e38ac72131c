//! Participation confirmations.
//!
//! Delivery is best-effort: a failed notification is logged and dropped, and
//! never changes the outcome of the ledger write that triggered it.

use async_trait::async_trait;

use roster_core::{Lang, UserId};

/// Sends a "participation recorded" confirmation to a user.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn participation_confirmed(&self, user_id: UserId, lang: Lang) -> anyhow::Result<()>;
}

/// Writes confirmations to the log.
#[derive(Debug, Default, Copy, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn participation_confirmed(&self, user_id: UserId, lang: Lang) -> anyhow::Result<()> {
        tracing::info!(user_id = %user_id, lang = %lang, "participation confirmed");
        Ok(())
    }
}

#[derive(Debug, Default, Copy, Clone)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn participation_confirmed(&self, _user_id: UserId, _lang: Lang) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Deliver a confirmation, swallowing failures.
pub async fn notify_best_effort(notifier: &dyn Notifier, user_id: UserId, lang: Lang) {
    if let Err(err) = notifier.participation_confirmed(user_id, lang).await {
        tracing::debug!(user_id = %user_id, error = %err, "participation notification failed");
    }
}
