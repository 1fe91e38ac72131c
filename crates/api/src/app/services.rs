use std::sync::Arc;

use roster_core::ListPolicy;
use roster_infra::{LedgerConfig, LedgerResult, ParticipantLedger, ledger};

use crate::notify::{LogNotifier, Notifier};

/// Shared handles every request handler works with.
#[derive(Clone)]
pub struct AppServices {
    pub ledger: Arc<dyn ParticipantLedger>,
    pub notifier: Arc<dyn Notifier>,
    pub list_policy: ListPolicy,
}

impl AppServices {
    pub fn new(ledger: Arc<dyn ParticipantLedger>, notifier: Arc<dyn Notifier>, list_policy: ListPolicy) -> Self {
        Self {
            ledger,
            notifier,
            list_policy,
        }
    }
}

/// Open the configured ledger and pair it with the log notifier.
pub async fn build_services(config: &LedgerConfig) -> LedgerResult<AppServices> {
    let ledger = ledger::open(config).await?;
    Ok(AppServices::new(ledger, Arc::new(LogNotifier), config.list_policy))
}
