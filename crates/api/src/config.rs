//! API process configuration.

use roster_infra::LedgerConfig;
use roster_infra::config::number_or_default;

/// Server settings plus the ledger they serve.
///
/// | env | default |
/// |---|---|
/// | `PORT` | `10000` |
/// | `BIND_ADDR` | `0.0.0.0` |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind_addr: String,
    pub port: u16,
    pub ledger: LedgerConfig,
}

impl ApiConfig {
    pub const DEFAULT_PORT: u16 = 10000;

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let bind_addr = lookup("BIND_ADDR")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "0.0.0.0".to_string());

        let port = number_or_default(&lookup, "PORT", usize::from(Self::DEFAULT_PORT));
        let port = u16::try_from(port).unwrap_or_else(|_| {
            tracing::warn!(port, "PORT out of range; using default");
            Self::DEFAULT_PORT
        });

        Self {
            bind_addr,
            port,
            ledger: LedgerConfig::from_lookup(lookup),
        }
    }

    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}
