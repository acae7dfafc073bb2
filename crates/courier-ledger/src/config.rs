//! Ledger gateway client configuration.

use url::Url;
use zeroize::Zeroizing;

/// Connection settings for [`GatewayLedger`](crate::GatewayLedger).
///
/// Custom `Debug` redacts the API token.
#[derive(Clone)]
pub struct LedgerConfig {
    /// Base URL of the escrow gateway.
    pub gateway_url: Url,
    /// Optional bearer token for the gateway.
    pub api_token: Option<Zeroizing<String>>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl std::fmt::Debug for LedgerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerConfig")
            .field("gateway_url", &self.gateway_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl LedgerConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `LEDGER_GATEWAY_URL` (required)
    /// - `LEDGER_API_TOKEN` (optional)
    /// - `LEDGER_TIMEOUT_SECS` (default: 30)
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw = std::env::var("LEDGER_GATEWAY_URL").map_err(|_| ConfigError::MissingUrl)?;
        Ok(Self {
            gateway_url: parse_url("LEDGER_GATEWAY_URL", &raw)?,
            api_token: std::env::var("LEDGER_API_TOKEN").ok().map(Zeroizing::new),
            timeout_secs: std::env::var("LEDGER_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
        })
    }

    /// Configuration pointing at a local gateway (for testing).
    pub fn local(uri: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            gateway_url: parse_url("local", uri)?,
            api_token: None,
            timeout_secs: 5,
        })
    }
}

fn parse_url(var: &str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string()))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("LEDGER_GATEWAY_URL environment variable is required")]
    MissingUrl,
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("LEDGER_API_TOKEN is not a valid header value")]
    InvalidToken,
}
