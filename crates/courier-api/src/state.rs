//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers via
//! the `State` extractor. The marketplace is held as a trait object so the
//! router does not depend on which repository or ledger backend the binary
//! selected at startup.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use zeroize::Zeroizing;

use courier_engine::{ContractEngine, Marketplace, MemoryRepository};
use courier_ledger::InMemoryLedger;

/// Process configuration read from the environment.
#[derive(Clone)]
pub struct AppConfig {
    /// Listen port (`PORT`, default 8080).
    pub port: u16,
    /// Shared bearer secret (`AUTH_TOKEN`). `None` runs in development
    /// mode, where `Bearer {user_id}` is trusted as-is.
    pub auth_token: Option<Zeroizing<String>>,
    /// Emit JSON log lines (`LOG_FORMAT=json`).
    pub log_json: bool,
}

impl AppConfig {
    pub const DEFAULT_PORT: u16 = 8080;

    pub fn from_env() -> Self {
        Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(Self::DEFAULT_PORT),
            auth_token: std::env::var("AUTH_TOKEN")
                .ok()
                .filter(|t| !t.is_empty())
                .map(Zeroizing::new),
            log_json: std::env::var("LOG_FORMAT")
                .map(|f| f.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: Self::DEFAULT_PORT,
            auth_token: None,
            log_json: false,
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("log_json", &self.log_json)
            .finish()
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub market: Arc<dyn Marketplace>,
    pub config: AppConfig,
    /// Prometheus render handle; `None` when no recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn with_config(
        config: AppConfig,
        market: Arc<dyn Marketplace>,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        Self {
            market,
            config,
            metrics,
        }
    }

    /// Development state: in-memory repository and ledger, auth disabled.
    pub fn in_memory() -> Self {
        let engine = ContractEngine::new(MemoryRepository::new(), Arc::new(InMemoryLedger::new()));
        Self::with_config(AppConfig::default(), Arc::new(engine), None)
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("metrics", &self.metrics.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_debug_redacts_token() {
        let config = AppConfig {
            port: 9000,
            auth_token: Some(Zeroizing::new("hunter2".into())),
            log_json: false,
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("9000"));
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn in_memory_state_runs_without_auth() {
        let state = AppState::in_memory();
        assert!(state.config.auth_token.is_none());
        assert!(state.metrics.is_none());
    }
}
