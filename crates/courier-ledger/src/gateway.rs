//! # XRPL Escrow Gateway Client
//!
//! Typed HTTP client for a gateway service that signs and submits XRPL
//! escrow transactions and waits for validation.
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | POST | `/v1/escrows` | `EscrowCreate`, returns the transaction sequence |
//! | POST | `/v1/escrows/finish` | `EscrowFinish` with condition and fulfillment |
//! | POST | `/v1/escrows/cancel` | `EscrowCancel` |
//! | GET  | `/v1/escrows/{owner}/{sequence}` | escrow state (404 = unknown) |
//! | GET  | `/v1/accounts/{address}/balance` | validated account balance |
//!
//! Conditions are generated here, so the gateway never sees a fulfillment
//! before the escrow is finished.
//!
//! Only GETs are retried on transport errors. A POST that timed out may
//! still have been applied, so it is sent once and the failure surfaced;
//! settlement re-reads each leg's `status` before resubmitting.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use courier_core::{Amount, EscrowHandle, EscrowKind, Timestamp, Wallet};

use crate::condition::PreimageCondition;
use crate::config::{ConfigError, LedgerConfig};
use crate::{EscrowLedgerPort, EscrowState, EscrowWindow, LedgerError, LedgerOp};

#[derive(Serialize)]
struct CreateEscrowRequest<'a> {
    secret: &'a str,
    destination: &'a str,
    /// Drops as a decimal string, matching XRPL amount encoding.
    amount: String,
    finish_after: i64,
    cancel_after: i64,
    condition: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateEscrowResponse {
    account: String,
    sequence: u32,
}

#[derive(Serialize)]
struct FinishEscrowRequest<'a> {
    secret: &'a str,
    owner: &'a str,
    offer_sequence: u32,
    condition: &'a str,
    fulfillment: &'a str,
}

#[derive(Serialize)]
struct CancelEscrowRequest<'a> {
    secret: &'a str,
    owner: &'a str,
    offer_sequence: u32,
}

#[derive(Debug, Deserialize)]
struct EscrowStatusResponse {
    state: EscrowState,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    /// Drops as a decimal string.
    balance: String,
}

/// HTTP-backed [`EscrowLedgerPort`].
#[derive(Debug, Clone)]
pub struct GatewayLedger {
    http: reqwest::Client,
    base_url: url::Url,
}

impl GatewayLedger {
    pub fn new(config: LedgerConfig) -> Result<Self, LedgerError> {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(token) = &config.api_token {
            headers.insert(
                reqwest::header::AUTHORIZATION,
                reqwest::header::HeaderValue::from_str(&format!("Bearer {}", token.as_str()))
                    .map_err(|_| LedgerError::Config(ConfigError::InvalidToken))?,
            );
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| LedgerError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;
        Ok(Self {
            http,
            base_url: config.gateway_url,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    /// POST a JSON body once and return the successful response.
    async fn post<B: Serialize + Sync>(
        &self,
        endpoint: &str,
        url: &str,
        body: &B,
    ) -> Result<reqwest::Response, LedgerError> {
        let resp = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| LedgerError::Http {
                endpoint: endpoint.into(),
                source: e,
            })?;
        check_status(endpoint, resp).await
    }

    /// GET with transport retries.
    async fn get(&self, endpoint: &str, url: &str) -> Result<reqwest::Response, LedgerError> {
        crate::retry::retry_send(endpoint, || self.http.get(url).send())
            .await
            .map_err(|e| LedgerError::Http {
                endpoint: endpoint.into(),
                source: e,
            })
    }

    async fn create_one(
        &self,
        source: &Wallet,
        destination: &str,
        amount: &Amount,
        window: &EscrowWindow,
    ) -> Result<EscrowHandle, LedgerError> {
        let endpoint = "POST /v1/escrows";
        let drops = amount.to_drops().ok_or(LedgerError::AmountOverflow {
            units: amount.units(),
        })?;
        let lock = PreimageCondition::generate();
        let req = CreateEscrowRequest {
            secret: source.secret(),
            destination,
            amount: drops.to_string(),
            finish_after: window.finish_after.epoch_secs(),
            cancel_after: window.cancel_after.epoch_secs(),
            condition: &lock.condition,
        };

        let resp = self.post(endpoint, &self.url("v1/escrows"), &req).await?;
        let created: CreateEscrowResponse = resp.json().await.map_err(|e| {
            LedgerError::Deserialization {
                endpoint: endpoint.into(),
                source: e,
            }
        })?;

        Ok(EscrowHandle {
            owner: created.account,
            sequence: created.sequence,
            condition: lock.condition,
            fulfillment: lock.fulfillment,
        })
    }
}

async fn check_status(endpoint: &str, resp: reqwest::Response) -> Result<reqwest::Response, LedgerError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp
        .text()
        .await
        .unwrap_or_else(|e| format!("<failed to read response body: {e}>"));
    Err(LedgerError::Gateway {
        endpoint: endpoint.into(),
        status,
        body,
    })
}

#[async_trait]
impl EscrowLedgerPort for GatewayLedger {
    async fn create(
        &self,
        source: &Wallet,
        destination: &str,
        amounts: &[Amount],
        kind: EscrowKind,
        deadline: Timestamp,
    ) -> Result<Vec<EscrowHandle>, LedgerError> {
        let mut created = Vec::with_capacity(amounts.len());
        for amount in amounts {
            // Each leg gets its own window, as the gateway submits them one by one.
            let leg = match EscrowWindow::for_kind(kind, deadline, Timestamp::now()) {
                Ok(window) => self.create_one(source, destination, amount, &window).await,
                Err(e) => Err(e),
            };
            match leg {
                Ok(handle) => created.push(handle),
                Err(e) if created.is_empty() => return Err(e),
                Err(e) => {
                    return Err(LedgerError::PartialCreate {
                        created,
                        source: Box::new(e),
                    })
                }
            }
        }
        Ok(created)
    }

    async fn finish(
        &self,
        submitter: &Wallet,
        handles: &[EscrowHandle],
        count: usize,
    ) -> Result<(), LedgerError> {
        let endpoint = "POST /v1/escrows/finish";
        let url = self.url("v1/escrows/finish");
        for handle in handles.iter().take(count) {
            let req = FinishEscrowRequest {
                secret: submitter.secret(),
                owner: &handle.owner,
                offer_sequence: handle.sequence,
                condition: &handle.condition,
                fulfillment: &handle.fulfillment,
            };
            self.post(endpoint, &url, &req).await?;
            tracing::debug!(escrow = %handle, "escrow finished via gateway");
        }
        Ok(())
    }

    async fn cancel(&self, submitter: &Wallet, handle: &EscrowHandle) -> Result<(), LedgerError> {
        let req = CancelEscrowRequest {
            secret: submitter.secret(),
            owner: &handle.owner,
            offer_sequence: handle.sequence,
        };
        self.post("POST /v1/escrows/cancel", &self.url("v1/escrows/cancel"), &req)
            .await?;
        tracing::debug!(escrow = %handle, "escrow cancelled via gateway");
        Ok(())
    }

    async fn status(&self, handle: &EscrowHandle) -> Result<EscrowState, LedgerError> {
        let endpoint = "GET /v1/escrows/{owner}/{sequence}";
        let url = self.url(&format!("v1/escrows/{}/{}", handle.owner, handle.sequence));

        let resp = self.get(endpoint, &url).await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(EscrowState::Unknown);
        }
        let resp = check_status(endpoint, resp).await?;
        let body: EscrowStatusResponse = resp
            .json()
            .await
            .map_err(|e| LedgerError::Deserialization {
                endpoint: endpoint.into(),
                source: e,
            })?;
        Ok(body.state)
    }

    async fn balance(&self, address: &str) -> Result<u64, LedgerError> {
        let endpoint = "GET /v1/accounts/{address}/balance";
        let url = self.url(&format!("v1/accounts/{address}/balance"));

        let resp = check_status(endpoint, self.get(endpoint, &url).await?).await?;
        let body: BalanceResponse = resp
            .json()
            .await
            .map_err(|e| LedgerError::Deserialization {
                endpoint: endpoint.into(),
                source: e,
            })?;
        body.balance
            .parse()
            .map_err(|_| LedgerError::Unavailable {
                op: LedgerOp::Balance,
                reason: format!("gateway returned a malformed balance {:?}", body.balance),
            })
    }
}
