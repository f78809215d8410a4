//! Execution engine: one request/response exchange per call.
//!
//! Every exchange is classified into the outcome taxonomy using the
//! operation's declared acceptance predicate and tagged with the logical
//! operation name, never the literal resolved path, so per-operation
//! metrics stay low-cardinality.

use std::time::Instant;

use reqwest::{RequestBuilder, StatusCode};
use serde_json::Value;
use tracing::debug;

use volley_core::{Outcome, ParticipantRecord, Status, TargetConfig, WorkloadRequest};

use crate::error::RunnerResult;

/// Logical operation: metric tag plus acceptance predicate.
///
/// Acceptance is per-operation configuration, not hard-coded: a transfer
/// is only accepted-for-processing (202), participant creation may
/// return 200 or 201, and a probed transaction that does not exist yet
/// (404) is not a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    /// Logical name used to tag outcomes.
    pub name: &'static str,
    accepted: &'static [u16],
}

impl Operation {
    /// Whether the response status satisfies the acceptance predicate.
    #[must_use]
    pub fn accepts(&self, status: StatusCode) -> bool {
        self.accepted.contains(&status.as_u16())
    }
}

pub const CREATE_PARTICIPANT: Operation = Operation {
    name: "create participant",
    accepted: &[200, 201],
};

pub const READ_PARTICIPANT: Operation = Operation {
    name: "read participant",
    accepted: &[200],
};

pub const CREATE_TRANSFER: Operation = Operation {
    name: "create transfer",
    accepted: &[202],
};

pub const READ_ACCOUNT: Operation = Operation {
    name: "read account",
    accepted: &[200],
};

pub const READ_TRANSACTION: Operation = Operation {
    name: "read transaction",
    accepted: &[200, 404],
};

/// Outcome of one exchange plus the parsed response body when requested.
#[derive(Debug)]
pub struct ExchangeResult {
    pub outcome: Outcome,
    pub body: Option<Value>,
}

impl ExchangeResult {
    /// Identifier field of the response body, when present.
    #[must_use]
    pub fn entity_id(&self) -> Option<u64> {
        self.body.as_ref()?.get("id")?.as_u64()
    }
}

/// HTTP client against the transfer API.
#[derive(Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    retry_transport_errors: bool,
}

impl ApiClient {
    /// Builds a client with the target's bounded request timeout.
    pub fn new(target: &TargetConfig) -> RunnerResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(target.request_timeout())
            .build()?;
        Ok(Self {
            http,
            base_url: target.base_url.trim_end_matches('/').to_string(),
            retry_transport_errors: target.retry_transport_errors,
        })
    }

    /// POST /users
    pub async fn create_participant(&self, record: &ParticipantRecord) -> ExchangeResult {
        let request = self
            .http
            .post(format!("{}/users", self.base_url))
            .json(record);
        self.exchange(CREATE_PARTICIPANT, request, true).await
    }

    /// GET /users/{id}
    pub async fn read_participant(&self, id: u64) -> ExchangeResult {
        let request = self.http.get(format!("{}/users/{id}", self.base_url));
        self.exchange(READ_PARTICIPANT, request, false).await
    }

    /// POST /transfers
    ///
    /// When `retry_transport_errors` is enabled, a send that failed at
    /// the transport level is replayed once with the same idempotency
    /// key; the logical attempt still yields exactly one outcome.
    pub async fn create_transfer(&self, transfer: &WorkloadRequest) -> ExchangeResult {
        let first = self
            .exchange(CREATE_TRANSFER, self.transfer_request(transfer), false)
            .await;
        if self.retry_transport_errors && first.outcome.status == Status::NetworkError {
            debug!(
                idempotency_key = %transfer.idempotency_key,
                "replaying transfer after transport failure"
            );
            return self
                .exchange(CREATE_TRANSFER, self.transfer_request(transfer), false)
                .await;
        }
        first
    }

    /// GET /accounts/{id}
    pub async fn read_account(&self, id: u64) -> ExchangeResult {
        let request = self.http.get(format!("{}/accounts/{id}", self.base_url));
        self.exchange(READ_ACCOUNT, request, false).await
    }

    /// GET /transactions/{id}
    pub async fn read_transaction(&self, id: u64) -> ExchangeResult {
        let request = self.http.get(format!("{}/transactions/{id}", self.base_url));
        self.exchange(READ_TRANSACTION, request, false).await
    }

    fn transfer_request(&self, transfer: &WorkloadRequest) -> RequestBuilder {
        self.http
            .post(format!("{}/transfers", self.base_url))
            .json(transfer)
    }

    /// Performs one exchange and classifies the result. Timeouts and
    /// connection failures become network-error outcomes, never retries.
    async fn exchange(
        &self,
        operation: Operation,
        request: RequestBuilder,
        want_body: bool,
    ) -> ExchangeResult {
        let started = Instant::now();
        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                let latency = started.elapsed();
                debug!(operation = operation.name, error = %err, "transport failure");
                return ExchangeResult {
                    outcome: Outcome {
                        operation: operation.name,
                        status: Status::NetworkError,
                        latency,
                    },
                    body: None,
                };
            }
        };

        let status = response.status();
        // Drain the body so latency covers the whole exchange.
        let bytes = response.bytes().await;
        let latency = started.elapsed();

        let classified = if operation.accepts(status) {
            Status::Success
        } else if status.is_client_error() {
            Status::ClientRejected
        } else {
            Status::ServerError
        };
        if classified != Status::Success {
            debug!(
                operation = operation.name,
                status = status.as_u16(),
                "exchange not accepted"
            );
        }

        let body = match bytes {
            Ok(bytes) if want_body => serde_json::from_slice(&bytes).ok(),
            _ => None,
        };
        ExchangeResult {
            outcome: Outcome {
                operation: operation.name,
                status: classified,
                latency,
            },
            body,
        }
    }
}
