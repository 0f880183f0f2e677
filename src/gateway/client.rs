use async_trait::async_trait;
use failsafe::futures::CircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::ports::{GatewayOrder, GatewayPayment, OrderRequest, PaymentGateway};

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Gateway returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Invalid response from gateway: {0}")]
    InvalidResponse(String),
    #[error("Circuit breaker open - payment gateway unavailable")]
    CircuitBreakerOpen,
}

#[derive(Debug, Serialize)]
struct CreateOrderBody<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    notes: &'a Value,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PaymentResponse {
    id: Option<String>,
    status: Option<String>,
    #[serde(default)]
    amount: Value,
    method: Option<String>,
}

/// HTTP client for the payment gateway's orders and payments API.
pub struct GatewayClient {
    client: Client,
    base_url: String,
    key_id: String,
    key_secret: String,
    circuit_breaker: StateMachine<
        failure_policy::ConsecutiveFailures<backoff::Exponential>,
        (),
    >,
}

impl GatewayClient {
    /// Creates a client whose every call is bounded by `timeout`.
    pub fn new(
        base_url: String,
        key_id: String,
        key_secret: String,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        Self::with_circuit_breaker_config(
            base_url,
            key_id,
            key_secret,
            timeout,
            5,
            Duration::from_secs(60),
        )
    }

    pub fn with_circuit_breaker_config(
        base_url: String,
        key_id: String,
        key_secret: String,
        timeout: Duration,
        failure_threshold: u32,
        reset_timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(timeout).build()?;

        let backoff = backoff::exponential(Duration::from_secs(10), reset_timeout);
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        Ok(GatewayClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            key_id,
            key_secret,
            circuit_breaker,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn guarded<T, F>(&self, call: F) -> Result<T, GatewayError>
    where
        F: std::future::Future<Output = Result<T, GatewayError>>,
    {
        match self.circuit_breaker.call(call).await {
            Ok(value) => Ok(value),
            Err(FailsafeError::Rejected) => Err(GatewayError::CircuitBreakerOpen),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }
}

async fn ensure_success(response: Response) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(GatewayError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl PaymentGateway for GatewayClient {
    async fn create_order(&self, request: &OrderRequest) -> Result<GatewayOrder, GatewayError> {
        let url = format!("{}/v1/orders", self.base_url);
        let body = CreateOrderBody {
            amount: request.amount_minor,
            currency: &request.currency,
            receipt: &request.receipt,
            notes: &request.notes,
        };

        self.guarded(async {
            let response = self
                .client
                .post(&url)
                .basic_auth(&self.key_id, Some(&self.key_secret))
                .json(&body)
                .send()
                .await?;
            let order: OrderResponse = ensure_success(response).await?.json().await?;

            match order.id {
                Some(id) if !id.trim().is_empty() => Ok(GatewayOrder { order_id: id }),
                _ => Err(GatewayError::InvalidResponse(
                    "order response missing id".to_string(),
                )),
            }
        })
        .await
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError> {
        let url = format!("{}/v1/payments/{}", self.base_url, payment_id);

        self.guarded(async {
            let response = self
                .client
                .get(&url)
                .basic_auth(&self.key_id, Some(&self.key_secret))
                .send()
                .await?;
            let payment: PaymentResponse = ensure_success(response).await?.json().await?;

            let status = payment.status.ok_or_else(|| {
                GatewayError::InvalidResponse("payment response missing status".to_string())
            })?;

            Ok(GatewayPayment {
                payment_id: payment.id.unwrap_or_else(|| payment_id.to_string()),
                status,
                amount: payment.amount,
                method: payment.method,
            })
        })
        .await
    }

    fn key_id(&self) -> &str {
        &self.key_id
    }
}
