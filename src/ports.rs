//! Ports the donation lifecycle depends on.
//! Postgres, the payment gateway and the audit log are adapters behind these traits.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::{
    AuditEvent, Donation, DonationDetail, DonationFilters, DonationStatus, PaymentUpdate,
};
use crate::gateway::GatewayError;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(String),
    #[error("duplicate order id: {0}")]
    DuplicateOrder(String),
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepositoryError::DuplicateOrder(db.message().to_string())
            }
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

#[async_trait]
pub trait DonationRepository: Send + Sync {
    async fn create(&self, donation: &Donation) -> Result<Donation, RepositoryError>;

    async fn get_by_order_id(&self, order_id: &str) -> Result<Option<Donation>, RepositoryError>;

    async fn get_detail(&self, id: Uuid) -> Result<Option<DonationDetail>, RepositoryError>;

    /// Applies `update` only while the row still has `expected` status.
    /// Returns false when no row matched, i.e. another caller already moved it.
    async fn update_payment_details(
        &self,
        order_id: &str,
        expected: DonationStatus,
        update: &PaymentUpdate,
    ) -> Result<bool, RepositoryError>;

    async fn list(&self, filters: &DonationFilters) -> Result<Vec<DonationDetail>, RepositoryError>;

    async fn count(&self, filters: &DonationFilters) -> Result<i64, RepositoryError>;

    async fn list_by_user(
        &self,
        user_id: Uuid,
        entity_id: Uuid,
    ) -> Result<Vec<Donation>, RepositoryError>;
}

/// Order creation request, amount in minor units.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub amount_minor: i64,
    pub currency: String,
    pub receipt: String,
    pub notes: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayOrder {
    pub order_id: String,
}

/// Payment record as reported by the gateway. `amount` is left raw so the
/// caller decides how to interpret it.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayPayment {
    pub payment_id: String,
    pub status: String,
    pub amount: Value,
    pub method: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(&self, request: &OrderRequest) -> Result<GatewayOrder, GatewayError>;

    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError>;

    /// Public key id handed to the checkout client.
    fn key_id(&self) -> &str;
}

#[derive(Debug, thiserror::Error)]
#[error("audit sink error: {0}")]
pub struct AuditError(pub String);

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn log_action(&self, event: &AuditEvent) -> Result<(), AuditError>;
}
