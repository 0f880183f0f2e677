//! Donation lifecycle.
//!
//! Orders are created at the gateway before any row is written, so a failed
//! or timed-out order leaves nothing behind. Verification checks the
//! signature before touching the store, then finalizes the row through a
//! single conditional update scoped to `status = PENDING`. A caller that
//! loses that race, or arrives after the row is final, takes the replay path
//! and mutates nothing.

use bigdecimal::BigDecimal;
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::access::AccessContext;
use crate::domain::amount::{to_minor_units, NumericAmount};
use crate::domain::{
    AuditAction, AuditEvent, Donation, DonationDetail, DonationFilters, DonationStatus,
    DonationType, PaymentUpdate, Receipt,
};
use crate::error::DonationError;
use crate::metrics::DonationMetrics;
use crate::ports::{AuditSink, DonationRepository, OrderRequest, PaymentGateway};
use crate::services::{export, signature, signature::SigningSecret};

/// Upper bound on rows in a single export.
pub const EXPORT_MAX_ROWS: i64 = 10_000;

#[derive(Debug, Clone)]
pub struct StartDonationRequest {
    pub user_id: Uuid,
    pub entity_id: Uuid,
    pub amount: BigDecimal,
    pub donation_type: DonationType,
    pub reference_id: Option<Uuid>,
    pub note: Option<String>,
    pub source_ip: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StartDonationResponse {
    pub order_id: String,
    #[schema(value_type = String)]
    pub amount: BigDecimal,
    pub currency: String,
    pub key_id: String,
}

/// Payment confirmation posted by the checkout client or the gateway webhook.
#[derive(Debug, Clone)]
pub struct VerificationRequest {
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
    pub source_ip: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// Pending → Success.
    Captured,
    /// Pending → Failed.
    NotCaptured,
    /// The donation was already final; nothing changed.
    AlreadyProcessed,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DonationPage {
    pub donations: Vec<DonationDetail>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

pub struct DonationService {
    repository: Arc<dyn DonationRepository>,
    gateway: Arc<dyn PaymentGateway>,
    audit: Arc<dyn AuditSink>,
    metrics: DonationMetrics,
    signing_secret: SigningSecret,
    currency: String,
}

impl DonationService {
    pub fn new(
        repository: Arc<dyn DonationRepository>,
        gateway: Arc<dyn PaymentGateway>,
        audit: Arc<dyn AuditSink>,
        metrics: DonationMetrics,
        signing_secret: SigningSecret,
        currency: String,
    ) -> Self {
        Self {
            repository,
            gateway,
            audit,
            metrics,
            signing_secret,
            currency,
        }
    }

    pub async fn start_donation(
        &self,
        req: StartDonationRequest,
    ) -> Result<StartDonationResponse, DonationError> {
        let amount_minor = match to_minor_units(&req.amount) {
            Ok(minor) => minor,
            Err(e) => {
                self.metrics.record_initiated("rejected");
                return Err(e.into());
            }
        };
        let amount = BigDecimal::new(amount_minor.into(), 2);

        let metadata = json!({
            "user_id": req.user_id,
            "entity_id": req.entity_id,
            "donation_type": req.donation_type,
            "reference_id": req.reference_id,
        });
        let order_request = OrderRequest {
            amount_minor,
            currency: self.currency.clone(),
            receipt: format!("don_{}", Uuid::new_v4().simple()),
            notes: metadata,
        };

        let started = Instant::now();
        let order = self.gateway.create_order(&order_request).await;
        self.metrics
            .observe_gateway("create_order", started.elapsed().as_secs_f64());

        let order = match order {
            Ok(order) => order,
            Err(e) => {
                warn!(
                    user_id = %req.user_id,
                    entity_id = %req.entity_id,
                    error = %e,
                    "Gateway order creation failed"
                );
                self.metrics.record_initiated("failure");
                self.record(
                    AuditEvent::failure(
                        AuditAction::DonationInitiated,
                        json!({
                            "amount": amount.to_string(),
                            "donation_type": req.donation_type,
                            "reason": "gateway_order_failed",
                            "error": e.to_string(),
                        }),
                    )
                    .actor(Some(req.user_id))
                    .entity(Some(req.entity_id))
                    .from_ip(req.source_ip.as_deref()),
                )
                .await;
                return Err(DonationError::Gateway(e));
            }
        };

        let donation = Donation::new_pending(
            req.user_id,
            req.entity_id,
            amount.clone(),
            req.donation_type,
            order.order_id.clone(),
            req.reference_id,
            req.note.clone(),
        );

        if let Err(e) = self.repository.create(&donation).await {
            warn!(order_id = %order.order_id, error = %e, "Failed to persist donation");
            self.metrics.record_initiated("failure");
            self.record(
                AuditEvent::failure(
                    AuditAction::DonationInitiated,
                    json!({
                        "order_id": order.order_id,
                        "amount": amount.to_string(),
                        "donation_type": req.donation_type,
                        "reason": "store_error",
                    }),
                )
                .actor(Some(req.user_id))
                .entity(Some(req.entity_id))
                .from_ip(req.source_ip.as_deref()),
            )
            .await;
            return Err(DonationError::Store(e));
        }

        info!(
            order_id = %order.order_id,
            donation_id = %donation.id,
            entity_id = %req.entity_id,
            "Donation initiated"
        );
        self.metrics.record_initiated("success");
        self.record(
            AuditEvent::success(
                AuditAction::DonationInitiated,
                json!({
                    "donation_id": donation.id,
                    "order_id": order.order_id,
                    "amount": amount.to_string(),
                    "donation_type": req.donation_type,
                    "reference_id": req.reference_id,
                }),
            )
            .actor(Some(req.user_id))
            .entity(Some(req.entity_id))
            .from_ip(req.source_ip.as_deref()),
        )
        .await;

        Ok(StartDonationResponse {
            order_id: order.order_id,
            amount,
            currency: self.currency.clone(),
            key_id: self.gateway.key_id().to_string(),
        })
    }

    pub async fn verify_and_update_donation(
        &self,
        req: VerificationRequest,
    ) -> Result<VerificationOutcome, DonationError> {
        let ip = req.source_ip.as_deref();

        // Nothing is looked up before the signature checks out.
        if !signature::verify(
            &self.signing_secret,
            &req.order_id,
            &req.payment_id,
            &req.signature,
        ) {
            warn!(order_id = %req.order_id, payment_id = %req.payment_id, "Invalid payment signature");
            self.metrics.record_verification("signature_invalid");
            self.record(
                self.verification_failure(&req, None, "invalid_signature", None)
                    .from_ip(ip),
            )
            .await;
            return Err(DonationError::SignatureInvalid);
        }

        let started = Instant::now();
        let payment = self.gateway.fetch_payment(&req.payment_id).await;
        self.metrics
            .observe_gateway("fetch_payment", started.elapsed().as_secs_f64());

        let payment = match payment {
            Ok(payment) => payment,
            Err(e) => {
                warn!(order_id = %req.order_id, payment_id = %req.payment_id, error = %e, "Payment fetch failed");
                self.metrics.record_verification("error");
                self.record(
                    self.verification_failure(&req, None, "gateway_fetch_failed", Some(e.to_string()))
                        .from_ip(ip),
                )
                .await;
                return Err(DonationError::Gateway(e));
            }
        };

        let donation = match self.repository.get_by_order_id(&req.order_id).await {
            Ok(Some(donation)) => donation,
            Ok(None) => {
                warn!(order_id = %req.order_id, "No donation for verified order");
                self.metrics.record_verification("error");
                self.record(
                    self.verification_failure(&req, None, "donation_not_found", None)
                        .from_ip(ip),
                )
                .await;
                return Err(DonationError::RecordNotFound(req.order_id.clone()));
            }
            Err(e) => {
                self.metrics.record_verification("error");
                self.record(
                    self.verification_failure(&req, None, "store_error", Some(e.to_string()))
                        .from_ip(ip),
                )
                .await;
                return Err(DonationError::Store(e));
            }
        };

        if donation.status.is_terminal() {
            self.record_already_processed(&req, &donation).await;
            return Ok(VerificationOutcome::AlreadyProcessed);
        }

        let amount = match NumericAmount::try_from(&payment.amount)
            .and_then(|amount| amount.to_major_units())
        {
            Ok(amount) => amount,
            Err(e) => {
                warn!(order_id = %req.order_id, raw_amount = %payment.amount, "Unusable gateway amount");
                self.metrics.record_verification("error");
                self.record(
                    self.verification_failure(
                        &req,
                        Some(&donation),
                        "unsupported_amount_format",
                        Some(e.to_string()),
                    )
                    .from_ip(ip),
                )
                .await;
                return Err(DonationError::UnsupportedAmountFormat(e.to_string()));
            }
        };

        let update = PaymentUpdate::from_gateway(
            &payment.payment_id,
            &payment.status,
            payment.method.as_deref(),
            amount,
            Utc::now(),
        );

        let applied = match self
            .repository
            .update_payment_details(&req.order_id, DonationStatus::Pending, &update)
            .await
        {
            Ok(applied) => applied,
            Err(e) => {
                self.metrics.record_verification("error");
                self.record(
                    self.verification_failure(&req, Some(&donation), "store_error", Some(e.to_string()))
                        .from_ip(ip),
                )
                .await;
                return Err(DonationError::Store(e));
            }
        };

        if !applied {
            // A concurrent verification finalized the row first.
            self.record_already_processed(&req, &donation).await;
            return Ok(VerificationOutcome::AlreadyProcessed);
        }

        let metadata = json!({
            "donation_id": donation.id,
            "order_id": req.order_id,
            "payment_id": req.payment_id,
            "amount": update.amount.to_string(),
            "method": update.method,
            "gateway_status": payment.status,
            "donation_type": donation.donation_type,
            "reference_id": donation.reference_id,
        });

        let (event, outcome) = match update.status {
            DonationStatus::Success => {
                info!(order_id = %req.order_id, donation_id = %donation.id, "Donation captured");
                self.metrics.record_verification("success");
                (
                    AuditEvent::success(AuditAction::DonationSuccess, metadata),
                    VerificationOutcome::Captured,
                )
            }
            _ => {
                info!(order_id = %req.order_id, gateway_status = %payment.status, "Donation payment not captured");
                self.metrics.record_verification("failed");
                (
                    AuditEvent::failure(AuditAction::DonationFailed, metadata),
                    VerificationOutcome::NotCaptured,
                )
            }
        };
        self.record(event.entity(Some(donation.entity_id)).from_ip(ip))
            .await;

        Ok(outcome)
    }

    pub async fn generate_receipt(
        &self,
        donation_id: Uuid,
        access: &AccessContext,
        entity_id: Uuid,
    ) -> Result<Receipt, DonationError> {
        let detail = self
            .repository
            .get_detail(donation_id)
            .await?
            .ok_or_else(|| DonationError::RecordNotFound(donation_id.to_string()))?;

        let donation = &detail.donation;
        let own_donation = donation.user_id == access.user_id && donation.entity_id == entity_id;
        if !own_donation && !access.can_read_entity(donation.entity_id) {
            return Err(DonationError::AuthorizationDenied(
                "not permitted to view this donation".to_string(),
            ));
        }

        if donation.status != DonationStatus::Success {
            return Err(DonationError::ReceiptUnavailable(format!(
                "donation is {}",
                donation.status
            )));
        }

        Ok(Receipt::from_detail(detail, &self.currency))
    }

    pub async fn get_donation_by_order_id(
        &self,
        access: &AccessContext,
        order_id: &str,
    ) -> Result<Donation, DonationError> {
        let donation = self
            .repository
            .get_by_order_id(order_id)
            .await?
            .ok_or_else(|| DonationError::RecordNotFound(order_id.to_string()))?;

        if donation.user_id != access.user_id && !access.can_read_entity(donation.entity_id) {
            return Err(DonationError::AuthorizationDenied(
                "not permitted to view this donation".to_string(),
            ));
        }
        Ok(donation)
    }

    pub async fn get_donations_with_filters(
        &self,
        access: &AccessContext,
        filters: DonationFilters,
    ) -> Result<DonationPage, DonationError> {
        self.authorize_entity_read(access, filters.entity_id)?;

        let donations = self.repository.list(&filters).await?;
        let total = self.repository.count(&filters).await?;

        Ok(DonationPage {
            donations,
            total,
            limit: filters.limit,
            offset: filters.offset,
        })
    }

    pub async fn export_donations(
        &self,
        access: &AccessContext,
        mut filters: DonationFilters,
        source_ip: Option<&str>,
    ) -> Result<Vec<u8>, DonationError> {
        self.authorize_entity_read(access, filters.entity_id)?;

        filters.limit = EXPORT_MAX_ROWS;
        filters.offset = 0;
        let rows = self.repository.list(&filters).await?;
        let csv = export::render_csv(&rows).map_err(|e| DonationError::Export(e.to_string()))?;

        info!(entity_id = %filters.entity_id, rows = rows.len(), "Donations exported");
        self.record(
            AuditEvent::success(
                AuditAction::DonationsExported,
                json!({
                    "rows": rows.len(),
                    "status": filters.status,
                    "donation_type": filters.donation_type,
                    "method": filters.method,
                    "from_date": filters.from_date,
                    "to_date": filters.to_date,
                    "search": filters.search,
                }),
            )
            .actor(Some(access.user_id))
            .entity(Some(filters.entity_id))
            .from_ip(source_ip),
        )
        .await;

        Ok(csv)
    }

    pub async fn list_my_donations(
        &self,
        access: &AccessContext,
        entity_id: Uuid,
    ) -> Result<Vec<Donation>, DonationError> {
        Ok(self
            .repository
            .list_by_user(access.user_id, entity_id)
            .await?)
    }

    /// Listing and export are confined to the caller's own entity.
    fn authorize_entity_read(
        &self,
        access: &AccessContext,
        entity_id: Uuid,
    ) -> Result<(), DonationError> {
        access.ensure_entity_scope(entity_id)?;
        if !access.can_read_entity(entity_id) {
            return Err(DonationError::AuthorizationDenied(
                "missing donation read permission".to_string(),
            ));
        }
        Ok(())
    }

    fn verification_failure(
        &self,
        req: &VerificationRequest,
        donation: Option<&Donation>,
        reason: &str,
        error: Option<String>,
    ) -> AuditEvent {
        AuditEvent::failure(
            AuditAction::DonationVerificationFailed,
            json!({
                "order_id": req.order_id,
                "payment_id": req.payment_id,
                "reason": reason,
                "error": error,
            }),
        )
        .entity(donation.map(|d| d.entity_id))
    }

    async fn record_already_processed(&self, req: &VerificationRequest, donation: &Donation) {
        info!(order_id = %req.order_id, status = %donation.status, "Donation already processed");
        self.metrics.record_verification("already_processed");
        self.record(
            AuditEvent::success(
                AuditAction::DonationAlreadyProcessed,
                json!({
                    "donation_id": donation.id,
                    "order_id": req.order_id,
                    "payment_id": req.payment_id,
                    "donation_type": donation.donation_type,
                    "reference_id": donation.reference_id,
                }),
            )
            .entity(Some(donation.entity_id))
            .from_ip(req.source_ip.as_deref()),
        )
        .await;
    }

    /// Audit failures never undo the operation being audited.
    async fn record(&self, event: AuditEvent) {
        if let Err(e) = self.audit.log_action(&event).await {
            warn!(action = event.action.as_str(), error = %e, "Failed to write audit event");
        }
    }
}
