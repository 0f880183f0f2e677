#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use temple_donations::domain::{
    AuditAction, AuditEvent, Donation, DonationDetail, DonationFilters, DonationStatus,
    PaymentUpdate,
};
use temple_donations::gateway::GatewayError;
use temple_donations::metrics::DonationMetrics;
use temple_donations::ports::{
    AuditError, AuditSink, DonationRepository, GatewayOrder, GatewayPayment, OrderRequest,
    PaymentGateway, RepositoryError,
};
use temple_donations::services::{signature, DonationService, SigningSecret};

pub const SECRET: &str = "test_gateway_secret";
pub const KEY_ID: &str = "rzp_test_key";

#[derive(Default)]
pub struct InMemoryRepository {
    rows: Mutex<Vec<Donation>>,
    donors: Mutex<HashMap<Uuid, (String, String)>>,
    pub lookups: AtomicUsize,
    pub fail_create: AtomicBool,
}

impl InMemoryRepository {
    pub fn add_donor(&self, user_id: Uuid, name: &str, email: &str) {
        self.donors
            .lock()
            .unwrap()
            .insert(user_id, (name.to_string(), email.to_string()));
    }

    pub fn insert(&self, donation: Donation) {
        self.rows.lock().unwrap().push(donation);
    }

    pub fn all(&self) -> Vec<Donation> {
        self.rows.lock().unwrap().clone()
    }

    pub fn by_order(&self, order_id: &str) -> Option<Donation> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.order_id == order_id)
            .cloned()
    }

    fn detail(&self, donation: Donation) -> DonationDetail {
        let donor = self.donors.lock().unwrap().get(&donation.user_id).cloned();
        DonationDetail {
            donor_name: donor.as_ref().map(|(name, _)| name.clone()),
            donor_email: donor.map(|(_, email)| email),
            entity_name: Some("Sri Venkateswara Temple".to_string()),
            donation,
        }
    }

    fn matching(&self, filters: &DonationFilters) -> Vec<DonationDetail> {
        let rows = self.rows.lock().unwrap().clone();
        let mut matched: Vec<DonationDetail> = rows
            .into_iter()
            .filter(|d| d.entity_id == filters.entity_id)
            .filter(|d| filters.status.map_or(true, |s| d.status == s))
            .filter(|d| filters.donation_type.map_or(true, |t| d.donation_type == t))
            .filter(|d| {
                filters
                    .method
                    .as_ref()
                    .map_or(true, |m| d.method.eq_ignore_ascii_case(m))
            })
            .filter(|d| filters.min_amount.as_ref().map_or(true, |min| &d.amount >= min))
            .filter(|d| filters.max_amount.as_ref().map_or(true, |max| &d.amount <= max))
            .filter(|d| filters.from_date.map_or(true, |from| d.created_at >= from))
            .filter(|d| filters.to_date.map_or(true, |to| d.created_at <= to))
            .map(|d| self.detail(d))
            .filter(|detail| match &filters.search {
                Some(term) => {
                    let term = term.to_lowercase();
                    let d = &detail.donation;
                    [
                        detail.donor_name.clone(),
                        detail.donor_email.clone(),
                        Some(d.order_id.clone()),
                        d.payment_id.clone(),
                        d.reference_id.map(|r| r.to_string()),
                    ]
                    .into_iter()
                    .flatten()
                    .any(|field| field.to_lowercase().contains(&term))
                }
                None => true,
            })
            .collect();
        matched.sort_by(|a, b| b.donation.created_at.cmp(&a.donation.created_at));
        matched
    }
}

#[async_trait]
impl DonationRepository for InMemoryRepository {
    async fn create(&self, donation: &Donation) -> Result<Donation, RepositoryError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(RepositoryError::Database("connection reset".to_string()));
        }
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|d| d.order_id == donation.order_id) {
            return Err(RepositoryError::DuplicateOrder(donation.order_id.clone()));
        }
        rows.push(donation.clone());
        Ok(donation.clone())
    }

    async fn get_by_order_id(&self, order_id: &str) -> Result<Option<Donation>, RepositoryError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.by_order(order_id))
    }

    async fn get_detail(&self, id: Uuid) -> Result<Option<DonationDetail>, RepositoryError> {
        let found = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.id == id)
            .cloned();
        Ok(found.map(|d| self.detail(d)))
    }

    async fn update_payment_details(
        &self,
        order_id: &str,
        expected: DonationStatus,
        update: &PaymentUpdate,
    ) -> Result<bool, RepositoryError> {
        // Same compare-and-set as the SQL: the lock stands in for the row.
        let mut rows = self.rows.lock().unwrap();
        match rows
            .iter_mut()
            .find(|d| d.order_id == order_id && d.status == expected)
        {
            Some(row) => {
                row.payment_id = Some(update.payment_id.clone());
                row.method = update.method.clone();
                row.amount = update.amount.clone();
                row.status = update.status;
                if update.donated_at.is_some() {
                    row.donated_at = update.donated_at;
                }
                row.updated_at = chrono::Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list(&self, filters: &DonationFilters) -> Result<Vec<DonationDetail>, RepositoryError> {
        Ok(self
            .matching(filters)
            .into_iter()
            .skip(filters.offset as usize)
            .take(filters.limit as usize)
            .collect())
    }

    async fn count(&self, filters: &DonationFilters) -> Result<i64, RepositoryError> {
        Ok(self.matching(filters).len() as i64)
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        entity_id: Uuid,
    ) -> Result<Vec<Donation>, RepositoryError> {
        let mut rows: Vec<Donation> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.user_id == user_id && d.entity_id == entity_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }
}

#[derive(Default)]
pub struct FakeGateway {
    next_order: AtomicUsize,
    payments: Mutex<HashMap<String, GatewayPayment>>,
    pub orders: Mutex<Vec<OrderRequest>>,
    pub fail_orders: AtomicBool,
    pub fetches: AtomicUsize,
}

impl FakeGateway {
    pub fn set_payment(&self, payment_id: &str, status: &str, amount: Value, method: Option<&str>) {
        self.payments.lock().unwrap().insert(
            payment_id.to_string(),
            GatewayPayment {
                payment_id: payment_id.to_string(),
                status: status.to_string(),
                amount,
                method: method.map(str::to_string),
            },
        );
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_order(&self, request: &OrderRequest) -> Result<GatewayOrder, GatewayError> {
        if self.fail_orders.load(Ordering::SeqCst) {
            return Err(GatewayError::Status {
                status: 503,
                body: "gateway unavailable".to_string(),
            });
        }
        self.orders.lock().unwrap().push(request.clone());
        let n = self.next_order.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(GatewayOrder {
            order_id: format!("order_{}", n),
        })
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        // Let concurrent verifications interleave between fetch and update.
        tokio::task::yield_now().await;
        self.payments
            .lock()
            .unwrap()
            .get(payment_id)
            .cloned()
            .ok_or_else(|| GatewayError::Status {
                status: 404,
                body: json!({"error": "payment not found"}).to_string(),
            })
    }

    fn key_id(&self) -> &str {
        KEY_ID
    }
}

#[derive(Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn actions(&self) -> Vec<AuditAction> {
        self.events().into_iter().map(|e| e.action).collect()
    }

    pub fn count(&self, action: AuditAction) -> usize {
        self.actions().into_iter().filter(|a| *a == action).count()
    }
}

#[async_trait]
impl AuditSink for RecordingAuditSink {
    async fn log_action(&self, event: &AuditEvent) -> Result<(), AuditError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

pub struct FailingAuditSink;

#[async_trait]
impl AuditSink for FailingAuditSink {
    async fn log_action(&self, _event: &AuditEvent) -> Result<(), AuditError> {
        Err(AuditError("audit store offline".to_string()))
    }
}

pub struct Harness {
    pub service: Arc<DonationService>,
    pub repository: Arc<InMemoryRepository>,
    pub gateway: Arc<FakeGateway>,
    pub audit: Arc<RecordingAuditSink>,
    pub metrics: DonationMetrics,
}

impl Harness {
    pub fn new() -> Self {
        let repository = Arc::new(InMemoryRepository::default());
        let gateway = Arc::new(FakeGateway::default());
        let audit = Arc::new(RecordingAuditSink::default());
        let metrics = DonationMetrics::new().unwrap();
        let service = DonationService::new(
            repository.clone(),
            gateway.clone(),
            audit.clone(),
            metrics.clone(),
            SigningSecret::new(SECRET).unwrap(),
            "INR".to_string(),
        );
        Self {
            service: Arc::new(service),
            repository,
            gateway,
            audit,
            metrics,
        }
    }

    pub fn with_audit_sink(audit_sink: Arc<dyn AuditSink>) -> (Arc<DonationService>, Arc<InMemoryRepository>, Arc<FakeGateway>) {
        let repository = Arc::new(InMemoryRepository::default());
        let gateway = Arc::new(FakeGateway::default());
        let service = DonationService::new(
            repository.clone(),
            gateway.clone(),
            audit_sink,
            DonationMetrics::new().unwrap(),
            SigningSecret::new(SECRET).unwrap(),
            "INR".to_string(),
        );
        (Arc::new(service), repository, gateway)
    }
}

pub fn sign(order_id: &str, payment_id: &str) -> String {
    signature::compute(&SigningSecret::new(SECRET).unwrap(), order_id, payment_id)
}
