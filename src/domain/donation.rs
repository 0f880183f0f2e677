//! Donation domain entity.
//! The financial record created at order initiation and finalized at verification.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// Method recorded until the gateway reports the real instrument.
pub const PENDING_METHOD: &str = "PENDING";
/// Method recorded when the gateway omits one.
pub const UNKNOWN_METHOD: &str = "UNKNOWN";
/// Gateway payment status that means the funds were charged.
pub const CAPTURED: &str = "captured";

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DonationStatus {
    Pending,
    Success,
    Failed,
}

impl DonationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        }
    }

    /// Success and Failed admit no further transition.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Maps the gateway's payment status onto the terminal state it implies.
    pub fn from_gateway(status: &str) -> Self {
        if status == CAPTURED {
            Self::Success
        } else {
            Self::Failed
        }
    }
}

impl fmt::Display for DonationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DonationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "SUCCESS" => Ok(Self::Success),
            "FAILED" => Ok(Self::Failed),
            other => Err(format!("unknown donation status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DonationType {
    General,
    Seva,
    Event,
    Festival,
    Construction,
    Annadanam,
    Education,
    Maintenance,
}

impl DonationType {
    pub const ALL: [DonationType; 8] = [
        Self::General,
        Self::Seva,
        Self::Event,
        Self::Festival,
        Self::Construction,
        Self::Annadanam,
        Self::Education,
        Self::Maintenance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Seva => "seva",
            Self::Event => "event",
            Self::Festival => "festival",
            Self::Construction => "construction",
            Self::Annadanam => "annadanam",
            Self::Education => "education",
            Self::Maintenance => "maintenance",
        }
    }
}

impl fmt::Display for DonationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DonationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| format!("unknown donation type '{}'", s))
    }
}

/// One donation, keyed by the gateway-issued order id.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Donation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub entity_id: Uuid,
    #[schema(value_type = String)]
    pub amount: BigDecimal,
    pub donation_type: DonationType,
    pub order_id: String,
    pub payment_id: Option<String>,
    pub method: String,
    pub status: DonationStatus,
    pub donated_at: Option<DateTime<Utc>>,
    pub reference_id: Option<Uuid>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Donation {
    /// A freshly ordered donation awaiting payment.
    pub fn new_pending(
        user_id: Uuid,
        entity_id: Uuid,
        amount: BigDecimal,
        donation_type: DonationType,
        order_id: String,
        reference_id: Option<Uuid>,
        note: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            entity_id,
            amount,
            donation_type,
            order_id,
            payment_id: None,
            method: PENDING_METHOD.to_string(),
            status: DonationStatus::Pending,
            donated_at: None,
            reference_id,
            note,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Fields written by the single conditional update that finalizes a donation.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentUpdate {
    pub payment_id: String,
    pub method: String,
    pub amount: BigDecimal,
    pub status: DonationStatus,
    pub donated_at: Option<DateTime<Utc>>,
}

impl PaymentUpdate {
    /// Builds the update from gateway-authoritative data. `donated_at` is set
    /// only when the payment was captured.
    pub fn from_gateway(
        payment_id: &str,
        gateway_status: &str,
        method: Option<&str>,
        amount: BigDecimal,
        now: DateTime<Utc>,
    ) -> Self {
        let status = DonationStatus::from_gateway(gateway_status);
        let method = method
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(UNKNOWN_METHOD)
            .to_string();
        Self {
            payment_id: payment_id.to_string(),
            method,
            amount,
            status,
            donated_at: (status == DonationStatus::Success).then_some(now),
        }
    }
}

/// A donation joined with donor and entity display data.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DonationDetail {
    #[serde(flatten)]
    pub donation: Donation,
    pub donor_name: Option<String>,
    pub donor_email: Option<String>,
    pub entity_name: Option<String>,
}

/// Filter set for listing and export. Always scoped to one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct DonationFilters {
    pub entity_id: Uuid,
    pub status: Option<DonationStatus>,
    pub donation_type: Option<DonationType>,
    pub method: Option<String>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub min_amount: Option<BigDecimal>,
    pub max_amount: Option<BigDecimal>,
    pub search: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl DonationFilters {
    pub fn for_entity(entity_id: Uuid) -> Self {
        Self {
            entity_id,
            status: None,
            donation_type: None,
            method: None,
            from_date: None,
            to_date: None,
            min_amount: None,
            max_amount: None,
            search: None,
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }

    /// Clamps pagination into the supported window.
    pub fn paginate(mut self, limit: Option<i64>, offset: Option<i64>) -> Self {
        self.limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        self.offset = offset.unwrap_or(0).max(0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_pending_donation() {
        let user = Uuid::new_v4();
        let entity = Uuid::new_v4();
        let amount = BigDecimal::from_str("500.00").unwrap();

        let donation = Donation::new_pending(
            user,
            entity,
            amount.clone(),
            DonationType::General,
            "order_123".to_string(),
            None,
            Some("for the temple".to_string()),
        );

        assert_eq!(donation.user_id, user);
        assert_eq!(donation.entity_id, entity);
        assert_eq!(donation.amount, amount);
        assert_eq!(donation.status, DonationStatus::Pending);
        assert_eq!(donation.method, PENDING_METHOD);
        assert!(donation.payment_id.is_none());
        assert!(donation.donated_at.is_none());
    }

    #[test]
    fn test_status_from_gateway() {
        assert_eq!(DonationStatus::from_gateway("captured"), DonationStatus::Success);
        assert_eq!(DonationStatus::from_gateway("failed"), DonationStatus::Failed);
        assert_eq!(DonationStatus::from_gateway("authorized"), DonationStatus::Failed);
        assert_eq!(DonationStatus::from_gateway("CAPTURED"), DonationStatus::Failed);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!DonationStatus::Pending.is_terminal());
        assert!(DonationStatus::Success.is_terminal());
        assert!(DonationStatus::Failed.is_terminal());
    }

    #[test]
    fn test_donation_type_parse() {
        assert_eq!("annadanam".parse::<DonationType>(), Ok(DonationType::Annadanam));
        assert_eq!(" Seva ".parse::<DonationType>(), Ok(DonationType::Seva));
        assert!("lottery".parse::<DonationType>().is_err());
        for t in DonationType::ALL {
            assert_eq!(t.as_str().parse::<DonationType>(), Ok(t));
        }
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("pending".parse::<DonationStatus>(), Ok(DonationStatus::Pending));
        assert_eq!("SUCCESS".parse::<DonationStatus>(), Ok(DonationStatus::Success));
        assert!("refunded".parse::<DonationStatus>().is_err());
    }

    #[test]
    fn test_payment_update_captured_sets_donated_at() {
        let now = Utc::now();
        let update = PaymentUpdate::from_gateway(
            "pay_1",
            "captured",
            Some("upi"),
            BigDecimal::from(500),
            now,
        );
        assert_eq!(update.status, DonationStatus::Success);
        assert_eq!(update.method, "upi");
        assert_eq!(update.donated_at, Some(now));
    }

    #[test]
    fn test_payment_update_failed_leaves_donated_at_empty() {
        let update = PaymentUpdate::from_gateway(
            "pay_1",
            "failed",
            None,
            BigDecimal::from(500),
            Utc::now(),
        );
        assert_eq!(update.status, DonationStatus::Failed);
        assert_eq!(update.method, UNKNOWN_METHOD);
        assert!(update.donated_at.is_none());
    }

    #[test]
    fn test_filters_pagination_clamped() {
        let entity = Uuid::new_v4();
        let filters = DonationFilters::for_entity(entity).paginate(Some(1000), Some(-5));
        assert_eq!(filters.limit, MAX_PAGE_SIZE);
        assert_eq!(filters.offset, 0);

        let filters = DonationFilters::for_entity(entity).paginate(None, Some(40));
        assert_eq!(filters.limit, DEFAULT_PAGE_SIZE);
        assert_eq!(filters.offset, 40);
    }
}
