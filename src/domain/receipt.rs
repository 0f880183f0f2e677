use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::donation::{DonationDetail, DonationType};

/// Donation receipt issued for a successful donation.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Receipt {
    pub receipt_number: String,
    pub donation_id: Uuid,
    pub entity_id: Uuid,
    pub entity_name: Option<String>,
    pub donor_name: Option<String>,
    pub donor_email: Option<String>,
    #[schema(value_type = String)]
    pub amount: BigDecimal,
    pub currency: String,
    pub donation_type: DonationType,
    pub method: String,
    pub order_id: String,
    pub payment_id: Option<String>,
    pub reference_id: Option<Uuid>,
    pub note: Option<String>,
    pub donated_at: Option<DateTime<Utc>>,
}

impl Receipt {
    pub fn from_detail(detail: DonationDetail, currency: &str) -> Self {
        let donation = detail.donation;
        Self {
            receipt_number: receipt_number(donation.entity_id, donation.id),
            donation_id: donation.id,
            entity_id: donation.entity_id,
            entity_name: detail.entity_name,
            donor_name: detail.donor_name,
            donor_email: detail.donor_email,
            amount: donation.amount,
            currency: currency.to_string(),
            donation_type: donation.donation_type,
            method: donation.method,
            order_id: donation.order_id,
            payment_id: donation.payment_id,
            reference_id: donation.reference_id,
            note: donation.note,
            donated_at: donation.donated_at,
        }
    }
}

/// Receipt numbers are a pure function of entity and donation, so a
/// re-issued receipt always carries the same number.
pub fn receipt_number(entity_id: Uuid, donation_id: Uuid) -> String {
    let entity = entity_id.simple().to_string();
    format!(
        "RCPT-{}-{}",
        entity[..8].to_ascii_uppercase(),
        donation_id.simple().to_string().to_ascii_uppercase()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receipt_number_is_deterministic() {
        let entity = Uuid::new_v4();
        let donation = Uuid::new_v4();
        assert_eq!(
            receipt_number(entity, donation),
            receipt_number(entity, donation)
        );
    }

    #[test]
    fn test_receipt_number_format() {
        let entity = Uuid::parse_str("a1b2c3d4-0000-0000-0000-000000000000").unwrap();
        let donation = Uuid::parse_str("00000000-0000-0000-0000-00000000abcd").unwrap();
        assert_eq!(
            receipt_number(entity, donation),
            "RCPT-A1B2C3D4-0000000000000000000000000000ABCD"
        );
    }

    #[test]
    fn test_receipt_number_differs_per_donation() {
        let entity = Uuid::new_v4();
        assert_ne!(
            receipt_number(entity, Uuid::new_v4()),
            receipt_number(entity, Uuid::new_v4())
        );
    }
}
