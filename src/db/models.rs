use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::domain::{Donation, DonationDetail};
use crate::ports::RepositoryError;

#[derive(Debug, Clone, FromRow)]
pub struct DonationRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub entity_id: Uuid,
    pub amount: BigDecimal,
    pub donation_type: String,
    pub order_id: String,
    pub payment_id: Option<String>,
    pub method: String,
    pub status: String,
    pub donated_at: Option<DateTime<Utc>>,
    pub reference_id: Option<Uuid>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DonationDetailRow {
    #[sqlx(flatten)]
    pub donation: DonationRow,
    pub donor_name: Option<String>,
    pub donor_email: Option<String>,
    pub entity_name: Option<String>,
}

impl TryFrom<DonationRow> for Donation {
    type Error = RepositoryError;

    fn try_from(row: DonationRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse()
            .map_err(|e| RepositoryError::Corrupt(format!("donation {}: {}", row.id, e)))?;
        let donation_type = row
            .donation_type
            .parse()
            .map_err(|e| RepositoryError::Corrupt(format!("donation {}: {}", row.id, e)))?;

        Ok(Donation {
            id: row.id,
            user_id: row.user_id,
            entity_id: row.entity_id,
            amount: row.amount,
            donation_type,
            order_id: row.order_id,
            payment_id: row.payment_id,
            method: row.method,
            status,
            donated_at: row.donated_at,
            reference_id: row.reference_id,
            note: row.note,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<DonationDetailRow> for DonationDetail {
    type Error = RepositoryError;

    fn try_from(row: DonationDetailRow) -> Result<Self, Self::Error> {
        Ok(DonationDetail {
            donation: row.donation.try_into()?,
            donor_name: row.donor_name,
            donor_email: row.donor_email,
            entity_name: row.entity_name,
        })
    }
}
