use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::queries;
use crate::domain::{Donation, DonationDetail, DonationFilters, DonationStatus, PaymentUpdate};
use crate::ports::{DonationRepository, RepositoryError};

/// Postgres-backed donation store.
#[derive(Clone)]
pub struct PgDonationRepository {
    pool: PgPool,
}

impl PgDonationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DonationRepository for PgDonationRepository {
    async fn create(&self, donation: &Donation) -> Result<Donation, RepositoryError> {
        let row = queries::insert_donation(&self.pool, donation).await?;
        row.try_into()
    }

    async fn get_by_order_id(&self, order_id: &str) -> Result<Option<Donation>, RepositoryError> {
        queries::get_donation_by_order_id(&self.pool, order_id)
            .await?
            .map(Donation::try_from)
            .transpose()
    }

    async fn get_detail(&self, id: Uuid) -> Result<Option<DonationDetail>, RepositoryError> {
        queries::get_donation_detail(&self.pool, id)
            .await?
            .map(DonationDetail::try_from)
            .transpose()
    }

    async fn update_payment_details(
        &self,
        order_id: &str,
        expected: DonationStatus,
        update: &PaymentUpdate,
    ) -> Result<bool, RepositoryError> {
        let affected = queries::update_payment_details(&self.pool, order_id, expected, update).await?;
        Ok(affected == 1)
    }

    async fn list(&self, filters: &DonationFilters) -> Result<Vec<DonationDetail>, RepositoryError> {
        queries::list_donations(&self.pool, filters)
            .await?
            .into_iter()
            .map(DonationDetail::try_from)
            .collect()
    }

    async fn count(&self, filters: &DonationFilters) -> Result<i64, RepositoryError> {
        Ok(queries::count_donations(&self.pool, filters).await?)
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        entity_id: Uuid,
    ) -> Result<Vec<Donation>, RepositoryError> {
        queries::list_donations_by_user(&self.pool, user_id, entity_id)
            .await?
            .into_iter()
            .map(Donation::try_from)
            .collect()
    }
}
