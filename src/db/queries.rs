use sqlx::{PgPool, Postgres, QueryBuilder, Result};
use uuid::Uuid;

use crate::db::models::{DonationDetailRow, DonationRow};
use crate::domain::{Donation, DonationFilters, DonationStatus, PaymentUpdate};

const DETAIL_SELECT: &str = "SELECT d.*, u.full_name AS donor_name, u.email AS donor_email, e.name AS entity_name \
     FROM donations d \
     LEFT JOIN users u ON u.id = d.user_id \
     LEFT JOIN entities e ON e.id = d.entity_id";

pub async fn insert_donation(pool: &PgPool, donation: &Donation) -> Result<DonationRow> {
    sqlx::query_as::<_, DonationRow>(
        "INSERT INTO donations (id, user_id, entity_id, amount, donation_type, order_id, payment_id, method, status, donated_at, reference_id, note, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) RETURNING *"
    )
    .bind(donation.id)
    .bind(donation.user_id)
    .bind(donation.entity_id)
    .bind(&donation.amount)
    .bind(donation.donation_type.as_str())
    .bind(&donation.order_id)
    .bind(&donation.payment_id)
    .bind(&donation.method)
    .bind(donation.status.as_str())
    .bind(donation.donated_at)
    .bind(donation.reference_id)
    .bind(&donation.note)
    .bind(donation.created_at)
    .bind(donation.updated_at)
    .fetch_one(pool)
    .await
}

pub async fn get_donation_by_order_id(pool: &PgPool, order_id: &str) -> Result<Option<DonationRow>> {
    sqlx::query_as::<_, DonationRow>("SELECT * FROM donations WHERE order_id = $1")
        .bind(order_id)
        .fetch_optional(pool)
        .await
}

pub async fn get_donation_detail(pool: &PgPool, id: Uuid) -> Result<Option<DonationDetailRow>> {
    sqlx::query_as::<_, DonationDetailRow>(&format!("{} WHERE d.id = $1", DETAIL_SELECT))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Compare-and-set on status. Returns the number of rows moved, 0 or 1.
pub async fn update_payment_details(
    pool: &PgPool,
    order_id: &str,
    expected: DonationStatus,
    update: &PaymentUpdate,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE donations
        SET payment_id = $3,
            method = $4,
            amount = $5,
            status = $6,
            donated_at = COALESCE($7, donated_at),
            updated_at = NOW()
        WHERE order_id = $1 AND status = $2
        "#,
    )
    .bind(order_id)
    .bind(expected.as_str())
    .bind(&update.payment_id)
    .bind(&update.method)
    .bind(&update.amount)
    .bind(update.status.as_str())
    .bind(update.donated_at)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filters: &DonationFilters) {
    builder.push(" WHERE d.entity_id = ");
    builder.push_bind(filters.entity_id);

    if let Some(status) = filters.status {
        builder.push(" AND d.status = ");
        builder.push_bind(status.as_str());
    }

    if let Some(donation_type) = filters.donation_type {
        builder.push(" AND d.donation_type = ");
        builder.push_bind(donation_type.as_str());
    }

    if let Some(method) = &filters.method {
        builder.push(" AND LOWER(d.method) = LOWER(");
        builder.push_bind(method.clone());
        builder.push(")");
    }

    if let Some(from_date) = filters.from_date {
        builder.push(" AND d.created_at >= ");
        builder.push_bind(from_date);
    }

    if let Some(to_date) = filters.to_date {
        builder.push(" AND d.created_at <= ");
        builder.push_bind(to_date);
    }

    if let Some(min_amount) = &filters.min_amount {
        builder.push(" AND d.amount >= ");
        builder.push_bind(min_amount.clone());
    }

    if let Some(max_amount) = &filters.max_amount {
        builder.push(" AND d.amount <= ");
        builder.push_bind(max_amount.clone());
    }

    if let Some(search) = filters.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        builder.push(" AND (u.full_name ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR u.email ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR d.order_id ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR d.payment_id ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR CAST(d.reference_id AS TEXT) ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
}

pub async fn list_donations(pool: &PgPool, filters: &DonationFilters) -> Result<Vec<DonationDetailRow>> {
    let mut builder = QueryBuilder::new(DETAIL_SELECT);
    push_filters(&mut builder, filters);
    builder.push(" ORDER BY d.created_at DESC, d.id DESC LIMIT ");
    builder.push_bind(filters.limit);
    builder.push(" OFFSET ");
    builder.push_bind(filters.offset);

    builder
        .build_query_as::<DonationDetailRow>()
        .fetch_all(pool)
        .await
}

pub async fn count_donations(pool: &PgPool, filters: &DonationFilters) -> Result<i64> {
    let mut builder = QueryBuilder::new(
        "SELECT COUNT(*) FROM donations d LEFT JOIN users u ON u.id = d.user_id",
    );
    push_filters(&mut builder, filters);

    builder.build_query_scalar::<i64>().fetch_one(pool).await
}

pub async fn list_donations_by_user(
    pool: &PgPool,
    user_id: Uuid,
    entity_id: Uuid,
) -> Result<Vec<DonationRow>> {
    sqlx::query_as::<_, DonationRow>(
        "SELECT * FROM donations WHERE user_id = $1 AND entity_id = $2 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .bind(entity_id)
    .fetch_all(pool)
    .await
}
