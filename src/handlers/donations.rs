use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::access::{AccessContext, ClientIp};
use crate::domain::{Donation, DonationFilters, DonationStatus, DonationType, Receipt};
use crate::error::AppError;
use crate::services::{
    DonationPage, StartDonationRequest, VerificationOutcome, VerificationRequest,
};
use crate::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct StartDonationBody {
    pub entity_id: Uuid,
    /// Major units, as a JSON number or a decimal string.
    #[schema(value_type = String, example = "500.00")]
    pub amount: Value,
    #[schema(example = "general")]
    pub donation_type: String,
    pub reference_id: Option<Uuid>,
    pub note: Option<String>,
}

/// Checkout confirmation. Accepts the gateway's own field names as well.
#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyDonationBody {
    #[serde(alias = "razorpay_order_id")]
    pub order_id: String,
    #[serde(alias = "razorpay_payment_id")]
    pub payment_id: String,
    #[serde(alias = "razorpay_signature")]
    pub signature: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VerifyDonationResponse {
    pub success: bool,
    pub status: String,
    pub message: String,
}

impl From<VerificationOutcome> for VerifyDonationResponse {
    fn from(outcome: VerificationOutcome) -> Self {
        let (success, status, message) = match outcome {
            VerificationOutcome::Captured => (
                true,
                DonationStatus::Success.as_str(),
                "Donation completed successfully",
            ),
            VerificationOutcome::NotCaptured => (
                false,
                DonationStatus::Failed.as_str(),
                "Payment was not captured",
            ),
            VerificationOutcome::AlreadyProcessed => {
                (true, "ALREADY_PROCESSED", "Donation already processed")
            }
        };
        Self {
            success,
            status: status.to_string(),
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DonationListQuery {
    /// Defaults to the caller's entity.
    pub entity_id: Option<Uuid>,
    pub status: Option<String>,
    pub donation_type: Option<String>,
    pub method: Option<String>,
    /// RFC 3339 timestamp or `YYYY-MM-DD`.
    pub from_date: Option<String>,
    /// RFC 3339 timestamp or `YYYY-MM-DD` (inclusive).
    pub to_date: Option<String>,
    pub min_amount: Option<String>,
    pub max_amount: Option<String>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EntityQuery {
    /// Defaults to the caller's entity.
    pub entity_id: Option<Uuid>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_date(value: &str, end_of_day: bool) -> Result<DateTime<Utc>, AppError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest(format!("invalid date '{}'", value)))?;
    let time = if end_of_day {
        NaiveTime::from_hms_opt(23, 59, 59)
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)
    }
    .ok_or_else(|| AppError::InternalError("invalid time of day".to_string()))?;
    Ok(date.and_time(time).and_utc())
}

fn parse_decimal(field: &str, value: &str) -> Result<BigDecimal, AppError> {
    BigDecimal::from_str(value)
        .map_err(|_| AppError::BadRequest(format!("invalid {} '{}'", field, value)))
}

fn resolve_entity(access: &AccessContext, requested: Option<Uuid>) -> Result<Uuid, AppError> {
    requested
        .or(access.accessible_entity_id)
        .ok_or_else(|| AppError::BadRequest("entity_id is required".to_string()))
}

impl DonationListQuery {
    pub fn into_filters(self, access: &AccessContext) -> Result<DonationFilters, AppError> {
        let mut filters = DonationFilters::for_entity(resolve_entity(access, self.entity_id)?)
            .paginate(self.limit, self.offset);

        if let Some(status) = non_empty(self.status) {
            filters.status = Some(DonationStatus::from_str(&status).map_err(AppError::BadRequest)?);
        }
        if let Some(kind) = non_empty(self.donation_type) {
            filters.donation_type = Some(DonationType::from_str(&kind).map_err(AppError::BadRequest)?);
        }
        filters.method = non_empty(self.method);
        if let Some(from) = non_empty(self.from_date) {
            filters.from_date = Some(parse_date(&from, false)?);
        }
        if let Some(to) = non_empty(self.to_date) {
            filters.to_date = Some(parse_date(&to, true)?);
        }
        if let Some(min) = non_empty(self.min_amount) {
            filters.min_amount = Some(parse_decimal("min_amount", &min)?);
        }
        if let Some(max) = non_empty(self.max_amount) {
            filters.max_amount = Some(parse_decimal("max_amount", &max)?);
        }
        filters.search = non_empty(self.search);

        Ok(filters)
    }
}

/// Request amounts arrive in major units. Strings and JSON numbers are both
/// read through their decimal text so no float rounding creeps in.
fn parse_amount(value: &Value) -> Result<BigDecimal, AppError> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return Err(AppError::BadRequest("amount must be a number".to_string())),
    };
    BigDecimal::from_str(&text)
        .map_err(|_| AppError::BadRequest(format!("invalid amount '{}'", text)))
}

/// Start a donation
///
/// Creates the gateway order and records a pending donation.
#[utoipa::path(
    post,
    path = "/donations",
    request_body = StartDonationBody,
    responses(
        (status = 201, description = "Order created", body = crate::services::StartDonationResponse),
        (status = 400, description = "Invalid amount or donation type"),
        (status = 401, description = "Missing caller identity"),
        (status = 502, description = "Payment gateway error")
    ),
    tag = "Donations"
)]
pub async fn start_donation(
    State(state): State<AppState>,
    access: AccessContext,
    ClientIp(source_ip): ClientIp,
    Json(body): Json<StartDonationBody>,
) -> Result<impl IntoResponse, AppError> {
    let amount = parse_amount(&body.amount)?;
    let donation_type = DonationType::from_str(&body.donation_type).map_err(AppError::BadRequest)?;

    let response = state
        .donations
        .start_donation(StartDonationRequest {
            user_id: access.user_id,
            entity_id: body.entity_id,
            amount,
            donation_type,
            reference_id: body.reference_id,
            note: non_empty(body.note),
            source_ip,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// Verify a payment
///
/// Called by the checkout client or the gateway webhook. Replays of an
/// already finalized donation succeed without changing it.
#[utoipa::path(
    post,
    path = "/donations/verify",
    request_body = VerifyDonationBody,
    responses(
        (status = 200, description = "Verification processed", body = VerifyDonationResponse),
        (status = 400, description = "Invalid signature"),
        (status = 404, description = "Unknown order"),
        (status = 502, description = "Payment gateway error")
    ),
    tag = "Donations"
)]
pub async fn verify_donation(
    State(state): State<AppState>,
    ClientIp(source_ip): ClientIp,
    Json(body): Json<VerifyDonationBody>,
) -> Result<Json<VerifyDonationResponse>, AppError> {
    let outcome = state
        .donations
        .verify_and_update_donation(VerificationRequest {
            order_id: body.order_id,
            payment_id: body.payment_id,
            signature: body.signature,
            source_ip,
        })
        .await?;

    Ok(Json(outcome.into()))
}

/// List donations of an entity
#[utoipa::path(
    get,
    path = "/donations",
    params(DonationListQuery),
    responses(
        (status = 200, description = "Filtered donations", body = DonationPage),
        (status = 403, description = "Entity outside the caller's scope")
    ),
    tag = "Donations"
)]
pub async fn list_donations(
    State(state): State<AppState>,
    access: AccessContext,
    Query(query): Query<DonationListQuery>,
) -> Result<Json<DonationPage>, AppError> {
    let filters = query.into_filters(&access)?;
    let page = state
        .donations
        .get_donations_with_filters(&access, filters)
        .await?;
    Ok(Json(page))
}

/// Export donations as CSV
#[utoipa::path(
    get,
    path = "/donations/export",
    params(DonationListQuery),
    responses(
        (status = 200, description = "CSV attachment", body = String, content_type = "text/csv"),
        (status = 403, description = "Entity outside the caller's scope")
    ),
    tag = "Donations"
)]
pub async fn export_donations(
    State(state): State<AppState>,
    access: AccessContext,
    ClientIp(source_ip): ClientIp,
    Query(query): Query<DonationListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let filters = query.into_filters(&access)?;
    let entity_id = filters.entity_id;
    let csv = state
        .donations
        .export_donations(&access, filters, source_ip.as_deref())
        .await?;

    let filename = format!(
        "attachment; filename=\"donations-{}-{}.csv\"",
        entity_id.simple(),
        Utc::now().format("%Y%m%d")
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, filename),
        ],
        csv,
    ))
}

/// The caller's own donations
#[utoipa::path(
    get,
    path = "/donations/mine",
    params(EntityQuery),
    responses((status = 200, description = "Caller's donations", body = [Donation])),
    tag = "Donations"
)]
pub async fn my_donations(
    State(state): State<AppState>,
    access: AccessContext,
    Query(query): Query<EntityQuery>,
) -> Result<Json<Vec<Donation>>, AppError> {
    let entity_id = resolve_entity(&access, query.entity_id)?;
    let donations = state.donations.list_my_donations(&access, entity_id).await?;
    Ok(Json(donations))
}

/// Donation status by gateway order id
#[utoipa::path(
    get,
    path = "/donations/order/{order_id}",
    params(("order_id" = String, Path, description = "Gateway order id")),
    responses(
        (status = 200, description = "Donation found", body = Donation),
        (status = 403, description = "Not the caller's donation"),
        (status = 404, description = "Unknown order")
    ),
    tag = "Donations"
)]
pub async fn get_by_order_id(
    State(state): State<AppState>,
    access: AccessContext,
    Path(order_id): Path<String>,
) -> Result<Json<Donation>, AppError> {
    let donation = state
        .donations
        .get_donation_by_order_id(&access, &order_id)
        .await?;
    Ok(Json(donation))
}

/// Receipt for a successful donation
#[utoipa::path(
    get,
    path = "/donations/{id}/receipt",
    params(
        ("id" = Uuid, Path, description = "Donation id"),
        EntityQuery
    ),
    responses(
        (status = 200, description = "Receipt", body = Receipt),
        (status = 400, description = "Donation not successful"),
        (status = 403, description = "Not permitted"),
        (status = 404, description = "Unknown donation")
    ),
    tag = "Donations"
)]
pub async fn get_receipt(
    State(state): State<AppState>,
    access: AccessContext,
    Path(donation_id): Path<Uuid>,
    Query(query): Query<EntityQuery>,
) -> Result<Json<Receipt>, AppError> {
    let entity_id = resolve_entity(&access, query.entity_id)?;
    let receipt = state
        .donations
        .generate_receipt(donation_id, &access, entity_id)
        .await?;
    Ok(Json(receipt))
}
