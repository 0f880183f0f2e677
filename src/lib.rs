pub mod access;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod health;
pub mod metrics;
pub mod middleware;
pub mod ports;
pub mod secrets;
pub mod services;

use axum::{
    http::HeaderValue,
    middleware as axum_middleware,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::OpenApi;

use crate::health::{HealthChecker, ReadinessState};
use crate::metrics::DonationMetrics;
use crate::services::DonationService;

#[derive(Clone)]
pub struct AppState {
    pub donations: Arc<DonationService>,
    pub metrics: DonationMetrics,
    pub health_checker: Arc<HealthChecker>,
    pub readiness: ReadinessState,
    /// Comma-separated origins; `None` allows any origin.
    pub cors_allowed_origins: Option<String>,
}

/// OpenAPI document for the donation API
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::ready,
        handlers::donations::start_donation,
        handlers::donations::verify_donation,
        handlers::donations::list_donations,
        handlers::donations::export_donations,
        handlers::donations::my_donations,
        handlers::donations::get_by_order_id,
        handlers::donations::get_receipt,
    ),
    components(
        schemas(
            handlers::ReadinessResponse,
            handlers::donations::StartDonationBody,
            handlers::donations::VerifyDonationBody,
            handlers::donations::VerifyDonationResponse,
            health::HealthResponse,
            health::DependencyStatus,
            services::StartDonationResponse,
            services::DonationPage,
            domain::Donation,
            domain::DonationDetail,
            domain::DonationStatus,
            domain::DonationType,
            domain::Receipt,
        )
    ),
    info(
        title = "Temple Donations API",
        version = "0.1.0",
        description = "Donation payments, verification, receipts and exports"
    ),
    tags(
        (name = "Donations", description = "Donation lifecycle"),
        (name = "Health", description = "Health check endpoints"),
    )
)]
pub struct ApiDoc;

pub fn cors_layer(allowed_origins: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match allowed_origins {
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .filter_map(|o| HeaderValue::from_str(o).ok())
                .collect();
            layer.allow_origin(AllowOrigin::list(origins))
        }
        None => layer.allow_origin(Any),
    }
}

pub fn create_app(app_state: AppState) -> Router {
    let cors = cors_layer(app_state.cors_allowed_origins.as_deref());

    Router::new()
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready))
        .route("/metrics", get(metrics::metrics_handler))
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .route(
            "/donations",
            post(handlers::donations::start_donation).get(handlers::donations::list_donations),
        )
        .route("/donations/verify", post(handlers::donations::verify_donation))
        .route("/donations/export", get(handlers::donations::export_donations))
        .route("/donations/mine", get(handlers::donations::my_donations))
        .route(
            "/donations/order/:order_id",
            get(handlers::donations::get_by_order_id),
        )
        .route("/donations/:id/receipt", get(handlers::donations::get_receipt))
        .layer(axum_middleware::from_fn(
            middleware::request_logger_middleware,
        ))
        .layer(cors)
        .with_state(app_state)
}
