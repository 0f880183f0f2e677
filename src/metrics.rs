use axum::{extract::State, http::StatusCode};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

use crate::AppState;

/// Prometheus collectors for the donation lifecycle.
#[derive(Clone)]
pub struct DonationMetrics {
    registry: Registry,
    initiated: IntCounterVec,
    verifications: IntCounterVec,
    gateway_latency: HistogramVec,
}

impl DonationMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let initiated = IntCounterVec::new(
            Opts::new("donations_initiated_total", "Donation orders requested"),
            &["outcome"],
        )?;
        let verifications = IntCounterVec::new(
            Opts::new(
                "donation_verifications_total",
                "Payment verification attempts by result",
            ),
            &["result"],
        )?;
        let gateway_latency = HistogramVec::new(
            HistogramOpts::new(
                "gateway_request_duration_seconds",
                "Latency of payment gateway calls",
            ),
            &["operation"],
        )?;

        registry.register(Box::new(initiated.clone()))?;
        registry.register(Box::new(verifications.clone()))?;
        registry.register(Box::new(gateway_latency.clone()))?;

        Ok(Self {
            registry,
            initiated,
            verifications,
            gateway_latency,
        })
    }

    pub fn record_initiated(&self, outcome: &str) {
        self.initiated.with_label_values(&[outcome]).inc();
    }

    pub fn record_verification(&self, result: &str) {
        self.verifications.with_label_values(&[result]).inc();
    }

    pub fn observe_gateway(&self, operation: &str, seconds: f64) {
        self.gateway_latency
            .with_label_values(&[operation])
            .observe(seconds);
    }

    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

pub async fn metrics_handler(State(state): State<AppState>) -> Result<String, (StatusCode, String)> {
    state.metrics.render().map_err(|e| {
        tracing::error!("Failed to render metrics: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_registration() {
        assert!(DonationMetrics::new().is_ok());
    }

    #[test]
    fn test_counters_rendered() {
        let metrics = DonationMetrics::new().unwrap();
        metrics.record_initiated("success");
        metrics.record_verification("already_processed");
        metrics.record_verification("already_processed");
        metrics.observe_gateway("create_order", 0.25);

        let output = metrics.render().unwrap();
        assert!(output.contains("donations_initiated_total{outcome=\"success\"} 1"));
        assert!(output.contains("donation_verifications_total{result=\"already_processed\"} 2"));
        assert!(output.contains("gateway_request_duration_seconds_count{operation=\"create_order\"} 1"));
    }

    #[test]
    fn test_metrics_handle_clone_shares_registry() {
        let metrics = DonationMetrics::new().unwrap();
        let cloned = metrics.clone();
        cloned.record_initiated("failure");
        assert!(metrics
            .render()
            .unwrap()
            .contains("donations_initiated_total{outcome=\"failure\"} 1"));
    }
}
