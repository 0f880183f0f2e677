use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::AuditEvent;
use crate::ports::{AuditError, AuditSink};

/// Appends audit events to the `audit_logs` table.
#[derive(Clone)]
pub struct PgAuditSink {
    pool: PgPool,
}

impl PgAuditSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn log_action(&self, event: &AuditEvent) -> Result<(), AuditError> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (id, user_id, entity_id, action, metadata, ip_address, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(event.actor_user_id)
        .bind(event.entity_id)
        .bind(event.action.as_str())
        .bind(&event.metadata)
        .bind(&event.source_ip)
        .bind(event.outcome.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| AuditError(e.to_string()))?;

        Ok(())
    }
}
