use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    DonationInitiated,
    DonationSuccess,
    DonationFailed,
    DonationAlreadyProcessed,
    DonationVerificationFailed,
    DonationsExported,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DonationInitiated => "DONATION_INITIATED",
            Self::DonationSuccess => "DONATION_SUCCESS",
            Self::DonationFailed => "DONATION_FAILED",
            Self::DonationAlreadyProcessed => "DONATION_ALREADY_PROCESSED",
            Self::DonationVerificationFailed => "DONATION_VERIFICATION_FAILED",
            Self::DonationsExported => "DONATIONS_EXPORTED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    Success,
    Failure,
}

impl AuditOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

/// An audit record handed to the sink. The actor is absent for
/// unauthenticated gateway callbacks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEvent {
    pub actor_user_id: Option<Uuid>,
    pub entity_id: Option<Uuid>,
    pub action: AuditAction,
    pub metadata: Value,
    pub source_ip: Option<String>,
    pub outcome: AuditOutcome,
}

impl AuditEvent {
    pub fn success(action: AuditAction, metadata: Value) -> Self {
        Self::new(action, AuditOutcome::Success, metadata)
    }

    pub fn failure(action: AuditAction, metadata: Value) -> Self {
        Self::new(action, AuditOutcome::Failure, metadata)
    }

    fn new(action: AuditAction, outcome: AuditOutcome, metadata: Value) -> Self {
        Self {
            actor_user_id: None,
            entity_id: None,
            action,
            metadata,
            source_ip: None,
            outcome,
        }
    }

    pub fn actor(mut self, user_id: Option<Uuid>) -> Self {
        self.actor_user_id = user_id;
        self
    }

    pub fn entity(mut self, entity_id: Option<Uuid>) -> Self {
        self.entity_id = entity_id;
        self
    }

    pub fn from_ip(mut self, ip: Option<&str>) -> Self {
        self.source_ip = ip.map(str::to_string);
        self
    }
}
