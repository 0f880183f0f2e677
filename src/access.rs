//! Caller identity as resolved by the upstream auth layer.
//!
//! Authentication and role resolution happen before requests reach this
//! service; the resolved identity arrives in trusted headers.

use async_trait::async_trait;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use std::net::SocketAddr;
use uuid::Uuid;

use crate::error::{AppError, DonationError};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const ENTITY_ID_HEADER: &str = "x-entity-id";
pub const ROLE_HEADER: &str = "x-role";
pub const PERMISSIONS_HEADER: &str = "x-permissions";

/// Permission that lets a caller read every donation of its entity.
pub const DONATIONS_READ: &str = "donations:read";

#[derive(Debug, Clone, PartialEq)]
pub struct AccessContext {
    pub user_id: Uuid,
    pub role: String,
    pub accessible_entity_id: Option<Uuid>,
    pub permissions: Vec<String>,
}

impl AccessContext {
    pub fn new(user_id: Uuid, accessible_entity_id: Option<Uuid>) -> Self {
        Self {
            user_id,
            role: "devotee".to_string(),
            accessible_entity_id,
            permissions: Vec::new(),
        }
    }

    pub fn with_role(mut self, role: &str) -> Self {
        self.role = role.to_string();
        self
    }

    pub fn with_permission(mut self, permission: &str) -> Self {
        self.permissions.push(permission.to_string());
        self
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }

    /// Entity-scoped read access.
    pub fn can_read_entity(&self, entity_id: Uuid) -> bool {
        self.has_permission(DONATIONS_READ) && self.accessible_entity_id == Some(entity_id)
    }

    /// Rejects any request targeting an entity other than the caller's own.
    pub fn ensure_entity_scope(&self, entity_id: Uuid) -> Result<(), DonationError> {
        if self.accessible_entity_id == Some(entity_id) {
            Ok(())
        } else {
            Err(DonationError::AuthorizationDenied(format!(
                "no access to entity {}",
                entity_id
            )))
        }
    }
}

fn header_str<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for AccessContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header_str(parts, USER_ID_HEADER)
            .ok_or_else(|| AppError::Unauthorized("missing caller identity".to_string()))?;
        let user_id = Uuid::parse_str(user_id)
            .map_err(|_| AppError::Unauthorized("malformed caller identity".to_string()))?;

        let accessible_entity_id = match header_str(parts, ENTITY_ID_HEADER) {
            Some(raw) => Some(
                Uuid::parse_str(raw)
                    .map_err(|_| AppError::BadRequest("malformed entity id header".to_string()))?,
            ),
            None => None,
        };

        let role = header_str(parts, ROLE_HEADER).unwrap_or("devotee").to_string();
        let permissions = header_str(parts, PERMISSIONS_HEADER)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(AccessContext {
            user_id,
            role,
            accessible_entity_id,
            permissions,
        })
    }
}

/// Source address of the caller: first `X-Forwarded-For` hop, else the socket peer.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientIp(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = header_str(parts, "x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let ip = forwarded.or_else(|| {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        });

        Ok(ClientIp(ip))
    }
}
