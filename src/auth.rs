use crate::errors::ServiceError;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

/// Identity header stamped by the upstream auth gateway after session
/// verification; token issuance and validation live outside this service.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Authenticated caller identity for ownership checks.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ServiceError::Unauthorized("missing identity header".to_string()))?;

        let user_id = Uuid::parse_str(raw)
            .map_err(|_| ServiceError::Unauthorized("invalid identity header".to_string()))?;

        Ok(Self { user_id })
    }
}
