use crate::error::AppError;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use http::request::Parts;
use tracing::debug;
use uuid::Uuid;

/// Header an upstream gateway sets to the authenticated user's id.
pub const OWNER_HEADER: &str = "x-user-id";

/// The user that owns the leads and batches a request touches.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct OwnerId(pub Uuid);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for OwnerId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(OWNER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim);
        match raw.map(Uuid::parse_str) {
            Some(Ok(id)) => Ok(OwnerId(id)),
            Some(Err(e)) => {
                debug!(error=%e, "malformed owner header");
                Err(AppError::unauthorized())
            }
            None => Err(AppError::unauthorized()),
        }
    }
}
