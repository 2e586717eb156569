//! The authenticated principal, threaded explicitly into every handler.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::AppError;

/// The session's user, extracted from the id the auth middleware stashed in
/// request extensions. Handlers take this by value so every store call
/// receives an explicit principal instead of reading ambient state.
#[derive(Debug, Clone, Copy)]
pub struct Principal {
    pub id: Uuid,
}

#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .extensions
            .get::<Uuid>()
            .copied()
            .ok_or(AppError::Unauthorized)?;

        Ok(Principal { id: user_id })
    }
}
