use axum::extract::State;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // subject - the user id
    pub exp: i64,    // expiration time (unix timestamp)
}

/// Validate an HS256 bearer token and extract claims.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Unauthorized)
}

/// Parse the user id out of validated claims.
pub fn principal_from_claims(claims: &Claims) -> Result<Uuid, AppError> {
    Uuid::parse_str(&claims.sub).map_err(|_| AppError::BadRequest("invalid user_id in token".into()))
}

/// Middleware: extract the bearer token and stash the authenticated user id
/// in request extensions for the `Principal` extractor.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: axum::extract::Request,
    next: axum::middleware::Next,
) -> Result<axum::response::Response, AppError> {
    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::Unauthorized)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AppError::Unauthorized)?;

    let claims = verify_token(token, &state.config.jwt_secret)?;
    let user_id = principal_from_claims(&claims)?;

    req.extensions_mut().insert(user_id);

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token_for(sub: &str, secret: &str, exp: i64) -> String {
        encode(
            &Header::default(),
            &Claims {
                sub: sub.into(),
                exp,
            },
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn rejects_garbage_token() {
        assert!(matches!(
            verify_token("not_a_jwt", "secret"),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn rejects_wrong_secret() {
        let token = token_for(
            &Uuid::new_v4().to_string(),
            "secret-a",
            chrono::Utc::now().timestamp() + 3600,
        );
        assert!(verify_token(&token, "secret-b").is_err());
    }

    #[test]
    fn accepts_valid_token_and_extracts_principal() {
        let user = Uuid::new_v4();
        let token = token_for(
            &user.to_string(),
            "secret",
            chrono::Utc::now().timestamp() + 3600,
        );
        let claims = verify_token(&token, "secret").unwrap();
        assert_eq!(principal_from_claims(&claims).unwrap(), user);
    }

    #[test]
    fn rejects_expired_token() {
        let token = token_for(
            &Uuid::new_v4().to_string(),
            "secret",
            chrono::Utc::now().timestamp() - 3600,
        );
        assert!(verify_token(&token, "secret").is_err());
    }
}
