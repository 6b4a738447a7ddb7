use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::error;
use uuid::Uuid;

use crate::db;
use crate::db_types::{User, ROLE_ADMIN};
use crate::error::ApiError;
use crate::types::AppState;

const TOKEN_TTL_SECS: i64 = 60 * 60;

/// Payload embedded in every issued token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: Uuid,
    pub role: String,
    pub exp: i64,
}

pub fn sign_token(user: &User, secret: &str) -> Result<String, ApiError> {
    let claims = Claims {
        user_id: user.id,
        role: user.role.clone(),
        exp: OffsetDateTime::now_utc().unix_timestamp() + TOKEN_TTL_SECS,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| {
        error!(error=%e, "failed to sign token");
        ApiError::Unauthorized("Authentication failed")
    })
}

pub fn decode_token(token: &str, secret: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
            ApiError::Unauthorized("Token expired")
        }
        _ => ApiError::Unauthorized("Invalid token"),
    })
}

/// Role gate applied after verification.  Pure check over the claims.
pub fn restrict_to(claims: &Claims, allowed_roles: &[&str]) -> Result<(), ApiError> {
    if allowed_roles.contains(&claims.role.as_str()) {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

/// Bearer token from the Authorization header, with a cookie fallback.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(header::AUTHORIZATION) {
        if let Ok(value) = value.to_str() {
            if let Some(token) = value.strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }
    }
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        pair.trim()
            .strip_prefix("token=")
            .map(|token| token.to_string())
    })
}

/// Verifies the request's token and stashes the claims in the request
/// extensions.  Also confirms the user row still exists; the lookup result is
/// not reused downstream.
pub async fn auth_middleware<B>(
    State(state): State<Arc<AppState>>,
    mut req: Request<B>,
    next: Next<B>,
) -> Result<Response, ApiError> {
    let token = token_from_headers(req.headers())
        .ok_or(ApiError::Unauthorized("No token provided"))?;

    let claims = decode_token(&token, &state.config.jwt_secret).map_err(|e| {
        error!(error=%e, "JWT verification error");
        e
    })?;

    if db::find_user(&state.db_pool, claims.user_id).await?.is_none() {
        return Err(ApiError::Unauthorized("User not found"));
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Layered after `auth_middleware` on admin routes.
pub async fn require_admin<B>(req: Request<B>, next: Next<B>) -> Result<Response, ApiError> {
    let claims = req
        .extensions()
        .get::<Claims>()
        .ok_or(ApiError::Unauthorized("No token provided"))?;
    restrict_to(claims, &[ROLE_ADMIN])?;
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db_types::ROLE_USER;
    use axum::http::HeaderValue;

    const SECRET: &str = "test-secret";

    fn test_user(role: &str) -> User {
        User {
            id: Uuid::new_v4(),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password: "hash".to_string(),
            balance: 10,
            role: role.to_string(),
            phone: None,
            from_number: "+1234567890".to_string(),
        }
    }

    #[test]
    fn token_roundtrip_preserves_claims() {
        let user = test_user(ROLE_ADMIN);
        let token = sign_token(&user, SECRET).unwrap();
        let claims = decode_token(&token, SECRET).unwrap();
        assert_eq!(claims.user_id, user.id);
        assert_eq!(claims.role, ROLE_ADMIN);
    }

    #[test]
    fn expired_token_is_rejected() {
        let claims = Claims {
            user_id: Uuid::new_v4(),
            role: ROLE_USER.to_string(),
            exp: OffsetDateTime::now_utc().unix_timestamp() - 2 * TOKEN_TTL_SECS,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        match decode_token(&token, SECRET) {
            Err(ApiError::Unauthorized(msg)) => assert_eq!(msg, "Token expired"),
            other => panic!("expected expiry rejection, got {other:?}"),
        }
    }

    #[test]
    fn token_with_wrong_secret_is_rejected() {
        let token = sign_token(&test_user(ROLE_USER), SECRET).unwrap();
        assert!(decode_token(&token, "other-secret").is_err());
    }

    #[test]
    fn restrict_to_enforces_roles() {
        let user = test_user(ROLE_USER);
        let token = sign_token(&user, SECRET).unwrap();
        let claims = decode_token(&token, SECRET).unwrap();

        assert!(matches!(
            restrict_to(&claims, &[ROLE_ADMIN]),
            Err(ApiError::Forbidden)
        ));
        assert!(restrict_to(&claims, &[ROLE_USER, ROLE_ADMIN]).is_ok());
    }

    #[test]
    fn bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer header-token"),
        );
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("token=cookie-token"),
        );
        assert_eq!(token_from_headers(&headers).as_deref(), Some("header-token"));
    }

    #[test]
    fn cookie_fallback_is_used_without_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; token=cookie-token"),
        );
        assert_eq!(token_from_headers(&headers).as_deref(), Some("cookie-token"));

        assert!(token_from_headers(&HeaderMap::new()).is_none());
    }
}
