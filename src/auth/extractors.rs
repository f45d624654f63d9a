use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use uuid::Uuid;

use super::claims::TokenKind;
use super::jwt::JwtKeys;
use crate::error::ApiError;

/// Auth guard: extracts and validates the bearer JWT, yielding the user ID.
/// Only session tokens pass; reset tokens are rejected here so they stay
/// single-purpose.
#[derive(Debug)]
pub struct AuthUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);

        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::auth("No token provided"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .or_else(|| auth_header.strip_prefix("bearer "))
            .ok_or_else(|| ApiError::auth("No token provided"))?;

        let claims = keys
            .verify(token)
            .map_err(|_| ApiError::auth("Invalid token"))?;

        if claims.kind != TokenKind::Session {
            return Err(ApiError::auth("Invalid token"));
        }

        Ok(AuthUser(claims.sub))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use axum::http::Request;

    fn parts_with_auth(value: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/auth/profile");
        if let Some(v) = value {
            builder = builder.header(axum::http::header::AUTHORIZATION, v);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn missing_header_is_no_token_provided() {
        let state = AppState::fake();
        let mut parts = parts_with_auth(None);
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "No token provided");
    }

    #[tokio::test]
    async fn non_bearer_scheme_is_rejected() {
        let state = AppState::fake();
        let mut parts = parts_with_auth(Some("Basic dXNlcjpwdw=="));
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "No token provided");
    }

    #[tokio::test]
    async fn garbage_token_is_invalid() {
        let state = AppState::fake();
        let mut parts = parts_with_auth(Some("Bearer not.a.jwt"));
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid token");
    }

    #[tokio::test]
    async fn session_token_passes_and_reset_token_does_not() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let user_id = Uuid::new_v4();

        let session = keys.sign_session(user_id).unwrap();
        let mut parts = parts_with_auth(Some(&format!("Bearer {session}")));
        let AuthUser(id) = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .expect("session token accepted");
        assert_eq!(id, user_id);

        let reset = keys.sign_reset(user_id).unwrap();
        let mut parts = parts_with_auth(Some(&format!("Bearer {reset}")));
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid token");
    }
}
