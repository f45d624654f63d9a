use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AckResponse, AuthResponse, ForgotPasswordRequest, LoginRequest, PublicUser,
            ResetPasswordRequest, SignupRequest, VerifyResetTokenRequest,
        },
        extractors::AuthUser,
        jwt::JwtKeys,
        password::{hash_password, verify_password},
        repo::{is_unique_violation, User},
    },
    error::{ApiError, ApiResult},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login-user", post(login_user))
        .route("/auth/logout-user", post(logout_user))
        .route("/auth/profile", get(profile))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
        .route("/auth/verify-reset-token", post(verify_reset_token))
}

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Json(mut payload): Json<SignupRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    payload.name = payload.name.trim().to_string();
    payload.email = payload.email.trim().to_lowercase();

    if payload.name.is_empty() || payload.email.is_empty() || payload.password.is_empty() {
        warn!("signup with missing fields");
        return Err(ApiError::validation("Name, email and password are required"));
    }
    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::validation("Invalid email"));
    }

    // Best-effort pre-check for a friendlier error; the unique index on email
    // settles any race between concurrent signups.
    if let Some(_existing) = User::find_by_email(&state.db, &payload.email).await? {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::Conflict("Email already registered".into()));
    }

    let hash = hash_password(&payload.password)?;

    let user = match User::create(&state.db, &payload.name, &payload.email, &hash).await {
        Ok(u) => u,
        Err(e) if is_unique_violation(&e) => {
            warn!(email = %payload.email, "signup lost uniqueness race");
            return Err(ApiError::Conflict("Email already registered".into()));
        }
        Err(e) => return Err(e.into()),
    };

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign_session(user.id)?;

    info!(user_id = %user.id, email = %user.email, "user signed up");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: user.into(),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login_user(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    payload.email = payload.email.trim().to_lowercase();

    if payload.email.is_empty() || payload.password.is_empty() {
        warn!("login with missing fields");
        return Err(ApiError::validation("Email and password are required"));
    }

    // Unknown email and wrong password take the same branch so the response
    // never reveals which one it was.
    let user = match User::find_by_email(&state.db, &payload.email).await? {
        Some(u) => u,
        None => {
            warn!(email = %payload.email, "login unknown email");
            return Err(ApiError::auth("Invalid credentials."));
        }
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::auth("Invalid credentials."));
    }

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign_session(user.id)?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(AuthResponse {
        token,
        user: user.into(),
    }))
}

/// Bearer tokens are stateless; the server has nothing to revoke. The client
/// discards its copy and this endpoint only confirms the token was valid.
#[instrument(skip(_state))]
pub async fn logout_user(
    State(_state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<AckResponse>> {
    info!(user_id = %user_id, "user logged out");
    Ok(Json(AckResponse::new("Logged out")))
}

#[instrument(skip(state))]
pub async fn profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<PublicUser>> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(user.into()))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(mut payload): Json<ForgotPasswordRequest>,
) -> ApiResult<Json<AckResponse>> {
    payload.email = payload.email.trim().to_lowercase();

    if payload.email.is_empty() {
        return Err(ApiError::validation("Email is required"));
    }

    // Same acknowledgment whether or not the account exists; the mail only
    // goes out when it does.
    if let Some(user) = User::find_by_email(&state.db, &payload.email).await? {
        let keys = JwtKeys::from_ref(&state);
        let token = keys.sign_reset(user.id)?;
        let reset_url = format!(
            "{}/reset-password?token={}",
            state.config.frontend_url.trim_end_matches('/'),
            token
        );
        if let Err(e) = state.mailer.send_password_reset(&user.email, &reset_url).await {
            error!(error = %e, user_id = %user.id, "failed to send reset email");
        } else {
            info!(user_id = %user.id, "password reset requested");
        }
    } else {
        warn!(email = %payload.email, "password reset for unknown email");
    }

    Ok(Json(AckResponse::new(
        "If that email is registered, a reset link has been sent",
    )))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> ApiResult<Json<AckResponse>> {
    if payload.token.is_empty() || payload.new_password.is_empty() {
        return Err(ApiError::validation("Token and new password are required"));
    }

    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_reset(&payload.token)
        .map_err(|_| ApiError::auth("Invalid or expired reset token"))?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let hash = hash_password(&payload.new_password)?;
    User::update_password(&state.db, user.id, &hash).await?;

    info!(user_id = %user.id, "password reset");
    Ok(Json(AckResponse::new("Password has been reset")))
}

#[instrument(skip(state, payload))]
pub async fn verify_reset_token(
    State(state): State<AppState>,
    Json(payload): Json<VerifyResetTokenRequest>,
) -> ApiResult<Json<AckResponse>> {
    if payload.token.is_empty() {
        return Err(ApiError::validation("Token is required"));
    }

    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_reset(&payload.token)
        .map_err(|_| ApiError::auth("Invalid or expired reset token"))?;

    User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(AckResponse::new("Token is valid")))
}
