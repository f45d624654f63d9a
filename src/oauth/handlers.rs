use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use rand::{distributions::Alphanumeric, Rng};
use serde_json::{json, Value};
use tracing::{info, instrument, warn};

use crate::{
    error::{ApiError, ApiResult},
    oauth::dto::{map_debug_payload, AccessTokenQuery, CodeQuery, RedirectQuery, TokenValidity},
    state::AppState,
};

const STATE_COOKIE: &str = "oauth_state";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", get(login))
        .route("/auth/redirect", get(redirect))
        .route("/api/exchange-token", get(exchange_token))
        .route("/api/exchange-long-lived-token", get(exchange_long_lived_token))
        .route("/api/check-token-validity", get(check_token_validity))
        .route("/api/submit-form", post(submit_form))
}

fn new_state_value() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

/// Start the OAuth hop: mint a single-use state value, mirror it into a
/// short-lived cookie, and send the browser to the provider's consent page.
#[instrument(skip(state, jar))]
pub async fn login(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let value = new_state_value();
    let url = state.oauth.authorization_url(&value);

    let cookie = Cookie::build((STATE_COOKIE, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::minutes(10))
        .build();

    (StatusCode::FOUND, jar.add(cookie), [(header::LOCATION, url)])
}

/// OAuth callback: check the state value against the cookie, then exchange
/// the authorization code for a short-lived token.
#[instrument(skip(state, jar, query))]
pub async fn redirect(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<RedirectQuery>,
) -> ApiResult<(CookieJar, Json<Value>)> {
    let expected = jar.get(STATE_COOKIE).map(|c| c.value().to_string());
    let jar = jar.remove(Cookie::from(STATE_COOKIE));

    match (expected.as_deref(), query.state.as_deref()) {
        (Some(expected), Some(got)) if expected == got => {}
        _ => {
            warn!("oauth callback with missing or mismatched state");
            return Err(ApiError::auth("Invalid state parameter"));
        }
    }

    let code = query
        .code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::validation("Authorization code is invalid!"))?;

    let payload = state.oauth.exchange_code(code).await?;
    info!("authorization code exchanged");

    let access_token = payload.get("access_token").cloned().unwrap_or(Value::Null);
    let user_id = payload.get("user_id").cloned().unwrap_or(Value::Null);
    Ok((
        jar,
        Json(json!({ "access_token": access_token, "user_id": user_id })),
    ))
}

/// Code exchange for API callers; returns the provider payload verbatim.
#[instrument(skip(state, query))]
pub async fn exchange_token(
    State(state): State<AppState>,
    Query(query): Query<CodeQuery>,
) -> ApiResult<Json<Value>> {
    let code = query
        .code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::validation("Authorization code is invalid!"))?;

    let payload = state.oauth.exchange_code(code).await?;
    Ok(Json(payload))
}

/// Upgrade a short-lived token to a long-lived one, then forward the result
/// to the external function endpoint. The two calls are strictly sequential;
/// a failed exchange means the forward is never attempted.
#[instrument(skip(state, query))]
pub async fn exchange_long_lived_token(
    State(state): State<AppState>,
    Query(query): Query<AccessTokenQuery>,
) -> ApiResult<Json<Value>> {
    let short_lived = query
        .access_token
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::validation("Access token is missing!"))?;

    // Surface missing configuration before any network round trip.
    state.oauth.require_secret()?;
    state.oauth.require_forward_url()?;

    let exchange = state.oauth.exchange_long_lived(short_lived).await?;
    let long_lived = exchange
        .get("access_token")
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| {
            ApiError::upstream(
                "Provider response is missing the long-lived token.",
                Some(exchange.clone()),
            )
        })?;

    let forwarded = state.oauth.forward_token(&long_lived).await?;
    info!("long-lived token exchanged and forwarded");

    Ok(Json(json!({
        "success": true,
        "longLivedToken": exchange,
        "lambdaResponse": forwarded,
    })))
}

#[instrument(skip(state, query))]
pub async fn check_token_validity(
    State(state): State<AppState>,
    Query(query): Query<AccessTokenQuery>,
) -> ApiResult<Json<TokenValidity>> {
    let token = query
        .access_token
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::validation("Access token is missing!"))?;

    let payload = state.oauth.debug_token(token).await?;
    Ok(Json(map_debug_payload(&payload)))
}

/// Pure pass-through of an arbitrary JSON payload plus the caller's bearer
/// token to the external function endpoint. The payload shape is owned by
/// the endpoint, not validated here.
#[instrument(skip(state, headers, payload))]
pub async fn submit_form(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> ApiResult<Json<Value>> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
        .ok_or_else(|| ApiError::auth("No token provided"))?;

    let response = state.oauth.forward_form(&payload, bearer).await?;
    Ok(Json(response))
}
