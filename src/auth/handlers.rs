use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRef, Path, State},
    http::{HeaderMap, StatusCode},
    Form, Json,
};
use serde_json::{json, Value};
use tracing::{info, instrument, warn};

use crate::auth::dto::{
    LoginForm, RefreshTokenRequest, RegisterRequest, RequestEmail, ResetPasswordRequest,
    TokenResponse, UserResponse,
};
use crate::auth::extractors::BearerToken;
use crate::auth::repo::UserRepository;
use crate::auth::services::{self, is_valid_email};
use crate::auth::tokens::JwtKeys;
use crate::error::ApiError;
use crate::state::AppState;

fn client_meta(addr: &SocketAddr, headers: &HeaderMap) -> (Option<String>, Option<String>) {
    let ip = Some(addr.ip().to_string());
    let user_agent = headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    (ip, user_agent)
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::BadRequest("Invalid email".into()));
    }
    if payload.username.trim().len() < 2 {
        return Err(ApiError::BadRequest("Username too short".into()));
    }
    if payload.password.len() < 6 {
        warn!("password too short");
        return Err(ApiError::BadRequest("Password too short".into()));
    }

    let user = services::register_user(&state, &payload).await?;

    // Confirmation mail goes out in the background; the response does not
    // wait for SMTP.
    let mail_state = state.clone();
    let email = user.email.clone();
    let username = user.username.clone();
    tokio::spawn(async move {
        services::send_verification_email(&mail_state, &email, &username).await;
    });

    Ok((StatusCode::CREATED, Json(UserResponse::from(&user))))
}

#[instrument(skip(state, form))]
pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Result<Json<TokenResponse>, ApiError> {
    let user = services::authenticate(&state, &form.username, &form.password).await?;

    let keys = JwtKeys::from_ref(&state);
    let access_token = keys.sign_access(user.id)?;
    let (ip, user_agent) = client_meta(&addr, &headers);
    let refresh_token = services::create_refresh_token(&state, user.id, ip, user_agent).await?;

    info!(user_id = %user.id, username = %user.username, "user logged in");
    Ok(Json(TokenResponse::bearer(access_token, refresh_token)))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(payload): Json<RefreshTokenRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let user = services::validate_refresh_token(&state, &payload.refresh_token).await?;

    let keys = JwtKeys::from_ref(&state);
    let access_token = keys.sign_access(user.id)?;
    let (ip, user_agent) = client_meta(&addr, &headers);
    let refresh_token = services::create_refresh_token(&state, user.id, ip, user_agent).await?;

    // Rotation: the presented token stops being usable once the new pair
    // exists.
    services::revoke_refresh_token(&state, &payload.refresh_token).await?;

    Ok(Json(TokenResponse::bearer(access_token, refresh_token)))
}

#[instrument(skip(state, token, payload))]
pub async fn logout(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
    Json(payload): Json<RefreshTokenRequest>,
) -> Result<StatusCode, ApiError> {
    services::revoke_access_token(&state, &token).await?;
    services::revoke_refresh_token(&state, &payload.refresh_token).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, payload))]
pub async fn request_reset_password(
    State(state): State<AppState>,
    Json(payload): Json<RequestEmail>,
) -> Result<Json<Value>, ApiError> {
    let user = UserRepository::new(state.db.clone())
        .find_by_email(&payload.email)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    let mail_state = state.clone();
    tokio::spawn(async move {
        services::send_password_reset_email(&mail_state, &user.email).await;
    });

    Ok(Json(json!({
        "message": "Check your email for instructions to reset your password."
    })))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    if payload.new_password.len() < 6 {
        return Err(ApiError::BadRequest("Password too short".into()));
    }
    services::reset_password(&state, &payload.token, &payload.new_password).await?;
    Ok(Json(json!({ "message": "Password successfully changed." })))
}

#[instrument(skip(state, token))]
pub async fn verify_reset_password_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_email(&token)
        .map_err(|_| ApiError::BadRequest("Invalid or expired token".into()))?;

    Ok(Json(json!({ "message": "Token is valid", "email": claims.sub })))
}
