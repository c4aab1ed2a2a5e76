use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use serde_json::{json, Value};
use tracing::instrument;

use crate::auth::dto::{RequestEmail, UserResponse};
use crate::auth::repo::UserRepository;
use crate::auth::repo_types::CurrentUser;
use crate::auth::services::send_verification_email;
use crate::error::ApiError;
use crate::state::AppState;
use crate::users::services;

#[instrument(skip_all)]
pub async fn me(user: CurrentUser) -> Json<UserResponse> {
    Json(UserResponse::from(&user))
}

#[instrument(skip(state, token))]
pub async fn confirmed_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let message = services::confirm_email(&state, &token).await?;
    Ok(Json(json!({ "message": message })))
}

#[instrument(skip(state, payload))]
pub async fn request_email(
    State(state): State<AppState>,
    Json(payload): Json<RequestEmail>,
) -> Result<Json<Value>, ApiError> {
    let user = UserRepository::new(state.db.clone())
        .find_by_email(&payload.email)
        .await?;

    // An unknown address gets the same answer as a known one, so the
    // endpoint cannot be used to enumerate accounts.
    if let Some(user) = user {
        if user.confirmed {
            return Ok(Json(json!({ "message": "Your email is already confirmed" })));
        }
        let mail_state = state.clone();
        tokio::spawn(async move {
            send_verification_email(&mail_state, &user.email, &user.username).await;
        });
    }

    Ok(Json(json!({
        "message": "Check your email to confirm your address"
    })))
}

#[instrument(skip(state, user, multipart))]
pub async fn update_avatar(
    State(state): State<AppState>,
    user: CurrentUser,
    mut multipart: Multipart,
) -> Result<Json<UserResponse>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() == Some("file") {
            let content_type = field
                .content_type()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "application/octet-stream".into());
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(e.to_string()))?;
            let updated = services::update_avatar(&state, &user, data, &content_type).await?;
            return Ok(Json(UserResponse::from(&updated)));
        }
    }

    Err(ApiError::BadRequest("file field is required".into()))
}
