use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::instrument;
use uuid::Uuid;

use crate::auth::repo_types::CurrentUser;
use crate::contacts::dto::{ContactCreate, ContactResponse, ContactUpdate, ContactsQuery};
use crate::contacts::services;
use crate::error::ApiError;
use crate::state::AppState;

#[instrument(skip(state, user))]
pub async fn list_contacts(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ContactsQuery>,
) -> Result<Json<Vec<ContactResponse>>, ApiError> {
    let limit = query.limit.clamp(1, 500);
    let offset = query.offset.max(0);
    let contacts =
        services::list_contacts(&state, user.id, limit, offset, query.search.as_deref()).await?;
    Ok(Json(contacts.into_iter().map(ContactResponse::from).collect()))
}

#[instrument(skip(state, user, body))]
pub async fn create_contact(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(body): Json<ContactCreate>,
) -> Result<(StatusCode, Json<ContactResponse>), ApiError> {
    let contact = services::create_contact(&state, user.id, body).await?;
    Ok((StatusCode::CREATED, Json(ContactResponse::from(contact))))
}

#[instrument(skip(state, user))]
pub async fn get_contact(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(contact_id): Path<Uuid>,
) -> Result<Json<ContactResponse>, ApiError> {
    let contact = services::get_contact(&state, user.id, contact_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Contact not found".into()))?;
    Ok(Json(ContactResponse::from(contact)))
}

#[instrument(skip(state, user, body))]
pub async fn update_contact(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(contact_id): Path<Uuid>,
    Json(body): Json<ContactUpdate>,
) -> Result<Json<ContactResponse>, ApiError> {
    let contact = services::update_contact(&state, user.id, contact_id, &body)
        .await?
        .ok_or_else(|| ApiError::NotFound("Contact not found".into()))?;
    Ok(Json(ContactResponse::from(contact)))
}

#[instrument(skip(state, user))]
pub async fn delete_contact(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(contact_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    services::remove_contact(&state, user.id, contact_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Contact not found".into()))?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, user))]
pub async fn upcoming_birthdays(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<ContactResponse>>, ApiError> {
    let contacts = services::upcoming_birthdays(&state, user.id).await?;
    Ok(Json(contacts.into_iter().map(ContactResponse::from).collect()))
}
