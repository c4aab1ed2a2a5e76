use axum::extract::FromRef;
use bytes::Bytes;
use tracing::info;

use crate::auth::repo::UserRepository;
use crate::auth::repo_types::{CurrentUser, Role, User};
use crate::auth::tokens::JwtKeys;
use crate::error::ApiError;
use crate::state::AppState;

/// Confirm the email named by the token. Repeated confirmations are a
/// no-op with their own message.
pub async fn confirm_email(state: &AppState, token: &str) -> Result<&'static str, ApiError> {
    let keys = JwtKeys::from_ref(state);
    let claims = keys
        .verify_email(token)
        .map_err(|_| ApiError::Unprocessable("Invalid email verification token".into()))?;

    let repo = UserRepository::new(state.db.clone());
    let user = repo
        .find_by_email(&claims.sub)
        .await?
        .ok_or_else(|| ApiError::BadRequest("Verification error".into()))?;

    if user.confirmed {
        return Ok("Your email is already confirmed");
    }

    repo.confirm_email(&user.email).await?;
    info!(user_id = %user.id, "email confirmed");
    Ok("Email successfully confirmed")
}

pub fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// Store a new avatar and persist its public URL. Restricted to admins;
/// everyone else keeps the default avatar.
pub async fn update_avatar(
    state: &AppState,
    current: &CurrentUser,
    body: Bytes,
    content_type: &str,
) -> Result<User, ApiError> {
    if current.role != Role::Admin {
        return Err(ApiError::Forbidden(
            "Only admins can change the default avatar.".into(),
        ));
    }

    let ext = ext_from_mime(content_type)
        .ok_or_else(|| ApiError::BadRequest("Unsupported image type".into()))?;
    let key = format!("avatars/{}.{}", current.id, ext);
    state.storage.put_object(&key, body, content_type).await?;

    let url = state.storage.public_url(&key);
    let user = UserRepository::new(state.db.clone())
        .update_avatar(&current.email, &url)
        .await?;
    info!(user_id = %user.id, "avatar updated");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn ext_from_mime_known_types() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/jpg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("image/webp"), Some("webp"));
        assert_eq!(ext_from_mime("application/octet-stream"), None);
    }

    #[tokio::test]
    async fn avatar_update_is_admin_gated() {
        let state = AppState::fake();
        let current = CurrentUser {
            id: Uuid::new_v4(),
            username: "alice".into(),
            email: "alice@x.com".into(),
            avatar: None,
            confirmed: true,
            role: Role::User,
        };
        let err = update_avatar(&state, &current, Bytes::from_static(b"img"), "image/png")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[tokio::test]
    async fn avatar_update_rejects_unknown_mime() {
        let state = AppState::fake();
        let current = CurrentUser {
            id: Uuid::new_v4(),
            username: "root".into(),
            email: "root@x.com".into(),
            avatar: None,
            confirmed: true,
            role: Role::Admin,
        };
        let err = update_avatar(&state, &current, Bytes::from_static(b"img"), "text/plain")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[tokio::test]
    async fn confirm_with_invalid_token_is_unprocessable() {
        let state = AppState::fake();
        let err = confirm_email(&state, "garbage").await.unwrap_err();
        assert!(matches!(err, ApiError::Unprocessable(_)));
    }
}
