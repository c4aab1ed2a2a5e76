use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::extract::FromRef;
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use regex::Regex;
use sha2::{Digest, Sha256};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::auth::dto::RegisterRequest;
use crate::auth::repo::{RefreshTokenRepository, UserRepository};
use crate::auth::repo_types::{CurrentUser, NewRefreshToken, NewUser, Role, User};
use crate::auth::tokens::{generate_refresh_secret, hash_token, remaining_secs, JwtKeys};
use crate::cache::{blacklist_key, user_key};
use crate::error::ApiError;
use crate::repository::EntityRepository;
use crate::state::AppState;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Gravatar URL for an email, probed so that an unreachable host falls back
/// to no avatar at all.
pub async fn fetch_default_avatar(email: &str) -> anyhow::Result<String> {
    let address = email.trim().to_lowercase();
    let hash = format!("{:x}", Sha256::digest(address.as_bytes()));
    let url = format!("https://www.gravatar.com/avatar/{hash}?s=250&d=identicon");
    let response = reqwest::Client::new().head(&url).send().await?;
    anyhow::ensure!(
        response.status().is_success(),
        "gravatar returned {}",
        response.status()
    );
    Ok(url)
}

/// Create a user with role `user`. Username and email must both be unused.
/// The avatar lookup is best-effort and never fails the registration.
pub async fn register_user(state: &AppState, payload: &RegisterRequest) -> Result<User, ApiError> {
    let repo = UserRepository::new(state.db.clone());

    if repo.find_by_username(&payload.username).await?.is_some() {
        return Err(ApiError::Conflict("User already exists".into()));
    }
    if repo.find_by_email(&payload.email).await?.is_some() {
        return Err(ApiError::Conflict("Email already exists".into()));
    }

    let avatar = match fetch_default_avatar(&payload.email).await {
        Ok(url) => Some(url),
        Err(e) => {
            warn!(error = %e, "default avatar fetch failed");
            None
        }
    };

    let password_hash = hash_password(&payload.password)?;
    let user = repo
        .create(NewUser {
            username: payload.username.clone(),
            email: payload.email.clone(),
            password_hash,
            avatar,
            role: Role::User,
        })
        .await?;

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok(user)
}

/// Check credentials. Unknown users and wrong passwords share one message;
/// an unconfirmed email is reported distinctly.
pub async fn authenticate(
    state: &AppState,
    username: &str,
    password: &str,
) -> Result<User, ApiError> {
    let repo = UserRepository::new(state.db.clone());
    let user = repo
        .find_by_username(username)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Incorrect username or password".into()))?;

    if !user.confirmed {
        return Err(ApiError::Unauthorized("Email address not confirmed".into()));
    }

    if !verify_password(password, &user.password_hash)? {
        warn!(username = %username, "login invalid password");
        return Err(ApiError::Unauthorized(
            "Incorrect username or password".into(),
        ));
    }

    Ok(user)
}

/// Issue an opaque refresh token; only its hash is persisted.
pub async fn create_refresh_token(
    state: &AppState,
    user_id: Uuid,
    ip_address: Option<String>,
    user_agent: Option<String>,
) -> Result<String, ApiError> {
    let secret = generate_refresh_secret();
    let expired_at =
        OffsetDateTime::now_utc() + TimeDuration::days(state.config.jwt.refresh_ttl_days);
    RefreshTokenRepository::new(state.db.clone())
        .create(NewRefreshToken {
            user_id,
            token_hash: hash_token(&secret),
            expired_at,
            ip_address,
            user_agent,
        })
        .await?;
    debug!(user_id = %user_id, "refresh token issued");
    Ok(secret)
}

/// Hash the presented secret and resolve its active record to a user.
pub async fn validate_refresh_token(state: &AppState, raw: &str) -> Result<User, ApiError> {
    let repo = RefreshTokenRepository::new(state.db.clone());
    let record = repo
        .find_active(&hash_token(raw), OffsetDateTime::now_utc())
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid refresh token".into()))?;

    UserRepository::new(state.db.clone())
        .get_by_id(record.user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid refresh token".into()))
}

/// Mark the matching record revoked. A second call is a no-op.
pub async fn revoke_refresh_token(state: &AppState, raw: &str) -> Result<(), ApiError> {
    let repo = RefreshTokenRepository::new(state.db.clone());
    if let Some(record) = repo.find_by_token_hash(&hash_token(raw)).await? {
        if record.revoked_at.is_none() {
            repo.revoke(record.id).await?;
            info!(token_id = %record.id, user_id = %record.user_id, "refresh token revoked");
        }
    }
    Ok(())
}

/// Blacklist an access token for its remaining lifetime so it is rejected
/// ahead of its natural expiry.
pub async fn revoke_access_token(state: &AppState, token: &str) -> Result<(), ApiError> {
    let keys = JwtKeys::from_ref(state);
    let claims = keys
        .verify_access(token)
        .map_err(|_| ApiError::Unauthorized("Token wrong".into()))?;

    let ttl = remaining_secs(claims.exp);
    if ttl > 0 {
        if let Err(e) = state
            .cache
            .set_with_ttl(&blacklist_key(token), "1", ttl)
            .await
        {
            warn!(error = %e, "access token blacklist write failed");
        }
    }
    Ok(())
}

/// Resolve the current user for an access token: blacklist check, then
/// cached payload, then signature + database, repopulating the cache with a
/// TTL matching the token's remaining lifetime. Every cache failure is
/// treated as a miss.
pub async fn get_current_user(state: &AppState, token: &str) -> Result<CurrentUser, ApiError> {
    match state.cache.exists(&blacklist_key(token)).await {
        Ok(true) => return Err(ApiError::Unauthorized("Token revoked".into())),
        Ok(false) => {}
        Err(e) => warn!(error = %e, "blacklist lookup failed, skipping"),
    }

    match state.cache.get(&user_key(token)).await {
        Ok(Some(payload)) => match serde_json::from_str::<CurrentUser>(&payload) {
            Ok(user) => return Ok(user),
            Err(e) => warn!(error = %e, "discarding malformed cached user payload"),
        },
        Ok(None) => {}
        Err(e) => warn!(error = %e, "user cache lookup failed, skipping"),
    }

    let keys = JwtKeys::from_ref(state);
    let claims = keys
        .verify_access(token)
        .map_err(|_| ApiError::Unauthorized("Token wrong".into()))?;

    let user = UserRepository::new(state.db.clone())
        .get_by_id(claims.sub)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Could not validate credentials".into()))?;

    let current = CurrentUser::from(&user);
    let ttl = remaining_secs(claims.exp);
    if ttl > 0 {
        match serde_json::to_string(&current) {
            Ok(payload) => {
                if let Err(e) = state.cache.set_with_ttl(&user_key(token), &payload, ttl).await {
                    warn!(error = %e, "user cache population failed");
                }
            }
            Err(e) => warn!(error = %e, "user payload serialization failed"),
        }
    }
    Ok(current)
}

/// Email a password-reset link. The caller has already confirmed the user
/// exists; delivery failures are logged, not surfaced.
pub async fn send_password_reset_email(state: &AppState, email: &str) {
    let keys = JwtKeys::from_ref(state);
    let token = match keys.sign_email(email) {
        Ok(token) => token,
        Err(e) => {
            error!(error = %e, "reset token signing failed");
            return;
        }
    };
    let link = format!("{}api/auth/reset_password/{}", state.config.base_url, token);
    if let Err(e) = state.mailer.send_password_reset(email, &link).await {
        error!(error = %e, "password reset email sending failed");
    }
}

/// Email a confirmation link for a freshly registered account.
pub async fn send_verification_email(state: &AppState, email: &str, username: &str) {
    let keys = JwtKeys::from_ref(state);
    let token = match keys.sign_email(email) {
        Ok(token) => token,
        Err(e) => {
            error!(error = %e, "verification token signing failed");
            return;
        }
    };
    let link = format!(
        "{}api/users/confirmed_email/{}",
        state.config.base_url, token
    );
    if let Err(e) = state.mailer.send_verification(email, username, &link).await {
        error!(error = %e, "verification email sending failed");
    }
}

/// Decode the emailed token and overwrite the stored password hash.
pub async fn reset_password(
    state: &AppState,
    token: &str,
    new_password: &str,
) -> Result<(), ApiError> {
    let keys = JwtKeys::from_ref(state);
    let claims = keys
        .verify_email(token)
        .map_err(|_| ApiError::Unprocessable("Invalid email verification token".into()))?;

    if claims.sub.is_empty() {
        return Err(ApiError::BadRequest("Invalid token: no email".into()));
    }

    let repo = UserRepository::new(state.db.clone());
    let user = repo
        .find_by_email(&claims.sub)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    let password_hash = hash_password(new_password)?;
    repo.update_password(&user.email, &password_hash).await?;
    info!(user_id = %user.id, "password reset");
    Ok(())
}

#[cfg(test)]
mod password_tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(verify_password(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let password = "correct-horse-battery-staple";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(!verify_password("wrong-password", &hash).expect("verify should not error"));
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = verify_password("anything", "not-a-valid-hash").unwrap_err();
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("alice@example.com"));
        assert!(!is_valid_email("alice@example"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("two words@example.com"));
    }
}

#[cfg(test)]
mod session_tests {
    use super::*;

    // These exercise the cache-backed resolution paths without a database:
    // the fake state's pool is lazy and is never touched when the cache
    // answers first.

    #[tokio::test]
    async fn blacklisted_token_is_rejected_before_decode() {
        let state = AppState::fake();
        let token = "opaque-access-token";
        state
            .cache
            .set_with_ttl(&blacklist_key(token), "1", 60)
            .await
            .unwrap();

        let err = get_current_user(&state, token).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(ref m) if m == "Token revoked"));
    }

    #[tokio::test]
    async fn cached_payload_short_circuits_resolution() {
        let state = AppState::fake();
        let token = "cached-access-token";
        let cached = CurrentUser {
            id: Uuid::new_v4(),
            username: "alice".into(),
            email: "alice@x.com".into(),
            avatar: None,
            confirmed: true,
            role: Role::User,
        };
        state
            .cache
            .set_with_ttl(&user_key(token), &serde_json::to_string(&cached).unwrap(), 60)
            .await
            .unwrap();

        let resolved = get_current_user(&state, token).await.unwrap();
        assert_eq!(resolved.id, cached.id);
        assert_eq!(resolved.username, "alice");
    }

    #[tokio::test]
    async fn malformed_token_is_unauthorized() {
        let state = AppState::fake();
        let err = get_current_user(&state, "garbage").await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(ref m) if m == "Token wrong"));
    }

    #[tokio::test]
    async fn revoked_access_token_fails_resolution() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let token = keys.sign_access(Uuid::new_v4()).unwrap();

        revoke_access_token(&state, &token).await.unwrap();

        let err = get_current_user(&state, &token).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(ref m) if m == "Token revoked"));
    }

    #[tokio::test]
    async fn revoke_rejects_garbage_token() {
        let state = AppState::fake();
        let err = revoke_access_token(&state, "garbage").await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn reset_with_invalid_token_is_unprocessable() {
        let state = AppState::fake();
        let err = reset_password(&state, "garbage", "new-password")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unprocessable(_)));
    }
}
