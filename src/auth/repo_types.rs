use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Application role stored on the user row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // argon2 hash, not exposed in JSON
    pub avatar: Option<String>,
    pub confirmed: bool,
    pub role: Role,
    pub created_at: OffsetDateTime,
}

/// Insert payload for `UserRepository::create`.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub avatar: Option<String>,
    pub role: Role,
}

/// Refresh token record. Only the SHA-256 hash of the secret is stored;
/// a row is active iff `revoked_at` is unset and `expired_at` is in the
/// future.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub created_at: OffsetDateTime,
    pub expired_at: OffsetDateTime,
    pub revoked_at: Option<OffsetDateTime>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RefreshToken {
    pub fn is_active(&self, now: OffsetDateTime) -> bool {
        self.revoked_at.is_none() && self.expired_at > now
    }
}

/// Insert payload for `RefreshTokenRepository::create`.
#[derive(Debug, Clone)]
pub struct NewRefreshToken {
    pub user_id: Uuid,
    pub token_hash: String,
    pub expired_at: OffsetDateTime,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Resolved identity threaded through authenticated handlers. This is also
/// the payload cached under `user:{token}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub avatar: Option<String>,
    pub confirmed: bool,
    pub role: Role,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            avatar: user.avatar.clone(),
            confirmed: user.confirmed,
            role: user.role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn token(revoked: Option<OffsetDateTime>, expired_at: OffsetDateTime) -> RefreshToken {
        RefreshToken {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            token_hash: "hash".into(),
            created_at: OffsetDateTime::now_utc(),
            expired_at,
            revoked_at: revoked,
            ip_address: None,
            user_agent: None,
        }
    }

    #[test]
    fn fresh_token_is_active() {
        let now = OffsetDateTime::now_utc();
        let t = token(None, now + Duration::days(7));
        assert!(t.is_active(now));
    }

    #[test]
    fn revoked_token_is_not_active() {
        let now = OffsetDateTime::now_utc();
        let t = token(Some(now), now + Duration::days(7));
        assert!(!t.is_active(now));
    }

    #[test]
    fn expired_token_is_not_active() {
        let now = OffsetDateTime::now_utc();
        let t = token(None, now - Duration::seconds(1));
        assert!(!t.is_active(now));
    }

    #[test]
    fn password_hash_never_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            username: "alice".into(),
            email: "alice@x.com".into(),
            password_hash: "$argon2id$secret".into(),
            avatar: None,
            confirmed: true,
            role: Role::User,
            created_at: OffsetDateTime::now_utc(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2id"));
        assert!(json.contains("alice"));
    }
}
