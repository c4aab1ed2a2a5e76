use axum::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{NewRefreshToken, NewUser, RefreshToken, User};
use crate::repository::EntityRepository;

const USER_COLUMNS: &str =
    "id, username, email, password_hash, avatar, confirmed, role, created_at";

pub struct UserRepository {
    db: PgPool,
}

impl UserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    /// Mark the user's email as confirmed.
    pub async fn confirm_email(&self, email: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET confirmed = TRUE WHERE email = $1")
            .bind(email)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    pub async fn update_avatar(&self, email: &str, url: &str) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET avatar = $2 WHERE email = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(email)
        .bind(url)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    pub async fn update_password(&self, email: &str, password_hash: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET password_hash = $2 WHERE email = $1")
            .bind(email)
            .bind(password_hash)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl EntityRepository for UserRepository {
    type Entity = User;
    type NewEntity = NewUser;

    async fn get_all(&self) -> anyhow::Result<Vec<User>> {
        let users =
            sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at"))
                .fetch_all(&self.db)
                .await?;
        Ok(users)
    }

    async fn get_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn create(&self, new: NewUser) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (username, email, password_hash, avatar, role)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&new.username)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.avatar)
        .bind(new.role)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    async fn update(&self, entity: &User) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users
             SET username = $2, email = $3, password_hash = $4, avatar = $5,
                 confirmed = $6, role = $7
             WHERE id = $1
             RETURNING {USER_COLUMNS}"
        ))
        .bind(entity.id)
        .bind(&entity.username)
        .bind(&entity.email)
        .bind(&entity.password_hash)
        .bind(&entity.avatar)
        .bind(entity.confirmed)
        .bind(entity.role)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}

const TOKEN_COLUMNS: &str =
    "id, user_id, token_hash, created_at, expired_at, revoked_at, ip_address, user_agent";

pub struct RefreshTokenRepository {
    db: PgPool,
}

impl RefreshTokenRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Look a record up regardless of its state (revocation keeps the row).
    pub async fn find_by_token_hash(&self, token_hash: &str) -> anyhow::Result<Option<RefreshToken>> {
        let token = sqlx::query_as::<_, RefreshToken>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM refresh_tokens WHERE token_hash = $1"
        ))
        .bind(token_hash)
        .fetch_optional(&self.db)
        .await?;
        Ok(token)
    }

    /// Look up a token that is neither revoked nor expired at `now`.
    pub async fn find_active(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<RefreshToken>> {
        let token = sqlx::query_as::<_, RefreshToken>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM refresh_tokens
             WHERE token_hash = $1 AND expired_at > $2 AND revoked_at IS NULL"
        ))
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.db)
        .await?;
        Ok(token)
    }

    /// Set `revoked_at` once; a second call leaves the first timestamp.
    pub async fn revoke(&self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = now() WHERE id = $1 AND revoked_at IS NULL",
        )
        .bind(id)
        .execute(&self.db)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl EntityRepository for RefreshTokenRepository {
    type Entity = RefreshToken;
    type NewEntity = NewRefreshToken;

    async fn get_all(&self) -> anyhow::Result<Vec<RefreshToken>> {
        let tokens = sqlx::query_as::<_, RefreshToken>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM refresh_tokens ORDER BY created_at"
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(tokens)
    }

    async fn get_by_id(&self, id: Uuid) -> anyhow::Result<Option<RefreshToken>> {
        let token = sqlx::query_as::<_, RefreshToken>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM refresh_tokens WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(token)
    }

    async fn create(&self, new: NewRefreshToken) -> anyhow::Result<RefreshToken> {
        let token = sqlx::query_as::<_, RefreshToken>(&format!(
            "INSERT INTO refresh_tokens (user_id, token_hash, expired_at, ip_address, user_agent)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {TOKEN_COLUMNS}"
        ))
        .bind(new.user_id)
        .bind(&new.token_hash)
        .bind(new.expired_at)
        .bind(&new.ip_address)
        .bind(&new.user_agent)
        .fetch_one(&self.db)
        .await?;
        Ok(token)
    }

    async fn update(&self, entity: &RefreshToken) -> anyhow::Result<RefreshToken> {
        let token = sqlx::query_as::<_, RefreshToken>(&format!(
            "UPDATE refresh_tokens
             SET expired_at = $2, revoked_at = $3
             WHERE id = $1
             RETURNING {TOKEN_COLUMNS}"
        ))
        .bind(entity.id)
        .bind(entity.expired_at)
        .bind(entity.revoked_at)
        .fetch_one(&self.db)
        .await?;
        Ok(token)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM refresh_tokens WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}
