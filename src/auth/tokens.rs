use std::time::Duration;

use axum::extract::FromRef;
use base64ct::{Base64UrlUnpadded, Encoding};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::{config::JwtConfig, state::AppState};

/// Signed-token purpose. Refresh tokens are opaque and never JWTs, so the
/// only kinds here are access and email (confirmation / password reset).
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Email,
}

/// Claims of an access token; `sub` is the user id.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: usize,
    pub iat: usize,
    pub iss: String,
    pub aud: String,
    pub kind: TokenKind,
}

/// Claims of an email token; `sub` is the email address.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EmailClaims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
    pub iss: String,
    pub aud: String,
    pub kind: TokenKind,
}

/// Holds JWT signing and verification keys with config data.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub email_ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let JwtConfig {
            secret,
            issuer,
            audience,
            access_ttl_minutes,
            email_ttl_days,
            ..
        } = state.config.jwt.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            audience,
            access_ttl: Duration::from_secs((access_ttl_minutes as u64) * 60),
            email_ttl: Duration::from_secs((email_ttl_days as u64) * 24 * 3600),
        }
    }
}

impl JwtKeys {
    fn validation(&self) -> Validation {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation
    }

    pub fn sign_access(&self, user_id: Uuid) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.access_ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind: TokenKind::Access,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, "access token signed");
        Ok(token)
    }

    pub fn sign_email(&self, email: &str) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.email_ttl.as_secs() as i64);
        let claims = EmailClaims {
            sub: email.to_string(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind: TokenKind::Email,
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    pub fn verify_access(&self, token: &str) -> anyhow::Result<Claims> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation())?;
        if data.claims.kind != TokenKind::Access {
            anyhow::bail!("not an access token");
        }
        Ok(data.claims)
    }

    pub fn verify_email(&self, token: &str) -> anyhow::Result<EmailClaims> {
        let data = decode::<EmailClaims>(token, &self.decoding, &self.validation())?;
        if data.claims.kind != TokenKind::Email {
            anyhow::bail!("not an email token");
        }
        Ok(data.claims)
    }
}

/// Seconds until `exp`, saturating at zero.
pub fn remaining_secs(exp: usize) -> u64 {
    let now = OffsetDateTime::now_utc().unix_timestamp();
    (exp as i64 - now).max(0) as u64
}

/// One-way hash applied to refresh-token secrets before persistence.
pub fn hash_token(raw: &str) -> String {
    format!("{:x}", Sha256::digest(raw.as_bytes()))
}

/// High-entropy opaque refresh-token secret (32 random bytes, base64url).
pub fn generate_refresh_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    Base64UrlUnpadded::encode_string(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys() -> JwtKeys {
        JwtKeys::from_ref(&AppState::fake())
    }

    #[tokio::test]
    async fn sign_and_verify_access_token() {
        let keys = make_keys();
        let user_id = Uuid::new_v4();
        let token = keys.sign_access(user_id).expect("sign access");
        let claims = keys.verify_access(&token).expect("verify token");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert_eq!(claims.kind, TokenKind::Access);
    }

    #[tokio::test]
    async fn sign_and_verify_email_token() {
        let keys = make_keys();
        let token = keys.sign_email("alice@x.com").expect("sign email");
        let claims = keys.verify_email(&token).expect("verify email");
        assert_eq!(claims.sub, "alice@x.com");
        assert_eq!(claims.kind, TokenKind::Email);
    }

    #[tokio::test]
    async fn email_token_rejected_as_access_token() {
        let keys = make_keys();
        let token = keys.sign_email("alice@x.com").expect("sign email");
        assert!(keys.verify_access(&token).is_err());
    }

    #[tokio::test]
    async fn access_token_rejected_as_email_token() {
        let keys = make_keys();
        let token = keys.sign_access(Uuid::new_v4()).expect("sign access");
        assert!(keys.verify_email(&token).is_err());
    }

    #[tokio::test]
    async fn garbage_token_rejected() {
        let keys = make_keys();
        assert!(keys.verify_access("not.a.jwt").is_err());
    }

    #[test]
    fn token_hash_is_deterministic_and_hides_input() {
        let secret = "raw-refresh-secret";
        let a = hash_token(secret);
        let b = hash_token(secret);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, hash_token("other-secret"));
        assert!(!a.contains(secret));
    }

    #[test]
    fn refresh_secrets_are_unique_and_urlsafe() {
        let a = generate_refresh_secret();
        let b = generate_refresh_secret();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43); // 32 bytes, base64url, no padding
        assert!(a
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn remaining_secs_saturates() {
        let past = (OffsetDateTime::now_utc().unix_timestamp() - 100) as usize;
        assert_eq!(remaining_secs(past), 0);
        let future = (OffsetDateTime::now_utc().unix_timestamp() + 100) as usize;
        let left = remaining_secs(future);
        assert!(left > 90 && left <= 100);
    }
}
