use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_days: i64,
    pub email_ttl_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub from_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub redis_url: String,
    pub base_url: String,
    pub jwt: JwtConfig,
    pub smtp: SmtpConfig,
    pub storage: StorageConfig,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: env_or("JWT_ISSUER", "contactbook"),
            audience: env_or("JWT_AUDIENCE", "contactbook-users"),
            access_ttl_minutes: env_parse_or("ACCESS_TOKEN_EXPIRE_MINUTES", 30),
            refresh_ttl_days: env_parse_or("REFRESH_TOKEN_EXPIRE_DAYS", 7),
            email_ttl_days: env_parse_or("EMAIL_TOKEN_EXPIRE_DAYS", 7),
        };
        let smtp = SmtpConfig {
            host: env_or("MAIL_SERVER", "localhost"),
            port: env_parse_or("MAIL_PORT", 465),
            username: env_or("MAIL_USERNAME", ""),
            password: env_or("MAIL_PASSWORD", ""),
            from: env_or("MAIL_FROM", "no-reply@contactbook.local"),
            from_name: env_or("MAIL_FROM_NAME", "Contactbook"),
        };
        let storage = StorageConfig {
            endpoint: env_or("MINIO_ENDPOINT", "http://localhost:9000"),
            bucket: env_or("MINIO_BUCKET", "avatars"),
            access_key: env_or("MINIO_ACCESS_KEY", "minioadmin"),
            secret_key: env_or("MINIO_SECRET_KEY", "minioadmin"),
        };
        Ok(Self {
            database_url,
            redis_url: env_or("REDIS_URL", "redis://localhost"),
            base_url: env_or("APP_BASE_URL", "http://localhost:8080/"),
            jwt,
            smtp,
            storage,
        })
    }
}
