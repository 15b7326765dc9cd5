use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Absent means the non-durable in-memory store.
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
}

impl AppConfig {
    /// Both signing secrets are required: defaulting to a random secret per
    /// process would invalidate every outstanding token on restart.
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").ok();
        let jwt = JwtConfig {
            access_secret: std::env::var("SECRET_KEY").context("SECRET_KEY must be set")?,
            refresh_secret: std::env::var("REFRESH_SECRET_KEY")
                .context("REFRESH_SECRET_KEY must be set")?,
            access_ttl_minutes: std::env::var("ACCESS_TOKEN_EXPIRE_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(30),
            refresh_ttl_days: std::env::var("REFRESH_TOKEN_EXPIRE_DAYS")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(7),
        };
        Ok(Self { database_url, jwt })
    }
}
