use std::env;

/// Which [`crate::db::Store`] backs the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreKind,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub jwt_secret: String,
    pub host: String,
    pub port: u16,
    pub app_base_url: String,
    pub expiry_sweep_interval_secs: u64,
    // SMTP (optional)
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let store = match env::var("STORE").unwrap_or_else(|_| "postgres".into()).as_str() {
            "postgres" => StoreKind::Postgres,
            "memory" => StoreKind::Memory,
            other => anyhow::bail!("Unknown STORE value: {other} (expected postgres or memory)"),
        };
        let database_url = optional("DATABASE_URL");
        if store == StoreKind::Postgres && database_url.is_none() {
            anyhow::bail!("Missing required env var: DATABASE_URL");
        }

        Ok(Self {
            store,
            database_url,
            redis_url: optional("REDIS_URL"),
            jwt_secret: required("JWT_SECRET")?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()?,
            app_base_url: env::var("APP_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into()),
            expiry_sweep_interval_secs: env::var("EXPIRY_SWEEP_INTERVAL_SECS")
                .unwrap_or_else(|_| "3600".into())
                .parse()?,
            smtp_host: optional("SMTP_HOST"),
            smtp_port: env::var("SMTP_PORT").ok().and_then(|v| v.parse().ok()),
            smtp_username: optional("SMTP_USERNAME"),
            smtp_password: optional("SMTP_PASSWORD"),
            smtp_from: optional("SMTP_FROM"),
        })
    }

    /// Settings for tests and embedded use: in-memory store, no collaborators.
    pub fn for_memory(jwt_secret: impl Into<String>) -> Self {
        Self {
            store: StoreKind::Memory,
            database_url: None,
            redis_url: None,
            jwt_secret: jwt_secret.into(),
            host: "127.0.0.1".into(),
            port: 8080,
            app_base_url: "http://localhost:3000".into(),
            expiry_sweep_interval_secs: 3600,
            smtp_host: None,
            smtp_port: None,
            smtp_username: None,
            smtp_password: None,
            smtp_from: None,
        }
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).map_err(|_| anyhow::anyhow!("Missing required env var: {}", key))
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}
