//! Environment-driven configuration.

use chrono::Duration;

/// Runtime configuration read from the environment.
///
/// `DATABASE_URL` takes precedence; when absent but `DB_HOST` is set, a
/// URL is composed from the `DB_*` variables. With neither set the server
/// runs on the in-memory store.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: Option<String>,
    pub max_db_connections: u32,
    pub jwt_secret: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        let port = env_parsed("PORT", 8080);

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .or_else(compose_database_url);

        let jwt_secret = std::env::var("JWT_SECRET_KEY").unwrap_or_else(|_| {
            tracing::warn!("JWT_SECRET_KEY not set; using insecure dev default");
            "dev-secret".to_string()
        });

        Self {
            port,
            database_url,
            max_db_connections: env_parsed("DB_MAX_CONNECTIONS", 10),
            jwt_secret,
            access_token_ttl: Duration::minutes(env_parsed("ACCESS_TOKEN_TTL_MINUTES", 15)),
            refresh_token_ttl: Duration::days(env_parsed("REFRESH_TOKEN_TTL_DAYS", 7)),
        }
    }
}

fn compose_database_url() -> Option<String> {
    let host = std::env::var("DB_HOST").ok()?;
    let port = std::env::var("DB_PORT").unwrap_or_else(|_| "5432".to_string());
    let user = std::env::var("DB_USER").unwrap_or_else(|_| "postgres".to_string());
    let password = std::env::var("DB_PASSWORD").unwrap_or_default();
    let name = std::env::var("DB_NAME").unwrap_or_else(|_| "cashnote".to_string());
    let sslmode = std::env::var("DB_SSLMODE").unwrap_or_else(|_| "disable".to_string());
    Some(format!(
        "postgres://{user}:{password}@{host}:{port}/{name}?sslmode={sslmode}"
    ))
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "unparsable env var; using default");
            default
        }),
        Err(_) => default,
    }
}
