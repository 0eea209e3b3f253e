use std::env;

/// bcrypt work factor below which `from_env` refuses to start.
pub const MIN_BCRYPT_COST: u32 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Enables login rate limiting and the cross-instance event relay.
    pub redis_url: Option<String>,
    pub jwt_secret: String,
    pub session_ttl_seconds: u64,
    pub bcrypt_cost: u32,
    pub host: String,
    pub port: u16,
    /// Allowed CORS origin.
    pub app_base_url: String,
    /// Shared key for the platform operator endpoints; unset disables them.
    pub platform_key: Option<String>,
    pub default_page_limit: i64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let bcrypt_cost: u32 = env::var("BCRYPT_COST")
            .unwrap_or_else(|_| MIN_BCRYPT_COST.to_string())
            .parse()?;
        if bcrypt_cost < MIN_BCRYPT_COST {
            anyhow::bail!("BCRYPT_COST must be at least {MIN_BCRYPT_COST}");
        }

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            redis_url: env::var("REDIS_URL").ok().filter(|s| !s.is_empty()),
            jwt_secret: required("JWT_SECRET")?,
            session_ttl_seconds: env::var("SESSION_TTL_SECONDS")
                .unwrap_or_else(|_| "86400".into())
                .parse()?,
            bcrypt_cost,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()?,
            app_base_url: env::var("APP_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:5173".into()),
            platform_key: env::var("PLATFORM_KEY").ok().filter(|s| !s.is_empty()),
            default_page_limit: env::var("DEFAULT_PAGE_LIMIT")
                .unwrap_or_else(|_| "50".into())
                .parse()?,
        })
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).map_err(|_| anyhow::anyhow!("Missing required env var: {}", key))
}
