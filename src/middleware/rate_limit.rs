use crate::error::AppError;

pub const LOGIN_MAX_ATTEMPTS: u64 = 5;
pub const LOGIN_WINDOW_SECS: u64 = 15 * 60;

pub fn login_key(tenant: &str, email: &str) -> String {
    format!("login:{tenant}:{}", email.trim().to_lowercase())
}

/// Fixed-window counter in Redis (INCR, EXPIRE on first hit).
/// Redis failures let the request through.
pub async fn check_rate_limit(
    redis: &mut redis::aio::MultiplexedConnection,
    key: &str,
    max_attempts: u64,
    window_secs: u64,
) -> Result<(), AppError> {
    let count: u64 = match redis::cmd("INCR").arg(key).query_async(redis).await {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("rate limit check skipped: {e}");
            return Ok(());
        }
    };

    if count == 1 {
        // Only the first hit opens the window
        let _: Result<(), _> = redis::cmd("EXPIRE")
            .arg(key)
            .arg(window_secs)
            .query_async(redis)
            .await;
    }

    if count > max_attempts {
        return Err(AppError::RateLimited);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_per_tenant_and_case_insensitive() {
        assert_eq!(login_key("school-a", " Ann@Example.org"), "login:school-a:ann@example.org");
        assert_ne!(login_key("school-a", "ann@x.org"), login_key("school-b", "ann@x.org"));
    }
}
