use axum::http::HeaderMap;

use crate::error::{AppError, AppResult};
use crate::services::metrics::RATE_LIMIT_REJECTIONS;

/// Requests per client allowed on the public onboarding endpoints per window.
pub const ONBOARDING_MAX_REQUESTS: u64 = 30;
pub const ONBOARDING_WINDOW_SECS: u64 = 600;

/// Checks a per-client throttle stored in Redis.
///
/// Uses the INCR + EXPIRE strategy:
/// - Increments a counter for `key`
/// - On first increment, sets TTL to `window_secs`
/// - Returns `RateLimited` if the counter exceeds `max_attempts`
///
/// Without Redis the throttle is skipped. Redis errors let the request through.
pub async fn check_rate_limit(
    redis: Option<&redis::aio::MultiplexedConnection>,
    key: &str,
    max_attempts: u64,
    window_secs: u64,
) -> AppResult<()> {
    let Some(conn) = redis else {
        return Ok(());
    };
    let mut conn = conn.clone();

    let count: u64 = match redis::cmd("INCR").arg(key).query_async(&mut conn).await {
        Ok(n) => n,
        Err(e) => {
            tracing::warn!("rate limit check skipped: {e}");
            return Ok(());
        }
    };

    if count == 1 {
        // Set TTL only on first increment to avoid resetting the window on each attempt
        let _: Result<(), _> = redis::cmd("EXPIRE")
            .arg(key)
            .arg(window_secs)
            .query_async(&mut conn)
            .await;
    }

    if count > max_attempts {
        RATE_LIMIT_REJECTIONS.with_label_values(&["throttle"]).inc();
        return Err(AppError::RateLimited);
    }

    Ok(())
}

/// Client address as reported by the reverse proxy.
pub fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .or_else(|| headers.get("X-Real-IP").and_then(|v| v.to_str().ok()))
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[tokio::test]
    async fn test_no_redis_never_limits() {
        for _ in 0..100 {
            assert!(check_rate_limit(None, "throttle:join:1.2.3.4", 1, 60).await.is_ok());
        }
    }

    #[test]
    fn test_client_key_prefers_first_forwarded_address() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_key(&headers), "unknown");

        headers.insert("X-Real-IP", HeaderValue::from_static("10.0.0.9"));
        assert_eq!(client_key(&headers), "10.0.0.9");

        headers.insert("X-Forwarded-For", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        assert_eq!(client_key(&headers), "203.0.113.7");
    }
}
