use crate::errors::Result;
use redis::aio::ConnectionManager;
use std::time::{SystemTime, UNIX_EPOCH};

const RATE_LIMIT_PREFIX: &str = "gw:rl:";

/// Fixed window rate counter backed by Redis.
///
/// Each (key, window) pair maps to one Redis string counter whose key is
/// suffixed with the current bucket number, so all callers racing inside a
/// window hit the same counter and the window resets on the bucket boundary.
pub struct FixedWindowCounter {
    manager: ConnectionManager,
}

/// Result of a window check
#[derive(Debug, Clone)]
pub struct WindowCheck {
    pub allowed: bool,
    pub current: u64,
    pub limit: u64,
    /// Unix timestamp when the current bucket expires
    pub resets_at: u64,
}

impl FixedWindowCounter {
    pub fn new(manager: ConnectionManager) -> Self {
        Self { manager }
    }

    /// Check the limit for the current bucket and increment when allowed.
    ///
    /// The get/compare/increment runs as a single Lua script so concurrent
    /// callers cannot both observe `limit - 1` and increment past the cap.
    pub async fn check_and_increment(
        &self,
        key: &str,
        limit: u64,
        window_seconds: u64,
    ) -> Result<WindowCheck> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| crate::errors::GatewayError::Internal(format!("Time error: {}", e)))?
            .as_secs();

        let bucket = now / window_seconds;
        let redis_key = format!("{}{}:{}", RATE_LIMIT_PREFIX, key, bucket);

        let script = redis::Script::new(
            r#"
            local current = tonumber(redis.call('GET', KEYS[1]) or '0')
            local limit = tonumber(ARGV[1])

            if current < limit then
                current = redis.call('INCR', KEYS[1])
                if current == 1 then
                    -- expire a little after the bucket boundary
                    redis.call('EXPIRE', KEYS[1], tonumber(ARGV[2]) + 60)
                end
                return {1, current}
            else
                return {0, current}
            end
            "#,
        );

        let mut manager = self.manager.clone();
        let result: Vec<i64> = script
            .key(&redis_key)
            .arg(limit)
            .arg(window_seconds)
            .invoke_async(&mut manager)
            .await?;

        let allowed = result[0] == 1;
        let current = result[1] as u64;
        let resets_at = (bucket + 1) * window_seconds;

        tracing::debug!(
            key = %key,
            allowed = %allowed,
            current = %current,
            limit = %limit,
            "Rate limit window check"
        );

        Ok(WindowCheck {
            allowed,
            current,
            limit,
            resets_at,
        })
    }

    /// Current count in the active bucket without incrementing
    pub async fn get_count(&self, key: &str, window_seconds: u64) -> Result<u64> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| crate::errors::GatewayError::Internal(format!("Time error: {}", e)))?
            .as_secs();

        let bucket = now / window_seconds;
        let redis_key = format!("{}{}:{}", RATE_LIMIT_PREFIX, key, bucket);

        let mut manager = self.manager.clone();
        let count: Option<u64> = redis::cmd("GET")
            .arg(&redis_key)
            .query_async(&mut manager)
            .await?;

        Ok(count.unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_fixed_window_basic() {
        let config = crate::config::RedisConfig {
            url: "redis://localhost:6379".to_string(),
            connection_timeout_seconds: 5,
        };

        let manager = crate::redis::create_client(&config).await.unwrap();
        let counter = FixedWindowCounter::new(manager);

        let key = format!("test:fixed_window:{}", uuid::Uuid::new_v4());

        let check = counter.check_and_increment(&key, 3, 60).await.unwrap();
        assert!(check.allowed);
        assert_eq!(check.current, 1);

        let check = counter.check_and_increment(&key, 3, 60).await.unwrap();
        assert!(check.allowed);
        assert_eq!(check.current, 2);

        counter.check_and_increment(&key, 3, 60).await.unwrap();

        // Fourth request in the same window is denied
        let check = counter.check_and_increment(&key, 3, 60).await.unwrap();
        assert!(!check.allowed);
        assert_eq!(check.current, 3);
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_get_count() {
        let config = crate::config::RedisConfig {
            url: "redis://localhost:6379".to_string(),
            connection_timeout_seconds: 5,
        };

        let manager = crate::redis::create_client(&config).await.unwrap();
        let counter = FixedWindowCounter::new(manager);

        let key = format!("test:fixed_window:{}", uuid::Uuid::new_v4());

        assert_eq!(counter.get_count(&key, 60).await.unwrap(), 0);

        counter.check_and_increment(&key, 10, 60).await.unwrap();
        counter.check_and_increment(&key, 10, 60).await.unwrap();

        assert_eq!(counter.get_count(&key, 60).await.unwrap(), 2);
    }
}
