use crate::db::schema::ExternalSystem;
use crate::errors::{GatewayError, Result};
use crate::observability::MetricsRecorder;
use crate::rate_limit::fixed_window::FixedWindowCounter;
use redis::aio::ConnectionManager;

/// Per-system rate limiter over minute/hour/day fixed windows.
///
/// Limits are read from the registry entry at call time, so administrative
/// changes apply to the next call without restarts. Windows are advisory
/// protection for the partner system, not a distributed quota.
pub struct RateLimiter {
    counter: FixedWindowCounter,
}

const WINDOWS: [(&str, u64); 3] = [("minute", 60), ("hour", 3600), ("day", 86400)];

impl RateLimiter {
    pub fn new(manager: ConnectionManager) -> Self {
        Self {
            counter: FixedWindowCounter::new(manager),
        }
    }

    /// Check all configured windows for the system, incrementing each.
    /// Fails fast with `RateLimited` on the first exhausted window; callers
    /// decide whether to retry later, nothing is queued.
    pub async fn check_system(&self, system: &ExternalSystem) -> Result<()> {
        for (window_name, window_seconds) in WINDOWS {
            let limit = match window_name {
                "minute" => system.rate_limit_per_minute,
                "hour" => system.rate_limit_per_hour,
                _ => system.rate_limit_per_day,
            };

            let Some(limit) = limit else {
                continue;
            };
            if limit <= 0 {
                continue;
            }

            let key = format!("{}:{}", system.system_code, window_name);
            let check = self
                .counter
                .check_and_increment(&key, limit as u64, window_seconds)
                .await?;

            if !check.allowed {
                tracing::warn!(
                    system = %system.system_code,
                    window = %window_name,
                    current = %check.current,
                    limit = %check.limit,
                    "Rate limit exceeded"
                );
                MetricsRecorder::record_rate_limit_rejection(&system.system_code, window_name);

                return Err(GatewayError::RateLimited(format!(
                    "{} window exhausted for system {} ({}/{})",
                    window_name, system.system_code, check.current, check.limit
                )));
            }
        }

        Ok(())
    }

    /// Current counts for each window, for the statistics endpoint
    pub async fn current_counts(&self, system_code: &str) -> Result<Vec<(String, u64)>> {
        let mut counts = Vec::with_capacity(WINDOWS.len());

        for (window_name, window_seconds) in WINDOWS {
            let key = format!("{}:{}", system_code, window_name);
            let count = self.counter.get_count(&key, window_seconds).await?;
            counts.push((window_name.to_string(), count));
        }

        Ok(counts)
    }
}
