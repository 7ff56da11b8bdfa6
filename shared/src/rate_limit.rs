//! # Rate Limiting
//!
//! Redis-backed dual-window rate limiting (§5): every (app, operation) pair
//! is capped both per-minute and in a 5-second burst window. A single Lua
//! script increments both counters and evaluates both caps atomically, so
//! concurrent requests from the same app can't race past the limit between
//! a plain `GET` and `INCR`.
//!
//! Once an operation is rejected, the caller is held in a cooldown for
//! `RateLimitConfig::cooldown_seconds` during which every further call for
//! that (app, operation) is rejected immediately without touching the
//! per-minute/burst counters again.

use crate::config::RateLimitConfig;
use crate::errors::ApiError;
use crate::redis_client::RedisClient;
use redis::Script;

/// Checks and atomically increments the counter (and the cooldown) for a
/// dual-window rate limit. Returns, in order: whether the call is allowed,
/// the current minute-window count, and the current burst-window count.
const CHECK_AND_INCREMENT: &str = r#"
local cooldown_key = KEYS[1]
local minute_key = KEYS[2]
local burst_key = KEYS[3]
local minute_limit = tonumber(ARGV[1])
local burst_limit = tonumber(ARGV[2])
local cooldown_seconds = tonumber(ARGV[3])

if redis.call("EXISTS", cooldown_key) == 1 then
    return {0, -1, -1}
end

local minute_count = redis.call("INCR", minute_key)
if minute_count == 1 then
    redis.call("EXPIRE", minute_key, 60)
end

local burst_count = redis.call("INCR", burst_key)
if burst_count == 1 then
    redis.call("EXPIRE", burst_key, 5)
end

if minute_count > minute_limit or burst_count > burst_limit then
    redis.call("SET", cooldown_key, "1", "EX", cooldown_seconds)
    return {0, minute_count, burst_count}
end

return {1, minute_count, burst_count}
"#;

/// Per (app, operation) dual-window limits pulled from [`RateLimitConfig`].
struct OperationLimits {
    per_minute: u32,
    burst_5s: u32,
}

/// Redis-backed rate limiter for §5's per-app operation table.
pub struct RateLimiter {
    redis: RedisClient,
    config: RateLimitConfig,
    script: Script,
}

impl RateLimiter {
    pub fn new(redis: RedisClient, config: RateLimitConfig) -> Self {
        Self { redis, config, script: Script::new(CHECK_AND_INCREMENT) }
    }

    /// Returns `Ok(())` if `operation` is still within its limit for
    /// `app_id`, incrementing the counters as a side effect.
    /// `Err(ApiError::TooManyRequests)` otherwise, with the configured
    /// cooldown duration attached.
    pub async fn check_and_increment(&self, app_id: &str, operation: &str) -> Result<(), ApiError> {
        let limits = limits_for(&self.config, operation);

        let cooldown_key = format!("ratelimit:{app_id}:{operation}:cooldown");
        let minute_key = format!("ratelimit:{app_id}:{operation}:minute");
        let burst_key = format!("ratelimit:{app_id}:{operation}:burst");

        let (allowed, _minute_count, _burst_count): (i64, i64, i64) = self
            .redis
            .eval_script(
                &self.script,
                &[cooldown_key, minute_key, burst_key],
                &[limits.per_minute as i64, limits.burst_5s as i64, self.config.cooldown_seconds as i64],
            )
            .await?;

        if allowed == 1 {
            Ok(())
        } else {
            Err(ApiError::TooManyRequests { retry_after_seconds: self.config.cooldown_seconds })
        }
    }
}

fn limits_for(config: &RateLimitConfig, operation: &str) -> OperationLimits {
    match operation {
        "kv_get" => OperationLimits { per_minute: config.kv_get_per_minute, burst_5s: config.kv_get_burst_5s },
        "kv_set" => OperationLimits { per_minute: config.kv_set_per_minute, burst_5s: config.kv_set_burst_5s },
        "kv_delete" => {
            OperationLimits { per_minute: config.kv_delete_per_minute, burst_5s: config.kv_delete_burst_5s }
        }
        "current_user" => OperationLimits {
            per_minute: config.current_user_per_minute,
            // the current-user lookup is cheap and read-only; its burst
            // cap tracks the per-minute cap rather than a separate knob
            burst_5s: config.current_user_per_minute,
        },
        // command_execution and anything unrecognized falls back to the
        // strictest table entry (§5)
        _ => OperationLimits {
            per_minute: config.command_execution_per_minute,
            burst_5s: config.command_execution_per_minute,
        },
    }
}

#[cfg(test)]
mod tests {
    // Exercising `check_and_increment` requires a live Redis instance for
    // the Lua script evaluation; the limit-selection table is covered below.
    use super::*;

    fn sample_config() -> RateLimitConfig {
        RateLimitConfig {
            kv_get_per_minute: 100,
            kv_get_burst_5s: 20,
            kv_set_per_minute: 50,
            kv_set_burst_5s: 10,
            kv_delete_per_minute: 20,
            kv_delete_burst_5s: 5,
            command_execution_per_minute: 30,
            current_user_per_minute: 60,
            cooldown_seconds: 30,
        }
    }

    #[test]
    fn limits_for_known_operations_match_config() {
        let config = sample_config();

        let kv_get = limits_for(&config, "kv_get");
        assert_eq!(kv_get.per_minute, 100);
        assert_eq!(kv_get.burst_5s, 20);

        let kv_set = limits_for(&config, "kv_set");
        assert_eq!(kv_set.per_minute, 50);
        assert_eq!(kv_set.burst_5s, 10);
    }

    #[test]
    fn limits_for_unknown_operation_falls_back_to_command_execution() {
        let config = sample_config();
        let unknown = limits_for(&config, "some_future_operation");
        assert_eq!(unknown.per_minute, 30);
        assert_eq!(unknown.burst_5s, 30);
    }
}
