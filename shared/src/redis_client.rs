//! # Redis Client
//!
//! Thin async Redis client built over a `ConnectionManager` (auto-reconnect
//! on failure). Used by [`crate::rate_limit::RateLimiter`] for the per-app
//! rate-limit counters (§5) and available to `bbs-server` for any other
//! ad-hoc caching need.
//!
//! Unlike a JWT-era client, this runtime has no bearer tokens to blacklist
//! and no refresh-token table to track here - BBS sessions are opaque,
//! Store-bound keys (`SessionSvc`), so the token-management methods such a
//! client would carry have no counterpart.

use crate::config::RedisConfig;
use crate::errors::ApiError;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::info;

/// Async Redis client, cheap to clone (wraps a `ConnectionManager`).
#[derive(Clone)]
pub struct RedisClient {
    conn: ConnectionManager,
}

impl RedisClient {
    pub async fn new(config: &RedisConfig) -> Result<Self, ApiError> {
        info!(url = %config.url, "Connecting to Redis");

        let client = redis::Client::open(config.url.as_str()).map_err(ApiError::RedisError)?;
        let conn = ConnectionManager::new(client).await.map_err(ApiError::RedisError)?;

        info!("Redis connection established");

        Ok(Self { conn })
    }

    /// Stores a JSON-serialized value with an optional TTL.
    pub async fn set<T: serde::Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), ApiError> {
        let serialized = serde_json::to_string(value)
            .map_err(|e| ApiError::InternalError { message: e.to_string() })?;

        let mut conn = self.conn.clone();

        match ttl {
            Some(duration) => {
                conn.set_ex::<_, _, ()>(key, &serialized, duration.as_secs())
                    .await
                    .map_err(ApiError::RedisError)?;
            }
            None => {
                conn.set::<_, _, ()>(key, &serialized).await.map_err(ApiError::RedisError)?;
            }
        }

        Ok(())
    }

    /// Retrieves and JSON-deserializes a value. `Ok(None)` means the key
    /// did not exist.
    pub async fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ApiError> {
        let mut conn = self.conn.clone();

        let value: Option<String> = conn.get(key).await.map_err(ApiError::RedisError)?;

        match value {
            Some(s) => {
                let deserialized = serde_json::from_str(&s)
                    .map_err(|e| ApiError::InternalError { message: e.to_string() })?;
                Ok(Some(deserialized))
            }
            None => Ok(None),
        }
    }

    pub async fn delete(&self, key: &str) -> Result<bool, ApiError> {
        let mut conn = self.conn.clone();
        let deleted: i64 = conn.del(key).await.map_err(ApiError::RedisError)?;
        Ok(deleted > 0)
    }

    pub async fn exists(&self, key: &str) -> Result<bool, ApiError> {
        let mut conn = self.conn.clone();
        conn.exists(key).await.map_err(ApiError::RedisError)
    }

    /// Atomically increments a counter, creating it at 1 if absent.
    pub async fn incr(&self, key: &str) -> Result<i64, ApiError> {
        let mut conn = self.conn.clone();
        conn.incr(key, 1).await.map_err(ApiError::RedisError)
    }

    /// Sets a TTL on an existing key. Returns `false` if the key is absent.
    pub async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, ApiError> {
        let mut conn = self.conn.clone();
        conn.expire(key, ttl.as_secs() as i64).await.map_err(ApiError::RedisError)
    }

    /// Runs a Lua script with the given keys/args and an `i64` arg list,
    /// returning the raw reply. [`crate::rate_limit::RateLimiter`] uses
    /// this for its atomic dual-window check-and-increment.
    pub async fn eval_script<T: redis::FromRedisValue>(
        &self,
        script: &redis::Script,
        keys: &[String],
        args: &[i64],
    ) -> Result<T, ApiError> {
        let mut conn = self.conn.clone();
        let mut invocation = script.prepare_invoke();
        for key in keys {
            invocation.key(key);
        }
        for arg in args {
            invocation.arg(*arg);
        }
        invocation.invoke_async(&mut conn).await.map_err(ApiError::RedisError)
    }

    pub async fn ping(&self) -> Result<(), ApiError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(ApiError::RedisError)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // Exercising this module requires a live Redis instance; the
    // dual-window rate-limit arithmetic is covered in `rate_limit`'s own
    // unit tests against a fake counter, not here.
}
