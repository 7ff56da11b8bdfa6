//! # BBS Runtime - Shared Library
//!
//! Ambient, framework-agnostic building blocks shared by the `bbs-server`
//! binary: configuration, error handling, tracing, the Postgres connection
//! pool, Redis client, password hashing, and request validation helpers.
//!
//! ## Modules
//!
//! | Module | Purpose | Key Types |
//! |--------|---------|-----------|
//! | [`config`] | Environment-based configuration | [`AppConfig`] |
//! | [`errors`] | Standardized error handling | [`ApiError`], [`ApiResult`] |
//! | [`auth`] | Password hashing, session-key generation | [`auth::password::PasswordHasher`] |
//! | [`database`] | PostgreSQL connection pool | [`database::create_pool`] |
//! | [`redis_client`] | Redis for caching & rate limiting | [`redis_client::RedisClient`] |
//! | [`rate_limit`] | Atomic dual-window rate limiting | [`rate_limit::RateLimiter`] |
//! | [`tracing_config`] | Structured logging setup | [`tracing_config::init_tracing`] |
//! | [`validation`] | Request validation helpers | Custom validators |
//!
//! This crate carries no BBS domain knowledge (no `Session`, no `BbsApp`) -
//! that lives in `bbs-server`. It is the ambient stack (logging, config,
//! error taxonomy, password hashing, rate limiting) written once and reused
//! the way a real multi-crate workspace would.

pub mod auth;
pub mod config;
pub mod database;
pub mod errors;
pub mod rate_limit;
pub mod redis_client;
pub mod tracing_config;
pub mod validation;

pub use config::AppConfig;
pub use errors::{ApiError, ApiResult};
