//! # bbs-server
//!
//! The session/app runtime: domain entities, the `Store` persistence
//! trait and its two backends, the service layer (`Identity`/`SessionSvc`),
//! the app contract and registry, the local and remote loaders, the
//! sandbox (shared between the `bbs-server` and `sandbox-runtime`
//! binaries), the capability facade, the `Shell` dispatcher, and the
//! HTTP API built on top of all of it.
//!
//! Exposed as a library, rather than folded entirely into `main.rs`, so
//! `src/bin/sandbox_runtime.rs` can reuse the exact same `sandbox::protocol`
//! and `sandbox::script` types the host side speaks - there is exactly one
//! definition of the wire format, shared by both binaries.

pub mod api;
pub mod capability;
pub mod contract;
pub mod domain;
pub mod local;
pub mod registry;
pub mod remote;
pub mod sandbox;
pub mod service;
pub mod shell;
pub mod store;

pub use contract::BbsApp;
pub use domain::{Session, SessionView};
