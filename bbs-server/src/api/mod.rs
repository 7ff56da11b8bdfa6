//! # API (C10/C11)
//!
//! The HTTP surface: `AuthEndpoints` and `TerminalEndpoints` (§4.10/§4.11),
//! wired up the same way the teacher's `auth-service` lays out `api/` -
//! `dto` for wire shapes, `handlers` for the per-route logic, `routes` for
//! the `ServiceConfig` wiring, and `state` for the shared `AppState`.

pub mod dto;
pub mod handlers;
pub mod routes;
pub mod state;

pub use state::AppState;
