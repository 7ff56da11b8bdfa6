//! # Service Layer
//!
//! [`identity::Identity`] (C2, password hashing + public projection) and
//! [`session_service::SessionSvc`] (C3, the `Store`-backed session
//! lifecycle) - the two services every other layer (`Shell`,
//! `CapabilityFacade`, the HTTP handlers) is built on top of.

pub mod identity;
pub mod session_service;

pub use identity::Identity;
pub use session_service::SessionSvc;
