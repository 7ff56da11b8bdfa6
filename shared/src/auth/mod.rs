//! # Authentication Primitives
//!
//! `bbs-server` authenticates by a username/password pair checked against
//! an Argon2id hash, then binds the authenticated user to an opaque
//! session key ([`session_token`]) stored server-side in the `Store` - no
//! bearer tokens, no refresh rotation, no blacklist.
//!
//! ## Module Structure
//!
//! ```text
//! auth/
//! ├── password.rs      - Secure password hashing with Argon2id
//! └── session_token.rs - Opaque session-key generation
//! ```
//!
//! | Component | Purpose |
//! |-----------|---------|
//! | [`password::PasswordHasher`] | Argon2id password hashing |
//! | [`password::PasswordValidator`] | Password strength rules |
//! | [`session_token::generate_session_key`] | Mint a new opaque session key |

pub mod password;
pub mod session_token;

pub use password::{PasswordHasher, PasswordValidator};
pub use session_token::generate_session_key;
