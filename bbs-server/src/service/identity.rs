//! # Identity (C2)
//!
//! Thin wrapper over [`shared::auth::password::PasswordHasher`] plus the
//! `User` -> `UserProfile` projection. Holds no state of its own; every
//! method is a pure function or a one-line delegate, kept as a named
//! service because `AuthEndpoints` and `Shell` both need the exact same
//! hash/verify/project operations and shouldn't reach into `shared`
//! directly.

use shared::auth::password::PasswordHasher;
use shared::errors::ApiError;

use crate::domain::{User, UserProfile};

#[derive(Debug, Clone, Default)]
pub struct Identity {
    hasher: PasswordHasher,
}

impl Identity {
    pub fn new() -> Self {
        Self { hasher: PasswordHasher::new() }
    }

    pub fn hash_password(&self, plaintext: &str) -> Result<String, ApiError> {
        self.hasher.hash(plaintext)
    }

    pub fn verify_password(&self, plaintext: &str, hash: &str) -> Result<bool, ApiError> {
        self.hasher.verify(plaintext, hash)
    }

    /// Projects a full `User` record to the client-safe `UserProfile`
    /// (§4.2) - never serialize a `User` directly onto the wire.
    pub fn public_view(&self, user: &User) -> UserProfile {
        UserProfile::from(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn hash_then_verify_round_trips() {
        let identity = Identity::new();
        let hash = identity.hash_password("correct horse battery staple").unwrap();
        assert!(identity.verify_password("correct horse battery staple", &hash).unwrap());
        assert!(!identity.verify_password("wrong password", &hash).unwrap());
    }

    #[test]
    fn public_view_never_carries_the_hash() {
        let identity = Identity::new();
        let user = User {
            id: Uuid::new_v4(),
            username: "alice".into(),
            display_name: "Alice".into(),
            email: None,
            password_hash: identity.hash_password("secret").unwrap(),
            role: "user".into(),
            join_date: Utc::now(),
            last_login: None,
            profile_settings: None,
        };
        let profile = identity.public_view(&user);
        let json = serde_json::to_string(&profile).unwrap();
        assert!(!json.contains("argon2"));
    }
}
