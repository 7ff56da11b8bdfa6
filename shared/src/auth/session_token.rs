//! # Session Token Generation
//!
//! BBS sessions are identified by an opaque key rather than a signed
//! bearer token - there is no JWT layer to verify, so `bbs-server`'s
//! `SessionSvc` only ever needs a way to mint an unguessable identifier.
//!
//! Grounded on the teacher's own `generate_random_token` (used there for
//! password-reset and email-verification tokens): 32 cryptographically
//! random bytes, hex-encoded.

use rand::Rng;

/// Generates a 64-character hex string from 32 random bytes, suitable as
/// a session key or any other unguessable opaque identifier.
pub fn generate_session_key() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produces_64_hex_characters() {
        let key = generate_session_key();
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn is_unique_across_calls() {
        let a = generate_session_key();
        let b = generate_session_key();
        assert_ne!(a, b);
    }
}
