//! # Request Validation Helpers
//!
//! Utilities for validating incoming request data using the `validator` crate.
//!
//! ## Overview
//!
//! | Component | Purpose |
//! |-----------|---------|
//! | [`validate_request`] | Validate a struct implementing `Validate` |
//! | [`parse_and_validate`] | Parse JSON and validate in one step |
//! | [`validators`] | Custom validation functions |
//!
//! ## Custom Validators
//!
//! | Validator | Purpose |
//! |-----------|---------|
//! | `not_blank` | String is not empty after trimming |
//! | `valid_username` | Username format (§3: lowercase, `[a-z0-9_]`, 3-20 chars) |
//! | `valid_display_name` | Display name is non-blank and reasonably sized |
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use shared::validation::{validate_request, validators};
//! use validator::Validate;
//!
//! #[derive(Validate)]
//! struct RegisterRequest {
//!     #[validate(custom(function = "validators::valid_username"))]
//!     username: String,
//!
//!     #[validate(length(min = 10))]
//!     password: String,
//! }
//!
//! async fn handler(body: Json<RegisterRequest>) -> Result<impl Responder, ApiError> {
//!     validate_request(&body)?;
//!     // Validation passed, continue...
//! }
//! ```

use crate::errors::ApiError;
use serde::de::DeserializeOwned;
use validator::Validate;

// =============================================================================
// Core Validation Functions
// =============================================================================

/// Validates a request DTO that implements `Validate`.
pub fn validate_request<T: Validate>(data: &T) -> Result<(), ApiError> {
    data.validate().map_err(ApiError::ValidationError)
}

/// Parses a JSON string and validates in a single step.
///
/// ## Errors
///
/// - `ApiError::BadRequest` if JSON parsing fails
/// - `ApiError::ValidationError` if validation fails
pub fn parse_and_validate<T: DeserializeOwned + Validate>(json: &str) -> Result<T, ApiError> {
    let data: T = serde_json::from_str(json)
        .map_err(|e| ApiError::BadRequest { message: e.to_string() })?;

    validate_request(&data)?;

    Ok(data)
}

// =============================================================================
// Custom Validators
// =============================================================================

/// Custom validation functions for use with `#[validate(custom)]`.
pub mod validators {
    use validator::ValidationError;

    /// Validates that a string is not blank (empty or whitespace-only).
    pub fn not_blank(value: &str) -> Result<(), ValidationError> {
        if value.trim().is_empty() {
            return Err(ValidationError::new("blank"));
        }
        Ok(())
    }

    /// Validates a username per §3: lowercase ASCII letters, digits, and
    /// underscores only, 3-20 characters, must start with a letter.
    ///
    /// ## Valid Examples
    ///
    /// - `"alice"` ✓
    /// - `"bob_the_builder"` ✓
    /// - `"u2"` ✗ (too short)
    ///
    /// ## Invalid Examples
    ///
    /// - `"Alice"` ✗ (uppercase)
    /// - `"2cool"` ✗ (starts with digit)
    /// - `"a"` ✗ (too short)
    /// - `"a-b"` ✗ (hyphen not allowed)
    pub fn valid_username(value: &str) -> Result<(), ValidationError> {
        if value.len() < 3 || value.len() > 20 {
            return Err(ValidationError::new("invalid_length"));
        }

        if !value.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') {
            return Err(ValidationError::new("invalid_characters"));
        }

        if !value.chars().next().is_some_and(|c| c.is_ascii_lowercase()) {
            return Err(ValidationError::new("must_start_with_letter"));
        }

        Ok(())
    }

    /// Validates a display name: non-blank, at most 50 characters.
    pub fn valid_display_name(value: &str) -> Result<(), ValidationError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::new("blank"));
        }
        if value.chars().count() > 50 {
            return Err(ValidationError::new("too_long"));
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::validators::*;

    #[test]
    fn test_not_blank_valid() {
        assert!(not_blank("hello").is_ok());
        assert!(not_blank("  hello  ").is_ok());
        assert!(not_blank("a").is_ok());
    }

    #[test]
    fn test_not_blank_invalid() {
        assert!(not_blank("").is_err());
        assert!(not_blank("   ").is_err());
        assert!(not_blank("\t\n").is_err());
    }

    #[test]
    fn test_valid_username_valid() {
        assert!(valid_username("alice").is_ok());
        assert!(valid_username("bob_the_builder").is_ok());
        assert!(valid_username("a23").is_ok());
    }

    #[test]
    fn test_valid_username_invalid_length() {
        assert!(valid_username("ab").is_err());
        assert!(valid_username(&"a".repeat(21)).is_err());
    }

    #[test]
    fn test_valid_username_invalid_characters() {
        assert!(valid_username("Alice").is_err());
        assert!(valid_username("a-b-c").is_err());
        assert!(valid_username("a b").is_err());
    }

    #[test]
    fn test_valid_username_must_start_with_letter() {
        assert!(valid_username("2cool").is_err());
        assert!(valid_username("_abc").is_err());
    }

    #[test]
    fn test_valid_display_name_valid() {
        assert!(valid_display_name("Alice Wonderland").is_ok());
        assert!(valid_display_name("x").is_ok());
    }

    #[test]
    fn test_valid_display_name_invalid() {
        assert!(valid_display_name("").is_err());
        assert!(valid_display_name("   ").is_err());
        assert!(valid_display_name(&"x".repeat(51)).is_err());
    }
}
