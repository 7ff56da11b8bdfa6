//! # Data Transfer Objects
//!
//! Wire shapes for `/auth/*` and `/terminal/*` (§4.10/§4.11, §6). All
//! `camelCase` on the wire, validated with `validator` the same way the
//! teacher's `RegisterRequest`/`LoginRequest` are, re-shaped to the BBS's
//! own field set (username/displayName rather than email/firstName+lastName,
//! a two-tier `role`, a `sessionId` threaded through every call instead of
//! a bearer token).

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::UserProfile;
use shared::validation::validators::{not_blank, valid_display_name, valid_username};

// =============================================================================
// AUTH REQUESTS
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(custom(function = "valid_username"))]
    pub username: String,
    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub password: String,
    #[validate(custom(function = "valid_display_name"))]
    pub display_name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(custom(function = "not_blank"))]
    pub username: String,
    #[validate(custom(function = "not_blank"))]
    pub password: String,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    #[validate(custom(function = "not_blank"))]
    pub session_id: String,
}

// =============================================================================
// AUTH RESPONSES
// =============================================================================

/// The shared shape `register`/`login` return (§6: "Same shape").
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponseDto {
    pub success: bool,
    pub session_id: String,
    pub current_area: String,
    pub command_history: Vec<String>,
    pub user: UserProfile,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub success: bool,
    pub is_logged_in: bool,
    pub session_id: String,
    pub current_area: String,
    pub command_history: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

// =============================================================================
// TERMINAL
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalInitQuery {
    pub session_id: Option<String>,
    #[serde(default)]
    pub simplified: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuOption {
    pub index: usize,
    pub id: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalInitResponse {
    pub session_id: String,
    pub current_area: String,
    pub default_welcome_text: String,
    pub full_welcome_text: String,
    pub simple_welcome_text: String,
    pub menu_options: Vec<MenuOption>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TerminalCommandRequest {
    #[validate(custom(function = "not_blank"))]
    pub session_id: String,
    pub command: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub id: String,
    pub current_area: String,
    pub command_history: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalCommandData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screen: Option<String>,
    pub area: String,
    pub response: String,
    pub refresh: bool,
    pub session: SessionSnapshot,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalCommandResponse {
    pub success: bool,
    pub message: String,
    pub data: TerminalCommandData,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalSessionQuery {
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalSessionResponse {
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_area: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_length: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeQuery {
    pub session_id: String,
}
