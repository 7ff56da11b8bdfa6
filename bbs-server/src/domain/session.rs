//! # Session
//!
//! The unit of conversational state (§3). A session is created on first
//! contact, mutated only by `SessionSvc`, and durable across restarts -
//! it is a `Store`-backed record, not an in-memory cookie.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::user::Role;
use super::value::Value;

/// Maximum number of commands retained in `command_history` (§3).
pub const MAX_HISTORY_LEN: usize = 100;

/// Default area a session starts in, and the area transitioned to when an
/// app hands control back (`screen == None`).
pub const MAIN_AREA: &str = "main";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub key: String,
    pub user_id: Option<Uuid>,
    pub username: Option<String>,
    pub role: Option<Role>,
    pub current_area: String,
    pub command_history: Vec<String>,
    /// Per-app scratch data: `app_id -> (key -> value)`. Writable only by
    /// the app named by the outer key (enforced by `CapabilityFacade`, not
    /// by this type - `Session` itself has no access control).
    pub data: HashMap<String, HashMap<String, Value>>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub client_addr: Option<String>,
    pub user_agent: Option<String>,
}

impl Session {
    pub fn new(key: String, client_addr: Option<String>, user_agent: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            key,
            user_id: None,
            username: None,
            role: None,
            current_area: MAIN_AREA.to_string(),
            command_history: Vec::new(),
            data: HashMap::new(),
            created_at: now,
            last_activity: now,
            client_addr,
            user_agent,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    pub fn is_admin(&self) -> bool {
        matches!(self.role, Some(Role::Admin))
    }

    /// Pushes `command` onto the history, dropping the oldest entry once
    /// the cap is exceeded (§3 invariant, P1).
    pub fn push_history(&mut self, command: String) {
        self.command_history.push(command);
        if self.command_history.len() > MAX_HISTORY_LEN {
            let overflow = self.command_history.len() - MAX_HISTORY_LEN;
            self.command_history.drain(0..overflow);
        }
    }
}

/// A read-only, owned snapshot of a session handed to `BbsApp` methods.
/// Because it owns its data rather than borrowing the live `Session`, a
/// mutating write attempted by an app has nothing to land on - apps reach
/// persistent state only through `CapabilityFacade` (§4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub key: String,
    pub user_id: Option<Uuid>,
    pub username: Option<String>,
    pub role: Option<Role>,
    pub current_area: String,
    pub command_history: Vec<String>,
}

impl From<&Session> for SessionView {
    fn from(session: &Session) -> Self {
        Self {
            key: session.key.clone(),
            user_id: session.user_id,
            username: session.username.clone(),
            role: session.role.clone(),
            current_area: session.current_area.clone(),
            command_history: session.command_history.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_starts_at_main_with_no_user() {
        let session = Session::new("k1".into(), None, None);
        assert_eq!(session.current_area, MAIN_AREA);
        assert!(!session.is_authenticated());
        assert!(session.command_history.is_empty());
    }

    #[test]
    fn history_caps_at_max_len_dropping_oldest() {
        let mut session = Session::new("k1".into(), None, None);
        for i in 0..105 {
            session.push_history(format!("cmd{i}"));
        }
        assert_eq!(session.command_history.len(), MAX_HISTORY_LEN);
        assert_eq!(session.command_history.first().unwrap(), "cmd5");
        assert_eq!(session.command_history.last().unwrap(), "cmd104");
    }
}
