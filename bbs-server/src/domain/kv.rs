//! # KeyValue
//!
//! Per-app persistent storage record (§3). The compound key
//! `(app_id, key, user_id, namespace)` is unique; callers never see rows
//! belonging to another app's `app_id` because every `Store::kv_*` call
//! takes `app_id` as a mandatory filter, not an optional one.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::value::Value;

#[derive(Debug, Clone)]
pub struct KeyValue {
    pub app_id: String,
    pub key: String,
    pub user_id: Option<Uuid>,
    pub namespace: Option<String>,
    pub value: Value,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl KeyValue {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at < now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_is_exclusive_of_the_boundary() {
        let now = Utc::now();
        let kv = KeyValue {
            app_id: "hangman".into(),
            key: "k".into(),
            user_id: None,
            namespace: None,
            value: Value::Null,
            expires_at: Some(now - chrono::Duration::seconds(1)),
            created_at: now,
            updated_at: now,
        };
        assert!(kv.is_expired(now));
        assert!(!KeyValue { expires_at: None, ..kv }.is_expired(now));
    }
}
