//! # Message Boards (builtin app)
//!
//! The simplest kind of shared, multi-user app: a single flat board of
//! posts, visible to every session, stored under one namespaced key so
//! every installation's posts live in one place regardless of which
//! session wrote them. Exercises `CapabilityFacade::namespaced_storage`
//! rather than `user_storage` - the data here is shared, not per-user.

use std::sync::OnceLock;

use async_trait::async_trait;
use chrono::Utc;

use crate::capability::CapabilityFacade;
use crate::contract::{BbsApp, CommandResult};
use crate::domain::{SessionView, Value};

const BOARD_NAMESPACE: &str = "general";
const POSTS_KEY: &str = "posts";
const MAX_POSTS: usize = 200;

struct Post {
    author: String,
    text: String,
    posted_at: String,
}

impl Post {
    fn to_value(&self) -> Value {
        let mut map = std::collections::HashMap::new();
        map.insert("author".to_string(), Value::String(self.author.clone()));
        map.insert("text".to_string(), Value::String(self.text.clone()));
        map.insert("postedAt".to_string(), Value::String(self.posted_at.clone()));
        Value::Map(map)
    }

    fn from_value(value: &Value) -> Option<Self> {
        let Value::Map(map) = value else { return None };
        let Value::String(author) = map.get("author")?.clone() else { return None };
        let Value::String(text) = map.get("text")?.clone() else { return None };
        let Value::String(posted_at) = map.get("postedAt")?.clone() else { return None };
        Some(Self { author, text, posted_at })
    }
}

pub struct MessageBoardsApp {
    caps: OnceLock<CapabilityFacade>,
}

impl Default for MessageBoardsApp {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBoardsApp {
    pub fn new() -> Self {
        Self { caps: OnceLock::new() }
    }

    fn caps(&self) -> &CapabilityFacade {
        self.caps.get().expect("MessageBoardsApp::on_init must run before handle_command")
    }

    async fn load_posts(&self) -> Vec<Post> {
        match self.caps().namespaced_storage_get(BOARD_NAMESPACE, POSTS_KEY).await {
            Ok(Some(Value::List(items))) => items.iter().filter_map(Post::from_value).collect(),
            _ => Vec::new(),
        }
    }

    async fn save_posts(&self, posts: &[Post]) {
        let value = Value::List(posts.iter().map(Post::to_value).collect());
        let _ = self.caps().namespaced_storage_set(BOARD_NAMESPACE, POSTS_KEY, value, None).await;
    }
}

#[async_trait]
impl BbsApp for MessageBoardsApp {
    fn id(&self) -> &str {
        "messageBoards"
    }
    fn name(&self) -> &str {
        "Message Boards"
    }
    fn version(&self) -> &str {
        "1.0.0"
    }
    fn description(&self) -> &str {
        "Read and post messages on a shared bulletin board."
    }
    fn author(&self) -> &str {
        "builtin"
    }

    async fn get_welcome_screen(&self) -> String {
        "Message Boards\nLIST to see recent posts, POST <message> to add one, B to go back.".to_string()
    }

    async fn handle_command(&self, _screen_id: Option<&str>, command: &str, session: &SessionView) -> CommandResult {
        let trimmed = command.trim();
        let upper = trimmed.to_uppercase();

        if upper == "LIST" || trimmed.is_empty() {
            let posts = self.load_posts().await;
            if posts.is_empty() {
                return CommandResult::new("No posts yet. Type POST <message> to add the first one.", Some("board".to_string()));
            }
            let listing = posts
                .iter()
                .rev()
                .take(10)
                .map(|p| format!("[{}] {}: {}", p.posted_at, p.author, p.text))
                .collect::<Vec<_>>()
                .join("\n");
            return CommandResult::new(listing, Some("board".to_string()));
        }

        if let Some(text) = trimmed.strip_prefix("POST ").or_else(|| trimmed.strip_prefix("post ")) {
            let author = session.username.clone().unwrap_or_else(|| "anonymous".to_string());
            let mut posts = self.load_posts().await;
            posts.push(Post { author, text: text.to_string(), posted_at: Utc::now().format("%Y-%m-%d %H:%M UTC").to_string() });
            if posts.len() > MAX_POSTS {
                let overflow = posts.len() - MAX_POSTS;
                posts.drain(0..overflow);
            }
            self.save_posts(&posts).await;
            return CommandResult::new("Posted.", Some("board".to_string()));
        }

        CommandResult::new("Unknown command. Try LIST, POST <message>, or B to go back.", Some("board".to_string()))
    }

    async fn get_help(&self, _screen_id: Option<&str>) -> String {
        "LIST shows the 10 most recent posts. POST <message> adds a new post. B or BACK returns to the main menu.".to_string()
    }

    async fn on_init(&self, caps: &CapabilityFacade) {
        let _ = self.caps.set(caps.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_round_trips_through_value() {
        let post = Post { author: "alice".into(), text: "hello".into(), posted_at: "2026-01-01 00:00 UTC".into() };
        let value = post.to_value();
        let restored = Post::from_value(&value).unwrap();
        assert_eq!(restored.author, "alice");
        assert_eq!(restored.text, "hello");
    }
}
