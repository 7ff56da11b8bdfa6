//! # Domain Layer
//!
//! Framework-agnostic entities the rest of the runtime operates on:
//! [`Session`] (conversational state), [`User`]/[`UserProfile`] (identity),
//! [`KeyValue`] (per-app storage), [`LoadedApp`] (a registry entry), and
//! the tagged [`Value`] type used wherever the source system would have
//! passed a dynamically-typed blob (§9 design notes).

pub mod app;
pub mod kv;
pub mod session;
pub mod user;
pub mod value;

pub use app::{AppOrigin, LoadedApp};
pub use kv::KeyValue;
pub use session::{Session, SessionView, MAIN_AREA, MAX_HISTORY_LEN};
pub use user::{NewUser, Role, User, UserProfile};
pub use value::Value;
