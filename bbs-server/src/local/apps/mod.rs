//! Builtin, compiled-in apps (§4.6). Trusted Rust code, not dynamically
//! loaded - `LocalLoader::local_apps` is the compile-time registry naming
//! which of these are enabled.

pub mod hangman;
pub mod message_boards;
