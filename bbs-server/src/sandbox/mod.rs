//! # Sandbox
//!
//! Everything needed to load and run a remote app's source inside an
//! isolated `sandbox-runtime` child process (§4.7): the restricted
//! scripting language ([`script`]), the checks that run before any of it
//! is interpreted ([`static_analysis`]), the host-implemented globals
//! scripts can call into ([`stdlib`]), and the wire protocol spoken over
//! the child's piped stdio ([`protocol`]). `remote::remote_app::RemoteApp`
//! is the only caller on the host side; `bin/sandbox_runtime.rs` is the
//! only caller on the child side.

pub mod protocol;
pub mod script;
pub mod static_analysis;
pub mod stdlib;
