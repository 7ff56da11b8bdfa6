//! # Protocol
//!
//! The length-prefixed JSON framing spoken between `bbs-server` (host)
//! and the `sandbox-runtime` bin (child) over the child's piped
//! stdin/stdout (§4.7e). One process per call, no session state on either
//! side of the pipe to go stale - but not strictly one request/one
//! response: a [`Request::HandleCommand`]/`WelcomeScreen`/`Help`/
//! `Lifecycle` call may, mid-execution, need the host's `CapabilityFacade`
//! (§4.8's `storage`/`user_storage`/`namespaced_storage`/`current_user`).
//! When it does, the child sends a [`Response::Capability`] frame instead
//! of its final answer, blocks on stdin, and the host answers with a
//! [`Request::CapabilityResume`] frame over the same pipe before the child
//! resumes the script and eventually sends its real, final `Response`.
//! Framing is a 4-byte little-endian length prefix followed by that many
//! bytes of UTF-8 JSON; shared here so both sides serialize/deserialize
//! the exact same wire shape.

use std::io::{self, Read, Write};

use serde::{Deserialize, Serialize};

use crate::domain::{SessionView, UserProfile, Value};
use crate::sandbox::script::Program;

/// Resource quotas carried on every request, rather than configured once
/// on the child - `sandbox-runtime` is spawned fresh per call (§4.7e) and
/// has no persistent config of its own to read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub step_budget: usize,
    pub heap_ceiling: usize,
}

/// Which optional lifecycle callback (§4.4) a `Request::Lifecycle` call
/// invokes, and the extra argument each one carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum LifecycleHook {
    OnInit,
    OnUserEnter { user_id: String },
    OnUserExit { user_id: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Request {
    /// Load the program and extract app metadata plus which optional
    /// lifecycle hooks it declares - the admission step of the remote
    /// install pipeline (§4.7c step (e)).
    Describe { program: Program, limits: ResourceLimits },
    WelcomeScreen { program: Program, limits: ResourceLimits },
    HandleCommand {
        program: Program,
        limits: ResourceLimits,
        screen_id: Option<String>,
        command: String,
        session: SessionView,
    },
    Help { program: Program, limits: ResourceLimits, screen_id: Option<String> },
    /// Invokes `onInit`/`onUserEnter`/`onUserExit` if the app declares it
    /// (`DescribeResult.has_on_init`/etc.) - a no-op `Response::LifecycleDone`
    /// otherwise. `session` is `None` for `OnInit`, which runs before any
    /// session has entered the app.
    Lifecycle { program: Program, limits: ResourceLimits, hook: LifecycleHook, session: Option<SessionView> },
    /// Answers a mid-execution [`Response::Capability`] call with the
    /// host's result, resuming the still-running script.
    CapabilityResume { result: CapabilityResult },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescribeResult {
    pub id: String,
    pub name: String,
    pub version: String,
    pub description: String,
    pub author: String,
    pub has_on_init: bool,
    pub has_on_user_enter: bool,
    pub has_on_user_exit: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResultWire {
    pub response: String,
    pub screen: Option<String>,
    pub refresh: bool,
}

impl From<CommandResultWire> for crate::contract::CommandResult {
    fn from(wire: CommandResultWire) -> Self {
        crate::contract::CommandResult { response: wire.response, screen: wire.screen, refresh: wire.refresh }
    }
}

/// One `storage`/`user_storage`/`namespaced_storage`/`current_user` call
/// from a running script (§4.8), sent from the child to the host as a
/// [`Response::Capability`]. `user_storage`/`current_user` carry no user
/// id - the host resolves it from the `SessionView` it already has for
/// this call, not from anything the script could forge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum CapabilityCall {
    StorageGet { key: String },
    StorageSet { key: String, value: Value, ttl_secs: Option<i64> },
    StorageDelete { key: String },
    UserStorageGet { key: String },
    UserStorageSet { key: String, value: Value, ttl_secs: Option<i64> },
    UserStorageDelete { key: String },
    NamespacedStorageGet { namespace: String, key: String },
    NamespacedStorageSet { namespace: String, key: String, value: Value, ttl_secs: Option<i64> },
    NamespacedStorageDelete { namespace: String, key: String },
    CurrentUser,
}

/// The host's answer to a [`CapabilityCall`], carried back in a
/// `Request::CapabilityResume`. `Failed` covers both a genuine
/// `ApiError` from the facade (rate limit, store fault) and "this call is
/// unavailable in this context" (e.g. `current_user` with no session).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum CapabilityResult {
    Value(Option<Value>),
    Deleted(bool),
    Done,
    User(Option<UserProfile>),
    Failed(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Response {
    Describe(DescribeResult),
    WelcomeScreen(String),
    HandleCommand(CommandResultWire),
    Help(String),
    LifecycleDone,
    /// Mid-execution capability call - the host must answer with a
    /// `Request::CapabilityResume` before the child will send anything else.
    Capability(CapabilityCall),
    /// The interpreter raised an error (parse failure, step budget, heap
    /// ceiling, a script-level type error, ...). Carried as a string
    /// rather than a typed error so the host and the sandbox don't need
    /// to share `RunError`/`CompileError` across the pipe boundary.
    Error(String),
}

const MAX_FRAME_BYTES: u32 = 16 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("frame of {0} bytes exceeds the {MAX_FRAME_BYTES} byte limit")]
    TooLarge(u32),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Synchronous framing, used by `sandbox-runtime`'s single request/response
/// exchange over inherited stdin/stdout.
pub fn write_frame_sync<W: Write>(writer: &mut W, payload: &[u8]) -> Result<(), FrameError> {
    let len = u32::try_from(payload.len()).map_err(|_| FrameError::TooLarge(u32::MAX))?;
    if len > MAX_FRAME_BYTES {
        return Err(FrameError::TooLarge(len));
    }
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}

pub fn read_frame_sync<R: Read>(reader: &mut R) -> Result<Vec<u8>, FrameError> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_le_bytes(len_buf);
    if len > MAX_FRAME_BYTES {
        return Err(FrameError::TooLarge(len));
    }
    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload)?;
    Ok(payload)
}

pub fn encode_request(request: &Request) -> Result<Vec<u8>, FrameError> {
    Ok(serde_json::to_vec(request)?)
}

pub fn decode_response(payload: &[u8]) -> Result<Response, FrameError> {
    Ok(serde_json::from_slice(payload)?)
}

pub fn encode_response(response: &Response) -> Result<Vec<u8>, FrameError> {
    Ok(serde_json::to_vec(response)?)
}

pub fn decode_request(payload: &[u8]) -> Result<Request, FrameError> {
    Ok(serde_json::from_slice(payload)?)
}

/// Async framing over the child's piped handles, used by
/// `remote::remote_app::RemoteApp` on the host side.
pub mod asynchronous {
    use super::{FrameError, MAX_FRAME_BYTES};
    use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

    pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, payload: &[u8]) -> Result<(), FrameError> {
        let len = u32::try_from(payload.len()).map_err(|_| FrameError::TooLarge(u32::MAX))?;
        if len > MAX_FRAME_BYTES {
            return Err(FrameError::TooLarge(len));
        }
        writer.write_all(&len.to_le_bytes()).await?;
        writer.write_all(payload).await?;
        writer.flush().await?;
        Ok(())
    }

    pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, FrameError> {
        let mut len_buf = [0u8; 4];
        reader.read_exact(&mut len_buf).await?;
        let len = u32::from_le_bytes(len_buf);
        if len > MAX_FRAME_BYTES {
            return Err(FrameError::TooLarge(len));
        }
        let mut payload = vec![0u8; len as usize];
        reader.read_exact(&mut payload).await?;
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_describe_request_through_sync_framing() {
        let request = Request::Describe {
            program: Program::default(),
            limits: ResourceLimits { step_budget: 1000, heap_ceiling: 1000 },
        };
        let encoded = encode_request(&request).unwrap();
        let mut buf = Vec::new();
        write_frame_sync(&mut buf, &encoded).unwrap();

        let mut cursor = io::Cursor::new(buf);
        let frame = read_frame_sync(&mut cursor).unwrap();
        let decoded = decode_request(&frame).unwrap();
        assert!(matches!(decoded, Request::Describe { .. }));
    }

    #[test]
    fn rejects_a_frame_larger_than_the_limit() {
        let huge = vec![0u8; (MAX_FRAME_BYTES + 1) as usize];
        let mut buf = Vec::new();
        assert!(write_frame_sync(&mut buf, &huge).is_err());
    }

    #[test]
    fn serializes_an_error_response() {
        let response = Response::Error("step budget exceeded".to_string());
        let encoded = encode_response(&response).unwrap();
        let decoded = decode_response(&encoded).unwrap();
        assert!(matches!(decoded, Response::Error(msg) if msg == "step budget exceeded"));
    }
}
