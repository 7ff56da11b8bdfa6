//! # sandbox-runtime
//!
//! The child-process half of the isolate (§4.7e, §9's "child process with
//! a pipe" isolation option). Spawned fresh by `remote::remote_app::spawn_and_run`
//! for every single call into a remote app - there is no persistent state
//! here across invocations, which is also why the wall-clock timeout lives
//! on the host side rather than in here: a hung child is simply killed.
//!
//! Reads exactly one length-prefixed JSON [`bbs_server::sandbox::protocol::Request`]
//! from stdin, loads the program into a fresh [`Interpreter`], dispatches
//! on the request kind, and writes exactly one final framed
//! [`bbs_server::sandbox::protocol::Response`] to stdout before exiting.
//! In between, a script that touches `storage`/`user_storage`/
//! `namespaced_storage`/`current_user` (§4.8) sends zero or more
//! `Response::Capability`/`Request::CapabilityResume` pairs over the same
//! pipe first - see `sandbox::protocol`'s module doc. Any interpreter
//! error (step budget, heap ceiling, type error, ...) becomes
//! `Response::Error` rather than a non-zero exit code - the host side
//! treats both identically (§7's "errors at the boundary between app and
//! host are never rethrown").

use std::collections::HashMap;
use std::io::{self, Read, Write};

use bbs_server::domain::{SessionView, UserProfile, Value};
use bbs_server::sandbox::protocol::{
    self, CapabilityCall, CapabilityResult, CommandResultWire, DescribeResult, LifecycleHook, Request, Response,
};
use bbs_server::sandbox::script::{Interpreter, RunError, ScriptValue};

fn main() {
    if let Err(e) = run() {
        tracing::error!(error = %e, "sandbox-runtime fatal error");
        std::process::exit(1);
    }
}

fn run() -> io::Result<()> {
    let stdin = io::stdin();
    let mut lock = stdin.lock();
    let payload = protocol::read_frame_sync(&mut lock).map_err(io::Error::other)?;
    let request = protocol::decode_request(&payload).map_err(io::Error::other)?;

    let response = dispatch(request);

    let encoded = protocol::encode_response(&response).map_err(io::Error::other)?;
    let stdout = io::stdout();
    let mut lock = stdout.lock();
    protocol::write_frame_sync(&mut lock, &encoded).map_err(io::Error::other)?;
    lock.flush()
}

fn dispatch(request: Request) -> Response {
    match request {
        Request::Describe { program, limits } => {
            let mut interpreter = Interpreter::new(limits.step_budget, limits.heap_ceiling);
            match interpreter.load(&program) {
                Ok(app) => describe(&app).unwrap_or_else(Response::Error),
                Err(e) => Response::Error(e.to_string()),
            }
        }
        Request::WelcomeScreen { program, limits } => {
            let mut interpreter = with_capability_host(Interpreter::new(limits.step_budget, limits.heap_ceiling));
            run_text_call(&mut interpreter, &program, "getWelcomeScreen", vec![])
                .map(Response::WelcomeScreen)
                .unwrap_or_else(Response::Error)
        }
        Request::HandleCommand { program, limits, screen_id, command, session } => {
            let mut interpreter = with_capability_host(Interpreter::new(limits.step_budget, limits.heap_ceiling));
            handle_command(&mut interpreter, &program, screen_id, command, session)
        }
        Request::Help { program, limits, screen_id } => {
            let mut interpreter = with_capability_host(Interpreter::new(limits.step_budget, limits.heap_ceiling));
            let arg = screen_id.map(ScriptValue::Str).unwrap_or(ScriptValue::Null);
            run_text_call(&mut interpreter, &program, "getHelp", vec![arg])
                .map(Response::Help)
                .unwrap_or_else(Response::Error)
        }
        Request::Lifecycle { program, limits, hook, session } => {
            let mut interpreter = with_capability_host(Interpreter::new(limits.step_budget, limits.heap_ceiling));
            run_lifecycle(&mut interpreter, &program, hook, session)
        }
        Request::CapabilityResume { .. } => {
            Response::Error("received a capability resume frame outside of a pending capability call".to_string())
        }
    }
}

fn with_capability_host(interpreter: Interpreter) -> Interpreter {
    interpreter.with_capability_host(Box::new(capability_host))
}

/// Routes a `storage.*`/`user_storage.*`/`namespaced_storage.*`/
/// `current_user` native call out to the host and back (§4.8), blocking
/// this single-threaded process on the pipe for the duration.
fn capability_host(name: &str, args: &[ScriptValue]) -> Result<ScriptValue, RunError> {
    let call = build_capability_call(name, args).map_err(RunError::TypeError)?;
    let result = exchange_capability(call).map_err(RunError::TypeError)?;
    capability_result_to_script_value(result).map_err(RunError::TypeError)
}

fn exchange_capability(call: CapabilityCall) -> Result<CapabilityResult, String> {
    let response = Response::Capability(call);
    let encoded = protocol::encode_response(&response).map_err(|e| e.to_string())?;
    {
        let stdout = io::stdout();
        let mut lock = stdout.lock();
        protocol::write_frame_sync(&mut lock, &encoded).map_err(|e| e.to_string())?;
    }
    let stdin = io::stdin();
    let mut lock = stdin.lock();
    let payload = protocol::read_frame_sync(&mut lock).map_err(|e| e.to_string())?;
    match protocol::decode_request(&payload).map_err(|e| e.to_string())? {
        Request::CapabilityResume { result } => Ok(result),
        other => Err(format!("expected a capability resume frame, got {other:?}")),
    }
}

fn str_arg(name: &str, args: &[ScriptValue], i: usize) -> Result<String, String> {
    match args.get(i) {
        Some(ScriptValue::Str(s)) => Ok(s.clone()),
        _ => Err(format!("{name} expects a string argument at position {i}")),
    }
}

fn value_arg(name: &str, args: &[ScriptValue], i: usize) -> Result<Value, String> {
    args.get(i).cloned().map(ScriptValue::into_domain).ok_or_else(|| format!("{name} expects a value argument at position {i}"))
}

fn ttl_arg(args: &[ScriptValue], i: usize) -> Option<i64> {
    match args.get(i) {
        Some(ScriptValue::Number(n)) => Some(*n as i64),
        _ => None,
    }
}

fn build_capability_call(name: &str, args: &[ScriptValue]) -> Result<CapabilityCall, String> {
    match name {
        "storage.get" => Ok(CapabilityCall::StorageGet { key: str_arg(name, args, 0)? }),
        "storage.set" => Ok(CapabilityCall::StorageSet {
            key: str_arg(name, args, 0)?,
            value: value_arg(name, args, 1)?,
            ttl_secs: ttl_arg(args, 2),
        }),
        "storage.delete" => Ok(CapabilityCall::StorageDelete { key: str_arg(name, args, 0)? }),
        "user_storage.get" => Ok(CapabilityCall::UserStorageGet { key: str_arg(name, args, 0)? }),
        "user_storage.set" => Ok(CapabilityCall::UserStorageSet {
            key: str_arg(name, args, 0)?,
            value: value_arg(name, args, 1)?,
            ttl_secs: ttl_arg(args, 2),
        }),
        "user_storage.delete" => Ok(CapabilityCall::UserStorageDelete { key: str_arg(name, args, 0)? }),
        "namespaced_storage.get" => {
            Ok(CapabilityCall::NamespacedStorageGet { namespace: str_arg(name, args, 0)?, key: str_arg(name, args, 1)? })
        }
        "namespaced_storage.set" => Ok(CapabilityCall::NamespacedStorageSet {
            namespace: str_arg(name, args, 0)?,
            key: str_arg(name, args, 1)?,
            value: value_arg(name, args, 2)?,
            ttl_secs: ttl_arg(args, 3),
        }),
        "namespaced_storage.delete" => {
            Ok(CapabilityCall::NamespacedStorageDelete { namespace: str_arg(name, args, 0)?, key: str_arg(name, args, 1)? })
        }
        "current_user" => Ok(CapabilityCall::CurrentUser),
        other => Err(format!("'{other}' is not a capability call")),
    }
}

fn capability_result_to_script_value(result: CapabilityResult) -> Result<ScriptValue, String> {
    match result {
        CapabilityResult::Value(Some(v)) => Ok(ScriptValue::from_domain(v)),
        CapabilityResult::Value(None) => Ok(ScriptValue::Null),
        CapabilityResult::Deleted(b) => Ok(ScriptValue::Bool(b)),
        CapabilityResult::Done => Ok(ScriptValue::Null),
        CapabilityResult::User(Some(profile)) => Ok(user_profile_to_script_value(profile)),
        CapabilityResult::User(None) => Ok(ScriptValue::Null),
        CapabilityResult::Failed(reason) => Err(reason),
    }
}

fn user_profile_to_script_value(profile: UserProfile) -> ScriptValue {
    let mut map = HashMap::new();
    map.insert("id".to_string(), ScriptValue::Str(profile.id.to_string()));
    map.insert("username".to_string(), ScriptValue::Str(profile.username));
    map.insert("displayName".to_string(), ScriptValue::Str(profile.display_name));
    map.insert("role".to_string(), ScriptValue::Str(profile.role.as_str().to_string()));
    map.insert("joinDate".to_string(), ScriptValue::Str(profile.join_date.to_rfc3339()));
    ScriptValue::Map(map)
}

/// Runs `onInit`/`onUserEnter`/`onUserExit` if the app declares it;
/// silently does nothing otherwise (§4.4's lifecycle hooks are optional).
/// Errors are logged, not surfaced - a broken lifecycle hook must not
/// block install or session entry/exit.
fn run_lifecycle(
    interpreter: &mut Interpreter,
    program: &bbs_server::sandbox::script::Program,
    hook: LifecycleHook,
    session: Option<SessionView>,
) -> Response {
    let app = match interpreter.load(program) {
        Ok(app) => app,
        Err(e) => return Response::Error(e.to_string()),
    };

    let (fn_name, args) = match hook {
        LifecycleHook::OnInit => ("onInit", vec![]),
        LifecycleHook::OnUserEnter { user_id } => {
            ("onUserEnter", vec![ScriptValue::Str(user_id), session.map(session_to_script_value).unwrap_or(ScriptValue::Null)])
        }
        LifecycleHook::OnUserExit { user_id } => {
            ("onUserExit", vec![ScriptValue::Str(user_id), session.map(session_to_script_value).unwrap_or(ScriptValue::Null)])
        }
    };

    let Some(func) = app.get(fn_name).cloned() else {
        return Response::LifecycleDone;
    };
    if let Err(e) = interpreter.call_function(&func, args) {
        tracing::warn!(hook = fn_name, error = %e, "remote app lifecycle hook raised an error");
    }
    Response::LifecycleDone
}

fn extract_str(app: &HashMap<String, ScriptValue>, key: &str) -> Result<String, String> {
    match app.get(key) {
        Some(ScriptValue::Str(s)) => Ok(s.clone()),
        Some(_) => Err(format!("'{key}' must be a string")),
        None => Err(format!("app is missing required field '{key}'")),
    }
}

fn has_callable(app: &HashMap<String, ScriptValue>, key: &str) -> bool {
    matches!(app.get(key), Some(ScriptValue::Function(_)) | Some(ScriptValue::Native(_)))
}

/// The admission probe (§4.7g "Extraction"): pulls the metadata fields
/// and which optional lifecycle hooks the app declares, without invoking
/// any of the callables yet.
fn describe(app: &HashMap<String, ScriptValue>) -> Result<Response, String> {
    let id = extract_str(app, "id")?;
    let name = extract_str(app, "name")?;
    let version = extract_str(app, "version")?;
    let description = extract_str(app, "description")?;
    let author = extract_str(app, "author")?;

    if !has_callable(app, "getWelcomeScreen") {
        return Err("app is missing getWelcomeScreen".to_string());
    }
    if !has_callable(app, "handleCommand") {
        return Err("app is missing handleCommand".to_string());
    }
    if !has_callable(app, "getHelp") {
        return Err("app is missing getHelp".to_string());
    }

    Ok(Response::Describe(DescribeResult {
        id,
        name,
        version,
        description,
        author,
        has_on_init: has_callable(app, "onInit"),
        has_on_user_enter: has_callable(app, "onUserEnter"),
        has_on_user_exit: has_callable(app, "onUserExit"),
    }))
}

fn run_text_call(
    interpreter: &mut Interpreter,
    program: &bbs_server::sandbox::script::Program,
    fn_name: &str,
    args: Vec<ScriptValue>,
) -> Result<String, String> {
    let app = interpreter.load(program).map_err(|e: RunError| e.to_string())?;
    let func = app.get(fn_name).cloned().ok_or_else(|| format!("app is missing '{fn_name}'"))?;
    let result = interpreter.call_function(&func, args).map_err(|e| e.to_string())?;
    match result {
        ScriptValue::Str(s) => Ok(s),
        other => Ok(render_as_text(&other)),
    }
}

/// Coerces a non-string return value to text rather than failing the
/// call outright - a script author returning a number or boolean from
/// `getHelp`/`getWelcomeScreen` gets the literal's text form, not a
/// rejected call, matching the permissive "coerce at the boundary" spirit
/// of §4.7h's sanitation step.
fn render_as_text(value: &ScriptValue) -> String {
    match value {
        ScriptValue::Null => String::new(),
        ScriptValue::Bool(b) => b.to_string(),
        ScriptValue::Number(n) => n.to_string(),
        ScriptValue::Str(s) => s.clone(),
        _ => String::new(),
    }
}

fn session_to_script_value(session: SessionView) -> ScriptValue {
    let mut map = HashMap::new();
    map.insert("key".to_string(), ScriptValue::Str(session.key));
    map.insert(
        "userId".to_string(),
        session.user_id.map(|id| ScriptValue::Str(id.to_string())).unwrap_or(ScriptValue::Null),
    );
    map.insert("username".to_string(), session.username.map(ScriptValue::Str).unwrap_or(ScriptValue::Null));
    map.insert(
        "role".to_string(),
        session.role.map(|r| ScriptValue::Str(r.as_str().to_string())).unwrap_or(ScriptValue::Null),
    );
    map.insert("currentArea".to_string(), ScriptValue::Str(session.current_area));
    map.insert(
        "commandHistory".to_string(),
        ScriptValue::List(session.command_history.into_iter().map(ScriptValue::Str).collect()),
    );
    ScriptValue::Map(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bbs_server::sandbox::script::compile;

    #[test]
    fn builds_storage_get_call_from_a_string_argument() {
        let call = build_capability_call("storage.get", &[ScriptValue::Str("score".to_string())]).unwrap();
        assert!(matches!(call, CapabilityCall::StorageGet { key } if key == "score"));
    }

    #[test]
    fn builds_storage_set_call_with_an_optional_ttl() {
        let args = [ScriptValue::Str("score".to_string()), ScriptValue::Number(7.0), ScriptValue::Number(3600.0)];
        let call = build_capability_call("storage.set", &args).unwrap();
        assert!(matches!(call, CapabilityCall::StorageSet { key, ttl_secs: Some(3600), .. } if key == "score"));
    }

    #[test]
    fn current_user_takes_no_arguments() {
        let call = build_capability_call("current_user", &[]).unwrap();
        assert!(matches!(call, CapabilityCall::CurrentUser));
    }

    #[test]
    fn rejects_a_name_outside_the_capability_set() {
        assert!(build_capability_call("fs.readFile", &[]).is_err());
    }

    #[test]
    fn converts_capability_results_to_script_values() {
        assert!(matches!(capability_result_to_script_value(CapabilityResult::Done), Ok(ScriptValue::Null)));
        assert!(matches!(capability_result_to_script_value(CapabilityResult::Deleted(true)), Ok(ScriptValue::Bool(true))));
        assert!(matches!(capability_result_to_script_value(CapabilityResult::Value(None)), Ok(ScriptValue::Null)));
        assert!(capability_result_to_script_value(CapabilityResult::Failed("nope".to_string())).is_err());
    }

    #[test]
    fn run_lifecycle_is_a_no_op_when_the_hook_is_not_declared() {
        let program = compile(r#"let app = { id: "x" };"#).unwrap();
        let mut interpreter = Interpreter::new(1_000, 1_000);
        let response = run_lifecycle(&mut interpreter, &program, LifecycleHook::OnInit, None);
        assert!(matches!(response, Response::LifecycleDone));
    }

    #[test]
    fn describe_reports_which_lifecycle_hooks_are_declared() {
        let program = compile(
            r#"
            let app = {
                id: "demo",
                name: "Demo",
                version: "1.0.0",
                description: "d",
                author: "a",
                getWelcomeScreen: function() { return "hi"; },
                handleCommand: function(screenId, command, session) { return { response: "ok" }; },
                getHelp: function(screenId) { return "help"; },
                onUserEnter: function(userId, session) { return null; }
            };
            "#,
        )
        .unwrap();
        let mut interpreter = Interpreter::new(10_000, 10_000);
        let app = interpreter.load(&program).unwrap();
        let Response::Describe(result) = describe(&app).unwrap() else { panic!("expected Describe") };
        assert!(!result.has_on_init);
        assert!(result.has_on_user_enter);
        assert!(!result.has_on_user_exit);
    }
}

fn handle_command(
    interpreter: &mut Interpreter,
    program: &bbs_server::sandbox::script::Program,
    screen_id: Option<String>,
    command: String,
    session: SessionView,
) -> Response {
    let app = match interpreter.load(program) {
        Ok(app) => app,
        Err(e) => return Response::Error(e.to_string()),
    };
    let Some(func) = app.get("handleCommand").cloned() else {
        return Response::Error("app is missing 'handleCommand'".to_string());
    };

    let args = vec![
        screen_id.map(ScriptValue::Str).unwrap_or(ScriptValue::Null),
        ScriptValue::Str(command),
        session_to_script_value(session),
    ];

    let result = match interpreter.call_function(&func, args) {
        Ok(v) => v,
        Err(e) => return Response::Error(e.to_string()),
    };

    match sanitize_command_result(result) {
        Ok(wire) => Response::HandleCommand(wire),
        Err(e) => Response::Error(e),
    }
}

/// Pulls `{response, screen, refresh}` out of whatever the script
/// returned, applying the same defaulting §4.7h describes for the host
/// side: `refresh` defaults to `true` if absent or not a boolean,
/// `screen` collapses to `None` unless it's a non-empty string (the
/// empty-string normalization from the Open Questions happens here, at
/// the earliest point a `""` could appear).
fn sanitize_command_result(value: ScriptValue) -> Result<CommandResultWire, String> {
    let ScriptValue::Map(mut map) = value else {
        return Err("handleCommand must return a map".to_string());
    };

    let response = match map.remove("response") {
        Some(ScriptValue::Str(s)) => s,
        Some(other) => render_as_text(&other),
        None => return Err("handleCommand result is missing 'response'".to_string()),
    };

    let screen = match map.remove("screen") {
        Some(ScriptValue::Str(s)) if !s.is_empty() => Some(s),
        _ => None,
    };

    let refresh = match map.remove("refresh") {
        Some(ScriptValue::Bool(b)) => b,
        _ => true,
    };

    Ok(CommandResultWire { response, screen, refresh })
}
