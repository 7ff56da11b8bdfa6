//! # Stdlib
//!
//! Host-implemented globals and allow-listed `require` modules injected
//! into every interpreter instance (§4.7e): `console` (structured logging,
//! app-id-prefixed at the point the caller installs globals is not known
//! here - prefixing happens in `remote::remote_app` against the returned
//! log lines, keeping this module free of per-call state), `JSON.parse`/
//! `stringify`, two small `require`-able modules (`util`, `date`), and the
//! `storage`/`user_storage`/`namespaced_storage`/`current_user` capability
//! globals (§4.8). The capability globals are the one family of natives
//! this module only names - [`is_capability_native`] flags them so
//! `Interpreter::call_function` routes them to the capability-host
//! callback instead of [`call_native`], since answering them needs a pipe
//! round-trip to the host that a free function here has no access to.
//! There is no general `require` - anything not in [`ALLOWED_MODULES`] is
//! rejected before a script ever runs, in `static_analysis`; this module
//! is simply where the allowed ones are implemented.

use std::collections::HashMap;

use super::script::interpreter::{Env, RunError, ScriptValue};

pub const ALLOWED_MODULES: &[&str] = &["util", "date"];

/// Native names routed to the capability-host callback (§4.8) rather than
/// [`call_native`] - see [`Interpreter::call_function`](super::script::interpreter::Interpreter::call_function).
pub const CAPABILITY_NATIVES: &[&str] = &[
    "storage.get",
    "storage.set",
    "storage.delete",
    "user_storage.get",
    "user_storage.set",
    "user_storage.delete",
    "namespaced_storage.get",
    "namespaced_storage.set",
    "namespaced_storage.delete",
    "current_user",
];

pub fn is_capability_native(name: &str) -> bool {
    CAPABILITY_NATIVES.contains(&name)
}

pub fn install_globals(env: &Env) {
    let mut console = HashMap::new();
    console.insert("log".to_string(), ScriptValue::Native("console.log".to_string()));
    console.insert("warn".to_string(), ScriptValue::Native("console.warn".to_string()));
    console.insert("error".to_string(), ScriptValue::Native("console.error".to_string()));
    env.define("console", ScriptValue::Map(console));

    let mut json = HashMap::new();
    json.insert("parse".to_string(), ScriptValue::Native("JSON.parse".to_string()));
    json.insert("stringify".to_string(), ScriptValue::Native("JSON.stringify".to_string()));
    env.define("JSON", ScriptValue::Map(json));

    env.define("require", ScriptValue::Native("require".to_string()));

    let mut storage = HashMap::new();
    storage.insert("get".to_string(), ScriptValue::Native("storage.get".to_string()));
    storage.insert("set".to_string(), ScriptValue::Native("storage.set".to_string()));
    storage.insert("delete".to_string(), ScriptValue::Native("storage.delete".to_string()));
    env.define("storage", ScriptValue::Map(storage));

    let mut user_storage = HashMap::new();
    user_storage.insert("get".to_string(), ScriptValue::Native("user_storage.get".to_string()));
    user_storage.insert("set".to_string(), ScriptValue::Native("user_storage.set".to_string()));
    user_storage.insert("delete".to_string(), ScriptValue::Native("user_storage.delete".to_string()));
    env.define("user_storage", ScriptValue::Map(user_storage));

    let mut namespaced_storage = HashMap::new();
    namespaced_storage.insert("get".to_string(), ScriptValue::Native("namespaced_storage.get".to_string()));
    namespaced_storage.insert("set".to_string(), ScriptValue::Native("namespaced_storage.set".to_string()));
    namespaced_storage.insert("delete".to_string(), ScriptValue::Native("namespaced_storage.delete".to_string()));
    env.define("namespaced_storage", ScriptValue::Map(namespaced_storage));

    env.define("current_user", ScriptValue::Native("current_user".to_string()));
}

pub fn call_native(name: &str, args: &[ScriptValue]) -> Result<ScriptValue, RunError> {
    match name {
        "console.log" | "console.warn" | "console.error" => {
            let line = args.iter().map(render).collect::<Vec<_>>().join(" ");
            let level = name.rsplit('.').next().unwrap_or("log");
            match level {
                "warn" => tracing::warn!(target: "sandbox.console", "{line}"),
                "error" => tracing::error!(target: "sandbox.console", "{line}"),
                _ => tracing::info!(target: "sandbox.console", "{line}"),
            }
            Ok(ScriptValue::Null)
        }
        "JSON.stringify" => {
            let value = args.first().cloned().unwrap_or(ScriptValue::Null);
            let json: serde_json::Value = value.into_domain().into();
            serde_json::to_string(&json)
                .map(ScriptValue::Str)
                .map_err(|e| RunError::TypeError(format!("JSON.stringify failed: {e}")))
        }
        "JSON.parse" => {
            let Some(ScriptValue::Str(text)) = args.first() else {
                return Err(RunError::TypeError("JSON.parse expects a string argument".to_string()));
            };
            let json: serde_json::Value = serde_json::from_str(text)
                .map_err(|e| RunError::TypeError(format!("JSON.parse failed: {e}")))?;
            Ok(ScriptValue::from_domain(crate::domain::Value::from(json)))
        }
        "require" => require(args),
        "util.deepEqual" => {
            let (a, b) = two_args(args)?;
            Ok(ScriptValue::Bool(deep_equal(a, b)))
        }
        "util.pick" => {
            let Some(ScriptValue::Map(map)) = args.first() else {
                return Err(RunError::TypeError("util.pick expects a map as the first argument".to_string()));
            };
            let Some(ScriptValue::List(keys)) = args.get(1) else {
                return Err(RunError::TypeError("util.pick expects a list of keys as the second argument".to_string()));
            };
            let mut picked = HashMap::new();
            for key in keys {
                if let ScriptValue::Str(k) = key {
                    if let Some(v) = map.get(k) {
                        picked.insert(k.clone(), v.clone());
                    }
                }
            }
            Ok(ScriptValue::Map(picked))
        }
        "util.merge" => {
            let Some(ScriptValue::Map(a)) = args.first() else {
                return Err(RunError::TypeError("util.merge expects two maps".to_string()));
            };
            let Some(ScriptValue::Map(b)) = args.get(1) else {
                return Err(RunError::TypeError("util.merge expects two maps".to_string()));
            };
            let mut merged = a.clone();
            for (k, v) in b {
                merged.insert(k.clone(), v.clone());
            }
            Ok(ScriptValue::Map(merged))
        }
        "util.get" => {
            let Some(ScriptValue::Map(map)) = args.first() else {
                return Err(RunError::TypeError("util.get expects a map as the first argument".to_string()));
            };
            let Some(ScriptValue::Str(path)) = args.get(1) else {
                return Err(RunError::TypeError("util.get expects a dotted path string".to_string()));
            };
            Ok(get_path(map, path))
        }
        "date.format" => {
            let Some(ScriptValue::Number(epoch_ms)) = args.first() else {
                return Err(RunError::TypeError("date.format expects an epoch-millisecond number".to_string()));
            };
            Ok(ScriptValue::Str(format_epoch_ms(*epoch_ms)))
        }
        "date.relativeTime" => {
            let (a, b) = two_args(args)?;
            let (ScriptValue::Number(from), ScriptValue::Number(to)) = (a, b) else {
                return Err(RunError::TypeError("date.relativeTime expects two epoch-millisecond numbers".to_string()));
            };
            Ok(ScriptValue::Str(relative_time(*from, *to)))
        }
        other => Err(RunError::NotCallable(format!("unknown native function '{other}'"))),
    }
}

fn two_args(args: &[ScriptValue]) -> Result<(&ScriptValue, &ScriptValue), RunError> {
    match (args.first(), args.get(1)) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(RunError::ArityMismatch { expected: 2, got: args.len() }),
    }
}

/// `require(moduleName)` - returns a map of native function handles for
/// one of [`ALLOWED_MODULES`], or errors for anything else.
fn require(args: &[ScriptValue]) -> Result<ScriptValue, RunError> {
    let Some(ScriptValue::Str(module)) = args.first() else {
        return Err(RunError::TypeError("require expects a module name string".to_string()));
    };
    match module.as_str() {
        "util" => {
            let mut m = HashMap::new();
            m.insert("deepEqual".to_string(), ScriptValue::Native("util.deepEqual".to_string()));
            m.insert("pick".to_string(), ScriptValue::Native("util.pick".to_string()));
            m.insert("merge".to_string(), ScriptValue::Native("util.merge".to_string()));
            m.insert("get".to_string(), ScriptValue::Native("util.get".to_string()));
            Ok(ScriptValue::Map(m))
        }
        "date" => {
            let mut m = HashMap::new();
            m.insert("format".to_string(), ScriptValue::Native("date.format".to_string()));
            m.insert("relativeTime".to_string(), ScriptValue::Native("date.relativeTime".to_string()));
            Ok(ScriptValue::Map(m))
        }
        other => Err(RunError::TypeError(format!("module '{other}' is not in the require allow-list"))),
    }
}

fn deep_equal(a: &ScriptValue, b: &ScriptValue) -> bool {
    match (a, b) {
        (ScriptValue::Null, ScriptValue::Null) => true,
        (ScriptValue::Bool(x), ScriptValue::Bool(y)) => x == y,
        (ScriptValue::Number(x), ScriptValue::Number(y)) => x == y,
        (ScriptValue::Str(x), ScriptValue::Str(y)) => x == y,
        (ScriptValue::List(x), ScriptValue::List(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(xi, yi)| deep_equal(xi, yi))
        }
        (ScriptValue::Map(x), ScriptValue::Map(y)) => {
            x.len() == y.len() && x.iter().all(|(k, v)| y.get(k).is_some_and(|yv| deep_equal(v, yv)))
        }
        _ => false,
    }
}

fn get_path(map: &HashMap<String, ScriptValue>, path: &str) -> ScriptValue {
    let mut current = ScriptValue::Map(map.clone());
    for segment in path.split('.') {
        current = match current {
            ScriptValue::Map(m) => m.get(segment).cloned().unwrap_or(ScriptValue::Null),
            _ => return ScriptValue::Null,
        };
    }
    current
}

fn render(value: &ScriptValue) -> String {
    match value {
        ScriptValue::Null => "null".to_string(),
        ScriptValue::Bool(b) => b.to_string(),
        ScriptValue::Number(n) => n.to_string(),
        ScriptValue::Str(s) => s.clone(),
        ScriptValue::List(_) | ScriptValue::Map(_) => {
            let json: serde_json::Value = value.clone().into_domain().into();
            json.to_string()
        }
        ScriptValue::Function(_) => "<function>".to_string(),
        ScriptValue::Native(name) => format!("<native {name}>"),
    }
}

fn format_epoch_ms(epoch_ms: f64) -> String {
    use chrono::{TimeZone, Utc};
    Utc.timestamp_millis_opt(epoch_ms as i64)
        .single()
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| "invalid-date".to_string())
}

fn relative_time(from_ms: f64, to_ms: f64) -> String {
    let delta_secs = (to_ms - from_ms) / 1000.0;
    let abs = delta_secs.abs();
    let unit = if abs < 60.0 {
        format!("{} seconds", abs as i64)
    } else if abs < 3600.0 {
        format!("{} minutes", (abs / 60.0) as i64)
    } else if abs < 86_400.0 {
        format!("{} hours", (abs / 3600.0) as i64)
    } else {
        format!("{} days", (abs / 86_400.0) as i64)
    };
    if delta_secs >= 0.0 {
        format!("in {unit}")
    } else {
        format!("{unit} ago")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_roundtrips_through_stringify_and_parse() {
        let mut map = HashMap::new();
        map.insert("a".to_string(), ScriptValue::Number(1.0));
        let value = ScriptValue::Map(map);
        let json = call_native("JSON.stringify", &[value]).unwrap();
        let ScriptValue::Str(text) = json else { panic!("expected a string") };
        let parsed = call_native("JSON.parse", &[ScriptValue::Str(text)]).unwrap();
        assert!(matches!(parsed, ScriptValue::Map(_)));
    }

    #[test]
    fn require_rejects_modules_outside_the_allow_list() {
        let result = require(&[ScriptValue::Str("fs".to_string())]);
        assert!(result.is_err());
    }

    #[test]
    fn require_util_exposes_deep_equal() {
        let module = require(&[ScriptValue::Str("util".to_string())]).unwrap();
        let ScriptValue::Map(m) = module else { panic!("expected a map") };
        assert!(matches!(m.get("deepEqual"), Some(ScriptValue::Native(_))));
    }

    #[test]
    fn deep_equal_compares_nested_structures() {
        let a = ScriptValue::List(vec![ScriptValue::Number(1.0), ScriptValue::Str("x".into())]);
        let b = ScriptValue::List(vec![ScriptValue::Number(1.0), ScriptValue::Str("x".into())]);
        assert!(deep_equal(&a, &b));
    }

    #[test]
    fn util_get_walks_a_dotted_path() {
        let mut inner = HashMap::new();
        inner.insert("b".to_string(), ScriptValue::Number(42.0));
        let mut outer = HashMap::new();
        outer.insert("a".to_string(), ScriptValue::Map(inner));
        let result = get_path(&outer, "a.b");
        assert!(matches!(result, ScriptValue::Number(n) if n == 42.0));
    }

    #[test]
    fn recognizes_capability_natives_and_nothing_else() {
        assert!(is_capability_native("storage.get"));
        assert!(is_capability_native("current_user"));
        assert!(!is_capability_native("console.log"));
    }

    #[test]
    fn relative_time_formats_past_and_future() {
        assert_eq!(relative_time(0.0, 5000.0), "in 5 seconds");
        assert_eq!(relative_time(5000.0, 0.0), "5 seconds ago");
    }
}
