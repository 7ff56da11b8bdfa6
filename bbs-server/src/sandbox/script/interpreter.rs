//! # Interpreter
//!
//! Tree-walking evaluator over the [`super::ast::Program`]. Two resource
//! limits stand in for what a real isolate would enforce with OS
//! facilities (§4.7e, recorded as a documented simplification in
//! `DESIGN.md`): a step-budget counter as a CPU surrogate (incremented on
//! every statement and expression evaluated, erroring out once exhausted)
//! and a heap-node-count ceiling as a memory surrogate (incremented on
//! every `ScriptValue` allocated via a list/map literal or construction,
//! erroring out once exhausted). Both run entirely inside `sandbox-runtime`
//! - wall-clock enforcement (the `tokio::time::timeout` around the whole
//! child process) lives on the host side in `remote::remote_app`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use super::ast::{BinOp, Expr, Program, Stmt, UnOp};

/// The runtime value type the interpreter operates on. A superset of
/// `crate::domain::value::Value`: scripts can hold function values, which
/// have no business ever reaching `Store` - `ScriptValue::into_domain`
/// is the one-way door that strips them out. Purely an interpreter-internal
/// type - nothing here crosses the pipe to `sandbox-runtime` directly, only
/// the `Program` AST and plain `crate::domain::Value` payloads do.
#[derive(Clone)]
pub enum ScriptValue {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    List(Vec<ScriptValue>),
    Map(HashMap<String, ScriptValue>),
    Function(Rc<FunctionValue>),
    /// A host-implemented function identified by a qualified name
    /// (`"console.log"`, `"JSON.stringify"`, `"util.deepEqual"`, ...).
    /// Dispatch is by name, not by AST shape, so a script can alias a
    /// native function to any variable (`let log = console.log;`) and it
    /// keeps working - there is exactly one kind of callable value.
    Native(String),
}

impl fmt::Debug for ScriptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptValue::Null => write!(f, "null"),
            ScriptValue::Bool(b) => write!(f, "{b}"),
            ScriptValue::Number(n) => write!(f, "{n}"),
            ScriptValue::Str(s) => write!(f, "{s:?}"),
            ScriptValue::List(items) => write!(f, "{items:?}"),
            ScriptValue::Map(map) => write!(f, "{map:?}"),
            ScriptValue::Function(_) => write!(f, "<function>"),
            ScriptValue::Native(name) => write!(f, "<native {name}>"),
        }
    }
}

pub struct FunctionValue {
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
    pub closure: Env,
}

impl ScriptValue {
    pub fn truthy(&self) -> bool {
        match self {
            ScriptValue::Null => false,
            ScriptValue::Bool(b) => *b,
            ScriptValue::Number(n) => *n != 0.0,
            ScriptValue::Str(s) => !s.is_empty(),
            ScriptValue::List(items) => !items.is_empty(),
            ScriptValue::Map(map) => !map.is_empty(),
            ScriptValue::Function(_) | ScriptValue::Native(_) => true,
        }
    }

    /// Strips function values on the way out of the sandbox. Any function
    /// that survives becomes `null` rather than leaking a closure into
    /// `crate::domain::value::Value`, which has no callable variant.
    pub fn into_domain(self) -> crate::domain::Value {
        match self {
            ScriptValue::Null => crate::domain::Value::Null,
            ScriptValue::Bool(b) => crate::domain::Value::Bool(b),
            ScriptValue::Number(n) => crate::domain::Value::Number(n),
            ScriptValue::Str(s) => crate::domain::Value::String(s),
            ScriptValue::List(items) => {
                crate::domain::Value::List(items.into_iter().map(ScriptValue::into_domain).collect())
            }
            ScriptValue::Map(map) => {
                crate::domain::Value::Map(map.into_iter().map(|(k, v)| (k, v.into_domain())).collect())
            }
            ScriptValue::Function(_) | ScriptValue::Native(_) => crate::domain::Value::Null,
        }
    }

    pub fn from_domain(value: crate::domain::Value) -> Self {
        match value {
            crate::domain::Value::Null => ScriptValue::Null,
            crate::domain::Value::Bool(b) => ScriptValue::Bool(b),
            crate::domain::Value::Number(n) => ScriptValue::Number(n),
            crate::domain::Value::String(s) => ScriptValue::Str(s),
            crate::domain::Value::List(items) => {
                ScriptValue::List(items.into_iter().map(ScriptValue::from_domain).collect())
            }
            crate::domain::Value::Map(map) => {
                ScriptValue::Map(map.into_iter().map(|(k, v)| (k, ScriptValue::from_domain(v))).collect())
            }
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            ScriptValue::Null => "null",
            ScriptValue::Bool(_) => "bool",
            ScriptValue::Number(_) => "number",
            ScriptValue::Str(_) => "string",
            ScriptValue::List(_) => "list",
            ScriptValue::Map(_) => "map",
            ScriptValue::Function(_) => "function",
            ScriptValue::Native(_) => "function",
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum RunError {
    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),
    #[error("'{0}' is not a function")]
    NotCallable(String),
    #[error("type error: {0}")]
    TypeError(String),
    #[error("step budget of {0} exceeded")]
    StepBudgetExceeded(usize),
    #[error("heap node ceiling of {0} exceeded")]
    HeapCeilingExceeded(usize),
    #[error("call stack depth exceeded")]
    StackOverflow,
    #[error("field '{0}' not found")]
    NoSuchField(String),
    #[error("wrong number of arguments: expected {expected}, got {got}")]
    ArityMismatch { expected: usize, got: usize },
}

/// A lexical scope. Cloning an `Env` clones the `Rc`, not the bindings -
/// this is how closures capture their defining scope in `FunctionLit`.
#[derive(Clone)]
pub struct Env(Rc<RefCell<EnvInner>>);

struct EnvInner {
    vars: HashMap<String, ScriptValue>,
    parent: Option<Env>,
}

impl Env {
    fn root() -> Self {
        Env(Rc::new(RefCell::new(EnvInner { vars: HashMap::new(), parent: None })))
    }

    fn child(parent: &Env) -> Self {
        Env(Rc::new(RefCell::new(EnvInner { vars: HashMap::new(), parent: Some(parent.clone()) })))
    }

    pub(crate) fn define(&self, name: &str, value: ScriptValue) {
        self.0.borrow_mut().vars.insert(name.to_string(), value);
    }

    fn get(&self, name: &str) -> Option<ScriptValue> {
        let inner = self.0.borrow();
        if let Some(v) = inner.vars.get(name) {
            return Some(v.clone());
        }
        inner.parent.as_ref().and_then(|p| p.get(name))
    }

    /// Assigns to the nearest enclosing binding of `name`, mirroring the
    /// grammar's `Stmt::Assign` (no implicit global creation on assign -
    /// `let` is the only binding form).
    fn assign(&self, name: &str, value: ScriptValue) -> bool {
        let mut inner = self.0.borrow_mut();
        if inner.vars.contains_key(name) {
            inner.vars.insert(name.to_string(), value);
            return true;
        }
        match &inner.parent {
            Some(p) => p.assign(name, value),
            None => false,
        }
    }
}

enum Flow {
    Normal,
    Return(ScriptValue),
}

/// One interpreter instance per `sandbox-runtime` invocation - resource
/// counters are per-call, not per-process, matching the "spawned fresh per
/// call" isolation model (§4.7e).
pub struct Interpreter {
    globals: Env,
    steps_remaining: usize,
    step_budget: usize,
    heap_nodes: usize,
    heap_ceiling: usize,
    call_depth: usize,
    active_timeouts: usize,
    timeout_seq: f64,
    /// Services the `storage`/`user_storage`/`namespaced_storage`/
    /// `current_user` globals (§4.8) when set - `sandbox-runtime` wires
    /// this to a synchronous pipe round-trip to the host; `None` (the
    /// `Describe` probe, which never calls into the script) makes every
    /// capability native error instead of hanging.
    capability_host: Option<Box<dyn FnMut(&str, &[ScriptValue]) -> Result<ScriptValue, RunError>>>,
}

const MAX_CALL_DEPTH: usize = 256;
const MAX_CONCURRENT_TIMEOUTS: usize = 10;
const MIN_TIMEOUT_MS: f64 = 100.0;
const MAX_TIMEOUT_MS: f64 = 30_000.0;

impl Interpreter {
    pub fn new(step_budget: usize, heap_ceiling: usize) -> Self {
        let globals = Env::root();
        super::super::stdlib::install_globals(&globals);
        Self {
            globals,
            steps_remaining: step_budget,
            step_budget,
            heap_nodes: 0,
            heap_ceiling,
            call_depth: 0,
            active_timeouts: 0,
            timeout_seq: 0.0,
            capability_host: None,
        }
    }

    /// Attaches the capability-call callback (§4.8); only `sandbox-runtime`
    /// constructs one, since only it has a pipe back to the host.
    pub fn with_capability_host(mut self, host: Box<dyn FnMut(&str, &[ScriptValue]) -> Result<ScriptValue, RunError>>) -> Self {
        self.capability_host = Some(host);
        self
    }

    /// Runs every top-level statement, then looks up the `app` binding the
    /// calling convention requires every script to produce (§4.7e). The
    /// returned map is the raw `getWelcomeScreen`/`handleCommand`/etc.
    /// bundle; callers in `remote::remote_app` invoke individual fields.
    pub fn load(&mut self, program: &Program) -> Result<HashMap<String, ScriptValue>, RunError> {
        let scope = Env::child(&self.globals);
        for stmt in &program.statements {
            match self.exec_stmt(stmt, &scope)? {
                Flow::Normal => {}
                Flow::Return(_) => break,
            }
        }
        match scope.get("app").or_else(|| self.globals.get("app")) {
            Some(ScriptValue::Map(map)) => Ok(map),
            Some(other) => Err(RunError::TypeError(format!("'app' must be a map, got {}", other.type_name()))),
            None => Err(RunError::UndefinedVariable("app".to_string())),
        }
    }

    pub fn call_function(&mut self, func: &ScriptValue, args: Vec<ScriptValue>) -> Result<ScriptValue, RunError> {
        let f = match func {
            ScriptValue::Function(f) => f,
            ScriptValue::Native(name) if super::super::stdlib::is_capability_native(name) => {
                return match self.capability_host.as_mut() {
                    Some(host) => host(name, &args),
                    None => Err(RunError::TypeError(format!("'{name}' is unavailable in this context"))),
                };
            }
            ScriptValue::Native(name) => return super::super::stdlib::call_native(name, &args),
            other => return Err(RunError::NotCallable(format!("{other:?}"))),
        };
        if f.params.len() != args.len() {
            return Err(RunError::ArityMismatch { expected: f.params.len(), got: args.len() });
        }
        self.call_depth += 1;
        if self.call_depth > MAX_CALL_DEPTH {
            self.call_depth -= 1;
            return Err(RunError::StackOverflow);
        }
        let scope = Env::child(&f.closure);
        for (param, arg) in f.params.iter().zip(args) {
            scope.define(param, arg);
        }
        let result = (|| {
            for stmt in &f.body {
                match self.exec_stmt(stmt, &scope)? {
                    Flow::Normal => {}
                    Flow::Return(v) => return Ok(v),
                }
            }
            Ok(ScriptValue::Null)
        })();
        self.call_depth -= 1;
        result
    }

    fn tick(&mut self) -> Result<(), RunError> {
        if self.steps_remaining == 0 {
            return Err(RunError::StepBudgetExceeded(self.step_budget));
        }
        self.steps_remaining -= 1;
        Ok(())
    }

    fn account_heap(&mut self, nodes: usize) -> Result<(), RunError> {
        self.heap_nodes += nodes;
        if self.heap_nodes > self.heap_ceiling {
            return Err(RunError::HeapCeilingExceeded(self.heap_ceiling));
        }
        Ok(())
    }

    fn exec_block(&mut self, stmts: &[Stmt], scope: &Env) -> Result<Flow, RunError> {
        for stmt in stmts {
            match self.exec_stmt(stmt, scope)? {
                Flow::Normal => {}
                flow @ Flow::Return(_) => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, scope: &Env) -> Result<Flow, RunError> {
        self.tick()?;
        match stmt {
            Stmt::Let { name, value } => {
                let v = self.eval(value, scope)?;
                scope.define(name, v);
                Ok(Flow::Normal)
            }
            Stmt::Assign { name, value } => {
                let v = self.eval(value, scope)?;
                if !scope.assign(name, v) {
                    return Err(RunError::UndefinedVariable(name.clone()));
                }
                Ok(Flow::Normal)
            }
            Stmt::ExprStmt(expr) => {
                self.eval(expr, scope)?;
                Ok(Flow::Normal)
            }
            Stmt::If { cond, then_branch, else_branch } => {
                if self.eval(cond, scope)?.truthy() {
                    self.exec_block(then_branch, &Env::child(scope))
                } else if let Some(else_branch) = else_branch {
                    self.exec_block(else_branch, &Env::child(scope))
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::Return(expr) => {
                let v = match expr {
                    Some(e) => self.eval(e, scope)?,
                    None => ScriptValue::Null,
                };
                Ok(Flow::Return(v))
            }
            Stmt::FunctionDecl { name, params, body } => {
                self.account_heap(1)?;
                let func = ScriptValue::Function(Rc::new(FunctionValue {
                    params: params.clone(),
                    body: body.clone(),
                    closure: scope.clone(),
                }));
                scope.define(name, func);
                Ok(Flow::Normal)
            }
        }
    }

    fn eval(&mut self, expr: &Expr, scope: &Env) -> Result<ScriptValue, RunError> {
        self.tick()?;
        match expr {
            Expr::Null => Ok(ScriptValue::Null),
            Expr::Bool(b) => Ok(ScriptValue::Bool(*b)),
            Expr::Number(n) => Ok(ScriptValue::Number(*n)),
            Expr::Str(s) => Ok(ScriptValue::Str(s.clone())),
            Expr::Ident(name) => {
                scope.get(name).ok_or_else(|| RunError::UndefinedVariable(name.clone()))
            }
            Expr::List(items) => {
                self.account_heap(items.len())?;
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item, scope)?);
                }
                Ok(ScriptValue::List(values))
            }
            Expr::Map(fields) => {
                self.account_heap(fields.len())?;
                let mut map = HashMap::with_capacity(fields.len());
                for (key, value_expr) in fields {
                    map.insert(key.clone(), self.eval(value_expr, scope)?);
                }
                Ok(ScriptValue::Map(map))
            }
            Expr::FunctionLit { params, body } => {
                self.account_heap(1)?;
                Ok(ScriptValue::Function(Rc::new(FunctionValue {
                    params: params.clone(),
                    body: body.clone(),
                    closure: scope.clone(),
                })))
            }
            Expr::Unary { op, expr } => {
                let v = self.eval(expr, scope)?;
                match (op, &v) {
                    (UnOp::Neg, ScriptValue::Number(n)) => Ok(ScriptValue::Number(-n)),
                    (UnOp::Not, _) => Ok(ScriptValue::Bool(!v.truthy())),
                    (UnOp::Neg, _) => Err(RunError::TypeError(format!("cannot negate {}", v.type_name()))),
                }
            }
            Expr::Binary { op, left, right } => self.eval_binary(*op, left, right, scope),
            Expr::Field { target, name } => {
                let target = self.eval(target, scope)?;
                match target {
                    ScriptValue::Map(map) => {
                        Ok(map.get(name).cloned().unwrap_or(ScriptValue::Null))
                    }
                    other => Err(RunError::TypeError(format!("cannot read field '{name}' of {}", other.type_name()))),
                }
            }
            Expr::Index { target, index } => {
                let target = self.eval(target, scope)?;
                let index = self.eval(index, scope)?;
                match (target, index) {
                    (ScriptValue::List(items), ScriptValue::Number(n)) => {
                        let i = n as usize;
                        Ok(items.get(i).cloned().unwrap_or(ScriptValue::Null))
                    }
                    (ScriptValue::Map(map), ScriptValue::Str(key)) => {
                        Ok(map.get(&key).cloned().unwrap_or(ScriptValue::Null))
                    }
                    (other, _) => Err(RunError::TypeError(format!("cannot index into {}", other.type_name()))),
                }
            }
            Expr::Call { callee, args } => {
                if let Expr::Ident(name) = callee.as_ref() {
                    if name == "setTimeout" {
                        return self.eval_set_timeout(args, scope);
                    }
                }
                let mut arg_values = Vec::with_capacity(args.len());
                for arg in args {
                    arg_values.push(self.eval(arg, scope)?);
                }
                let callee_value = self.eval(callee, scope)?;
                self.call_function(&callee_value, arg_values)
            }
        }
    }

    fn eval_binary(&mut self, op: BinOp, left: &Expr, right: &Expr, scope: &Env) -> Result<ScriptValue, RunError> {
        if matches!(op, BinOp::And) {
            let l = self.eval(left, scope)?;
            return if !l.truthy() { Ok(l) } else { self.eval(right, scope) };
        }
        if matches!(op, BinOp::Or) {
            let l = self.eval(left, scope)?;
            return if l.truthy() { Ok(l) } else { self.eval(right, scope) };
        }

        let l = self.eval(left, scope)?;
        let r = self.eval(right, scope)?;
        match op {
            BinOp::Add => match (&l, &r) {
                (ScriptValue::Number(a), ScriptValue::Number(b)) => Ok(ScriptValue::Number(a + b)),
                (ScriptValue::Str(a), ScriptValue::Str(b)) => Ok(ScriptValue::Str(format!("{a}{b}"))),
                (ScriptValue::Str(a), b) => Ok(ScriptValue::Str(format!("{a}{}", display(b)))),
                (a, ScriptValue::Str(b)) => Ok(ScriptValue::Str(format!("{}{b}", display(a)))),
                _ => Err(RunError::TypeError(format!("cannot add {} and {}", l.type_name(), r.type_name()))),
            },
            BinOp::Sub => numeric(&l, &r, |a, b| a - b),
            BinOp::Mul => numeric(&l, &r, |a, b| a * b),
            BinOp::Div => numeric(&l, &r, |a, b| a / b),
            BinOp::Mod => numeric(&l, &r, |a, b| a % b),
            BinOp::Eq => Ok(ScriptValue::Bool(values_equal(&l, &r))),
            BinOp::NotEq => Ok(ScriptValue::Bool(!values_equal(&l, &r))),
            BinOp::Lt => compare(&l, &r, |o| o.is_lt()),
            BinOp::Lte => compare(&l, &r, |o| o.is_le()),
            BinOp::Gt => compare(&l, &r, |o| o.is_gt()),
            BinOp::Gte => compare(&l, &r, |o| o.is_ge()),
            BinOp::And | BinOp::Or => unreachable!("handled above with short-circuiting"),
        }
    }

    /// `setTimeout(callback, delayMs)` (§4.7e). There is no event loop in
    /// a one-shot child process, so delay is validated against the
    /// documented bounds but the callback runs inline before
    /// `setTimeout` returns, rather than truly deferred - recorded as a
    /// simplification, not a silent behavior change, in `DESIGN.md`.
    fn eval_set_timeout(&mut self, args: &[Expr], scope: &Env) -> Result<ScriptValue, RunError> {
        if args.len() != 2 {
            return Err(RunError::ArityMismatch { expected: 2, got: args.len() });
        }
        let callback = self.eval(&args[0], scope)?;
        let delay = self.eval(&args[1], scope)?;
        let ScriptValue::Number(delay_ms) = delay else {
            return Err(RunError::TypeError("setTimeout delay must be a number".to_string()));
        };
        if !(MIN_TIMEOUT_MS..=MAX_TIMEOUT_MS).contains(&delay_ms) {
            return Err(RunError::TypeError(format!(
                "setTimeout delay {delay_ms}ms outside allowed range [{MIN_TIMEOUT_MS}, {MAX_TIMEOUT_MS}]"
            )));
        }
        if self.active_timeouts >= MAX_CONCURRENT_TIMEOUTS {
            return Err(RunError::TypeError(format!(
                "more than {MAX_CONCURRENT_TIMEOUTS} concurrent setTimeout calls"
            )));
        }
        self.active_timeouts += 1;
        let result = self.call_function(&callback, vec![]);
        self.active_timeouts -= 1;
        result?;
        self.timeout_seq += 1.0;
        Ok(ScriptValue::Number(self.timeout_seq))
    }
}

fn numeric(l: &ScriptValue, r: &ScriptValue, f: impl Fn(f64, f64) -> f64) -> Result<ScriptValue, RunError> {
    match (l, r) {
        (ScriptValue::Number(a), ScriptValue::Number(b)) => Ok(ScriptValue::Number(f(*a, *b))),
        _ => Err(RunError::TypeError(format!("expected two numbers, got {} and {}", l.type_name(), r.type_name()))),
    }
}

fn compare(l: &ScriptValue, r: &ScriptValue, f: impl Fn(std::cmp::Ordering) -> bool) -> Result<ScriptValue, RunError> {
    match (l, r) {
        (ScriptValue::Number(a), ScriptValue::Number(b)) => {
            Ok(ScriptValue::Bool(a.partial_cmp(b).map(f).unwrap_or(false)))
        }
        (ScriptValue::Str(a), ScriptValue::Str(b)) => Ok(ScriptValue::Bool(f(a.cmp(b)))),
        _ => Err(RunError::TypeError(format!("cannot compare {} and {}", l.type_name(), r.type_name()))),
    }
}

fn values_equal(l: &ScriptValue, r: &ScriptValue) -> bool {
    match (l, r) {
        (ScriptValue::Null, ScriptValue::Null) => true,
        (ScriptValue::Bool(a), ScriptValue::Bool(b)) => a == b,
        (ScriptValue::Number(a), ScriptValue::Number(b)) => a == b,
        (ScriptValue::Str(a), ScriptValue::Str(b)) => a == b,
        (ScriptValue::List(a), ScriptValue::List(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        (ScriptValue::Map(a), ScriptValue::Map(b)) => {
            a.len() == b.len() && a.iter().all(|(k, v)| b.get(k).is_some_and(|bv| values_equal(v, bv)))
        }
        _ => false,
    }
}

fn display(value: &ScriptValue) -> String {
    match value {
        ScriptValue::Null => "null".to_string(),
        ScriptValue::Bool(b) => b.to_string(),
        ScriptValue::Number(n) => n.to_string(),
        ScriptValue::Str(s) => s.clone(),
        ScriptValue::List(_) | ScriptValue::Map(_) | ScriptValue::Function(_) => {
            format!("{value:?}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::script::compile;

    fn run(source: &str) -> HashMap<String, ScriptValue> {
        let program = compile(source).unwrap();
        let mut interp = Interpreter::new(100_000, 10_000);
        interp.load(&program).unwrap()
    }

    #[test]
    fn evaluates_arithmetic_with_precedence() {
        let program = compile("let app = { id: \"x\", result: 1 + 2 * 3 };").unwrap();
        let mut interp = Interpreter::new(1_000, 1_000);
        let app = interp.load(&program).unwrap();
        assert!(matches!(app.get("result"), Some(ScriptValue::Number(n)) if *n == 7.0));
    }

    #[test]
    fn calls_a_user_defined_function_inside_handle_command() {
        let app = run(
            r#"
            function shout(s) { return s; }
            let app = {
                id: "demo",
                handleCommand: function(screenId, command, session) { return shout(command); }
            };
            "#,
        );
        let ScriptValue::Function(_) = app.get("handleCommand").unwrap() else {
            panic!("expected a function");
        };
    }

    #[test]
    fn invoking_handle_command_returns_the_echoed_argument() {
        let program = compile(
            r#"
            let app = {
                id: "demo",
                handleCommand: function(screenId, command, session) { return command; }
            };
            "#,
        )
        .unwrap();
        let mut interp = Interpreter::new(10_000, 10_000);
        let app = interp.load(&program).unwrap();
        let handler = app.get("handleCommand").unwrap().clone();
        let result = interp
            .call_function(&handler, vec![ScriptValue::Null, ScriptValue::Str("hi".into()), ScriptValue::Null])
            .unwrap();
        assert!(matches!(result, ScriptValue::Str(s) if s == "hi"));
    }

    #[test]
    fn exhausting_the_step_budget_errors_out() {
        let program = compile("let app = { id: \"x\" }; let a = 1; let b = 2; let c = 3;").unwrap();
        let mut interp = Interpreter::new(2, 10_000);
        assert!(matches!(interp.load(&program), Err(RunError::StepBudgetExceeded(_))));
    }

    #[test]
    fn exhausting_the_heap_ceiling_errors_out() {
        let program = compile("let app = { a: [1, 2, 3, 4, 5] };").unwrap();
        let mut interp = Interpreter::new(10_000, 2);
        assert!(matches!(interp.load(&program), Err(RunError::HeapCeilingExceeded(_))));
    }

    #[test]
    fn closures_capture_their_defining_scope() {
        let program = compile(
            r#"
            function makeAdder(n) {
                return function(x) { return x + n; };
            }
            let add5 = makeAdder(5);
            let app = { id: "x", value: add5(10) };
            "#,
        )
        .unwrap();
        let mut interp = Interpreter::new(10_000, 10_000);
        let app = interp.load(&program).unwrap();
        assert!(matches!(app.get("value"), Some(ScriptValue::Number(n)) if *n == 15.0));
    }

    #[test]
    fn missing_app_binding_is_an_error() {
        let program = compile("let x = 1;").unwrap();
        let mut interp = Interpreter::new(10_000, 10_000);
        assert!(matches!(interp.load(&program), Err(RunError::UndefinedVariable(ref v)) if v == "app"));
    }
}
