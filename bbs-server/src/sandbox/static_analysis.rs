//! # Static Analysis
//!
//! Admission checks that run before a remote app's source is ever handed
//! to the interpreter (§4.7c/d, pipeline step (d)): cheap structural scans
//! over raw text, a handful of regex red flags, and an AST walk over the
//! already-parsed `Program` for limits the grammar itself doesn't enforce
//! (max params, max nesting depth, max function count, the `require`
//! allow-list). None of these are a substitute for the interpreter's
//! step-budget/heap-ceiling enforcement at call time - they reject what
//! can be rejected without running anything.

use regex::Regex;
use std::sync::OnceLock;

use super::script::ast::{Expr, Program, Stmt};
use super::stdlib::ALLOWED_MODULES;

pub const MAX_SOURCE_LINES: usize = 10_000;
pub const MAX_BRACE_NESTING: usize = 1_000;
pub const MAX_PARAMS: usize = 20;
pub const MAX_AST_NESTING: usize = 20;
pub const MAX_FUNCTION_DECLS: usize = 200;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum AnalysisViolation {
    #[error("source exceeds {MAX_SOURCE_LINES} lines")]
    SourceTooLarge,
    #[error("brace nesting exceeds {MAX_BRACE_NESTING}")]
    ExcessiveBraceNesting,
    #[error("unbalanced brackets in source")]
    UnbalancedBrackets,
    #[error("source matches a disallowed pattern: {0}")]
    SuspiciousPattern(String),
    #[error("source mentions dangerous method: {0}")]
    DangerousMethod(String),
    #[error("function '{0}' declares more than {MAX_PARAMS} parameters")]
    TooManyParams(String),
    #[error("expression nesting exceeds {MAX_AST_NESTING}")]
    ExcessiveAstNesting,
    #[error("program declares more than {MAX_FUNCTION_DECLS} functions")]
    TooManyFunctions,
    #[error("require('{0}') is not in the allow-list")]
    DisallowedModule(String),
    #[error("reference to forbidden identifier '{0}'")]
    ForbiddenIdentifier(String),
}

/// Identifiers that must never appear as free variables in a remote
/// script - there is no binding for any of these among the injected
/// globals (`sandbox::stdlib::install_globals`), so a reference to one can
/// only be an attempt to reach something the grammar otherwise can't name.
const FORBIDDEN_IDENTIFIERS: &[&str] = &["eval", "Function", "process", "global", "globalThis", "__proto__", "constructor", "import"];

/// Named builtins the `§8` scenario 5 rejection message must name
/// explicitly ("dangerous method: eval"), kept apart from the generic
/// [`suspicious_patterns`] so the rejection reason says which builtin was
/// the problem rather than just echoing the matched text.
fn dangerous_method_patterns() -> &'static [(Regex, &'static str)] {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [(r"\beval\s*\(", "eval"), (r"\bnew\s+Function\b", "Function")]
            .iter()
            .map(|(p, name)| (Regex::new(p).expect("static pattern is valid"), *name))
            .collect()
    })
}

fn suspicious_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [r"\bwith\s*\(", r"__proto__", r"\bprocess\s*\."]
            .iter()
            .map(|p| Regex::new(p).expect("static pattern is valid"))
            .collect()
    })
}

/// Step one: scans over the raw source text, before anything is parsed.
pub fn scan_source(source: &str) -> Result<(), AnalysisViolation> {
    if source.lines().count() > MAX_SOURCE_LINES {
        return Err(AnalysisViolation::SourceTooLarge);
    }

    let mut depth: i64 = 0;
    let mut max_depth: i64 = 0;
    let mut paren_balance: i64 = 0;
    let mut bracket_balance: i64 = 0;
    for c in source.chars() {
        match c {
            '{' => {
                depth += 1;
                max_depth = max_depth.max(depth);
            }
            '}' => depth -= 1,
            '(' => paren_balance += 1,
            ')' => paren_balance -= 1,
            '[' => bracket_balance += 1,
            ']' => bracket_balance -= 1,
            _ => {}
        }
        if paren_balance < 0 || bracket_balance < 0 || depth < 0 {
            return Err(AnalysisViolation::UnbalancedBrackets);
        }
    }
    if depth != 0 || paren_balance != 0 || bracket_balance != 0 {
        return Err(AnalysisViolation::UnbalancedBrackets);
    }
    if max_depth as usize > MAX_BRACE_NESTING {
        return Err(AnalysisViolation::ExcessiveBraceNesting);
    }

    for (pattern, name) in dangerous_method_patterns() {
        if pattern.is_match(source) {
            return Err(AnalysisViolation::DangerousMethod(name.to_string()));
        }
    }

    for pattern in suspicious_patterns() {
        if let Some(m) = pattern.find(source) {
            return Err(AnalysisViolation::SuspiciousPattern(m.as_str().to_string()));
        }
    }

    Ok(())
}

/// Step two: walks the already-parsed AST for limits that only make sense
/// once the program has structure (params per function, nesting depth,
/// function count, forbidden identifiers, `require` targets).
pub fn analyze_program(program: &Program) -> Result<(), AnalysisViolation> {
    let mut function_count = 0usize;
    for stmt in &program.statements {
        walk_stmt(stmt, 0, &mut function_count)?;
    }
    if function_count > MAX_FUNCTION_DECLS {
        return Err(AnalysisViolation::TooManyFunctions);
    }
    Ok(())
}

fn walk_stmt(stmt: &Stmt, depth: usize, function_count: &mut usize) -> Result<(), AnalysisViolation> {
    if depth > MAX_AST_NESTING {
        return Err(AnalysisViolation::ExcessiveAstNesting);
    }
    match stmt {
        Stmt::Let { value, .. } | Stmt::Assign { value, .. } => walk_expr(value, depth, function_count),
        Stmt::ExprStmt(expr) => walk_expr(expr, depth, function_count),
        Stmt::If { cond, then_branch, else_branch } => {
            walk_expr(cond, depth, function_count)?;
            for s in then_branch {
                walk_stmt(s, depth + 1, function_count)?;
            }
            if let Some(else_branch) = else_branch {
                for s in else_branch {
                    walk_stmt(s, depth + 1, function_count)?;
                }
            }
            Ok(())
        }
        Stmt::Return(Some(expr)) => walk_expr(expr, depth, function_count),
        Stmt::Return(None) => Ok(()),
        Stmt::FunctionDecl { name, params, body } => {
            *function_count += 1;
            if params.len() > MAX_PARAMS {
                return Err(AnalysisViolation::TooManyParams(name.clone()));
            }
            for s in body {
                walk_stmt(s, depth + 1, function_count)?;
            }
            Ok(())
        }
    }
}

fn walk_expr(expr: &Expr, depth: usize, function_count: &mut usize) -> Result<(), AnalysisViolation> {
    if depth > MAX_AST_NESTING {
        return Err(AnalysisViolation::ExcessiveAstNesting);
    }
    match expr {
        Expr::Ident(name) => {
            if FORBIDDEN_IDENTIFIERS.contains(&name.as_str()) {
                return Err(AnalysisViolation::ForbiddenIdentifier(name.clone()));
            }
            Ok(())
        }
        Expr::Null | Expr::Bool(_) | Expr::Number(_) | Expr::Str(_) => Ok(()),
        Expr::List(items) => items.iter().try_for_each(|i| walk_expr(i, depth + 1, function_count)),
        Expr::Map(fields) => fields.iter().try_for_each(|(_, v)| walk_expr(v, depth + 1, function_count)),
        Expr::Unary { expr, .. } => walk_expr(expr, depth + 1, function_count),
        Expr::Binary { left, right, .. } => {
            walk_expr(left, depth + 1, function_count)?;
            walk_expr(right, depth + 1, function_count)
        }
        Expr::Field { target, .. } => walk_expr(target, depth + 1, function_count),
        Expr::Index { target, index } => {
            walk_expr(target, depth + 1, function_count)?;
            walk_expr(index, depth + 1, function_count)
        }
        Expr::Call { callee, args } => {
            check_require_call(callee, args)?;
            walk_expr(callee, depth + 1, function_count)?;
            args.iter().try_for_each(|a| walk_expr(a, depth + 1, function_count))
        }
        Expr::FunctionLit { params, body } => {
            *function_count += 1;
            if params.len() > MAX_PARAMS {
                return Err(AnalysisViolation::TooManyParams("<anonymous>".to_string()));
            }
            for s in body {
                walk_stmt(s, depth + 1, function_count)?;
            }
            Ok(())
        }
    }
}

/// Statically rejects `require("x")` for any `x` outside the allow-list,
/// when the argument is a literal string - the common case, and the only
/// one worth catching before runtime (a dynamically computed module name
/// still gets caught by `stdlib::require`'s own check at call time).
fn check_require_call(callee: &Expr, args: &[Expr]) -> Result<(), AnalysisViolation> {
    if let Expr::Ident(name) = callee {
        if name == "require" {
            if let Some(Expr::Str(module)) = args.first() {
                if !ALLOWED_MODULES.contains(&module.as_str()) {
                    return Err(AnalysisViolation::DisallowedModule(module.clone()));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::script::compile;

    #[test]
    fn accepts_a_well_formed_source() {
        let source = r#"
            let app = {
                id: "demo",
                handleCommand: function(screenId, command, session) { return command; }
            };
        "#;
        assert!(scan_source(source).is_ok());
        let program = compile(source).unwrap();
        assert!(analyze_program(&program).is_ok());
    }

    #[test]
    fn rejects_eval_in_source_text() {
        let source = "let x = eval(\"1 + 1\");";
        let err = scan_source(source).unwrap_err();
        assert_eq!(err, AnalysisViolation::DangerousMethod("eval".to_string()));
        assert!(err.to_string().contains("dangerous method: eval"));
    }

    #[test]
    fn rejects_unbalanced_braces() {
        assert_eq!(scan_source("function f() { return 1;"), Err(AnalysisViolation::UnbalancedBrackets));
    }

    #[test]
    fn rejects_forbidden_identifiers_in_the_ast() {
        let program = compile("let app = { x: process };").unwrap();
        assert_eq!(analyze_program(&program), Err(AnalysisViolation::ForbiddenIdentifier("process".to_string())));
    }

    #[test]
    fn rejects_require_of_a_disallowed_module() {
        let program = compile("let fs = require(\"fs\");").unwrap();
        assert_eq!(analyze_program(&program), Err(AnalysisViolation::DisallowedModule("fs".to_string())));
    }

    #[test]
    fn allows_require_of_an_allow_listed_module() {
        let program = compile("let util = require(\"util\");").unwrap();
        assert!(analyze_program(&program).is_ok());
    }

    #[test]
    fn rejects_functions_with_too_many_params() {
        let params = (0..MAX_PARAMS + 1).map(|i| format!("p{i}")).collect::<Vec<_>>().join(", ");
        let source = format!("function f({params}) {{ return 1; }}");
        let program = compile(&source).unwrap();
        assert!(matches!(analyze_program(&program), Err(AnalysisViolation::TooManyParams(_))));
    }
}
