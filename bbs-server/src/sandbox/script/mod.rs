//! # Script
//!
//! The restricted scripting language remote apps are authored in:
//! [`ast`] defines the parse tree, [`lexer`] and [`parser`] turn source
//! text into it, and [`interpreter`] walks it. Everything downstream of
//! `parser::parse` only ever sees the `Program` AST - by the time a
//! remote app reaches `sandbox-runtime`, there is no source text left to
//! reinterpret.

pub mod ast;
pub mod interpreter;
pub mod lexer;
pub mod parser;

pub use ast::Program;
pub use interpreter::{Interpreter, RunError, ScriptValue};
pub use lexer::{tokenize, LexError};
pub use parser::{parse, ParseError};

/// Lexes and parses `source` in one step - the only path `RemoteLoader`
/// and `sandbox-runtime`'s boot-time load both go through (§4.7e "load").
pub fn compile(source: &str) -> Result<Program, CompileError> {
    let tokens = tokenize(source)?;
    let program = parse(&tokens)?;
    Ok(program)
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum CompileError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_a_minimal_app_script() {
        let source = r#"
            let app = {
                id: "demo",
                name: "Demo",
                version: "1.0.0",
                description: "a demo app",
                author: "tester",
                getWelcomeScreen: function() { return "Welcome!"; },
                handleCommand: function(screenId, command, session) {
                    return { response: command, screen: null, refresh: true };
                },
                getHelp: function(screenId) { return "Type anything."; }
            };
        "#;
        assert!(compile(source).is_ok());
    }

    #[test]
    fn reports_a_lex_error_as_a_compile_error() {
        assert!(compile("let x = \"unterminated").is_err());
    }
}
