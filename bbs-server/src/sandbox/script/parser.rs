//! # Parser
//!
//! Recursive-descent parser from the lexer's [`Token`] stream to the
//! [`Program`] AST. Grammar is intentionally small (§4.7d/e): `let`
//! bindings, assignment, `if`/`else`, `return`, function declarations and
//! function expressions, and a standard precedence-climbing expression
//! grammar over literals, identifiers, field/index access, and calls.
//! There is no statement or expression form that can construct a callable
//! from anything other than the `function` keyword - the parser is itself
//! part of the sandbox's enforcement surface, not just its front end.

use super::ast::{BinOp, Expr, Program, Stmt, UnOp};
use super::lexer::Token;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ParseError {
    #[error("unexpected token {0:?} at position {1}")]
    UnexpectedToken(Token, usize),
    #[error("unexpected end of input")]
    UnexpectedEof,
}

pub fn parse(tokens: &[Token]) -> Result<Program, ParseError> {
    let mut parser = Parser { tokens, pos: 0 };
    let mut statements = Vec::new();
    while !parser.at_eof() {
        statements.push(parser.statement()?);
    }
    Ok(Program { statements })
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn at_eof(&self) -> bool {
        matches!(self.peek(), Token::Eof)
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens.get(self.pos).cloned().unwrap_or(Token::Eof);
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, expected: &Token) -> Result<(), ParseError> {
        if self.peek() == expected {
            self.advance();
            Ok(())
        } else {
            Err(ParseError::UnexpectedToken(self.peek().clone(), self.pos))
        }
    }

    fn expect_ident(&mut self) -> Result<String, ParseError> {
        match self.advance() {
            Token::Ident(name) => Ok(name),
            other => Err(ParseError::UnexpectedToken(other, self.pos)),
        }
    }

    // ---- statements ----

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        match self.peek() {
            Token::Let => self.let_stmt(),
            Token::If => self.if_stmt(),
            Token::Return => self.return_stmt(),
            Token::Function => self.function_decl(),
            _ => self.expr_or_assign_stmt(),
        }
    }

    fn block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect(&Token::LBrace)?;
        let mut statements = Vec::new();
        while self.peek() != &Token::RBrace {
            if self.at_eof() {
                return Err(ParseError::UnexpectedEof);
            }
            statements.push(self.statement()?);
        }
        self.expect(&Token::RBrace)?;
        Ok(statements)
    }

    fn let_stmt(&mut self) -> Result<Stmt, ParseError> {
        self.expect(&Token::Let)?;
        let name = self.expect_ident()?;
        self.expect(&Token::Eq)?;
        let value = self.expression()?;
        self.expect(&Token::Semicolon)?;
        Ok(Stmt::Let { name, value })
    }

    fn if_stmt(&mut self) -> Result<Stmt, ParseError> {
        self.expect(&Token::If)?;
        self.expect(&Token::LParen)?;
        let cond = self.expression()?;
        self.expect(&Token::RParen)?;
        let then_branch = self.block()?;
        let else_branch = if self.peek() == &Token::Else {
            self.advance();
            Some(self.block()?)
        } else {
            None
        };
        Ok(Stmt::If { cond, then_branch, else_branch })
    }

    fn return_stmt(&mut self) -> Result<Stmt, ParseError> {
        self.expect(&Token::Return)?;
        if self.peek() == &Token::Semicolon {
            self.advance();
            return Ok(Stmt::Return(None));
        }
        let value = self.expression()?;
        self.expect(&Token::Semicolon)?;
        Ok(Stmt::Return(Some(value)))
    }

    fn function_decl(&mut self) -> Result<Stmt, ParseError> {
        self.expect(&Token::Function)?;
        let name = self.expect_ident()?;
        let params = self.param_list()?;
        let body = self.block()?;
        Ok(Stmt::FunctionDecl { name, params, body })
    }

    fn param_list(&mut self) -> Result<Vec<String>, ParseError> {
        self.expect(&Token::LParen)?;
        let mut params = Vec::new();
        if self.peek() != &Token::RParen {
            params.push(self.expect_ident()?);
            while self.peek() == &Token::Comma {
                self.advance();
                params.push(self.expect_ident()?);
            }
        }
        self.expect(&Token::RParen)?;
        Ok(params)
    }

    fn expr_or_assign_stmt(&mut self) -> Result<Stmt, ParseError> {
        // Lookahead: `IDENT =` is an assignment; anything else parses as
        // a bare expression statement (e.g. a call for side effects).
        if let Token::Ident(name) = self.peek().clone() {
            if self.tokens.get(self.pos + 1) == Some(&Token::Eq) {
                self.advance();
                self.advance();
                let value = self.expression()?;
                self.expect(&Token::Semicolon)?;
                return Ok(Stmt::Assign { name, value });
            }
        }
        let expr = self.expression()?;
        self.expect(&Token::Semicolon)?;
        Ok(Stmt::ExprStmt(expr))
    }

    // ---- expressions, precedence-climbing ----

    fn expression(&mut self) -> Result<Expr, ParseError> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.and_expr()?;
        while self.peek() == &Token::OrOr {
            self.advance();
            let right = self.and_expr()?;
            left = Expr::Binary { op: BinOp::Or, left: Box::new(left), right: Box::new(right) };
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.equality_expr()?;
        while self.peek() == &Token::AndAnd {
            self.advance();
            let right = self.equality_expr()?;
            left = Expr::Binary { op: BinOp::And, left: Box::new(left), right: Box::new(right) };
        }
        Ok(left)
    }

    fn equality_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.comparison_expr()?;
        loop {
            let op = match self.peek() {
                Token::EqEq => BinOp::Eq,
                Token::NotEq => BinOp::NotEq,
                _ => break,
            };
            self.advance();
            let right = self.comparison_expr()?;
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right) };
        }
        Ok(left)
    }

    fn comparison_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.additive_expr()?;
        loop {
            let op = match self.peek() {
                Token::Lt => BinOp::Lt,
                Token::Lte => BinOp::Lte,
                Token::Gt => BinOp::Gt,
                Token::Gte => BinOp::Gte,
                _ => break,
            };
            self.advance();
            let right = self.additive_expr()?;
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right) };
        }
        Ok(left)
    }

    fn additive_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.multiplicative_expr()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.multiplicative_expr()?;
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right) };
        }
        Ok(left)
    }

    fn multiplicative_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.unary_expr()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                Token::Percent => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.unary_expr()?;
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right) };
        }
        Ok(left)
    }

    fn unary_expr(&mut self) -> Result<Expr, ParseError> {
        match self.peek() {
            Token::Minus => {
                self.advance();
                let expr = self.unary_expr()?;
                Ok(Expr::Unary { op: UnOp::Neg, expr: Box::new(expr) })
            }
            Token::Bang => {
                self.advance();
                let expr = self.unary_expr()?;
                Ok(Expr::Unary { op: UnOp::Not, expr: Box::new(expr) })
            }
            _ => self.postfix_expr(),
        }
    }

    fn postfix_expr(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary_expr()?;
        loop {
            match self.peek() {
                Token::Dot => {
                    self.advance();
                    let name = self.expect_ident()?;
                    expr = Expr::Field { target: Box::new(expr), name };
                }
                Token::LBracket => {
                    self.advance();
                    let index = self.expression()?;
                    self.expect(&Token::RBracket)?;
                    expr = Expr::Index { target: Box::new(expr), index: Box::new(index) };
                }
                Token::LParen => {
                    self.advance();
                    let mut args = Vec::new();
                    if self.peek() != &Token::RParen {
                        args.push(self.expression()?);
                        while self.peek() == &Token::Comma {
                            self.advance();
                            args.push(self.expression()?);
                        }
                    }
                    self.expect(&Token::RParen)?;
                    expr = Expr::Call { callee: Box::new(expr), args };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn primary_expr(&mut self) -> Result<Expr, ParseError> {
        match self.advance() {
            Token::Null => Ok(Expr::Null),
            Token::True => Ok(Expr::Bool(true)),
            Token::False => Ok(Expr::Bool(false)),
            Token::Number(n) => Ok(Expr::Number(n)),
            Token::Str(s) => Ok(Expr::Str(s)),
            Token::Ident(name) => Ok(Expr::Ident(name)),
            Token::Function => {
                let params = self.param_list()?;
                let body = self.block()?;
                Ok(Expr::FunctionLit { params, body })
            }
            Token::LParen => {
                let expr = self.expression()?;
                self.expect(&Token::RParen)?;
                Ok(expr)
            }
            Token::LBracket => {
                let mut items = Vec::new();
                if self.peek() != &Token::RBracket {
                    items.push(self.expression()?);
                    while self.peek() == &Token::Comma {
                        self.advance();
                        items.push(self.expression()?);
                    }
                }
                self.expect(&Token::RBracket)?;
                Ok(Expr::List(items))
            }
            Token::LBrace => {
                let mut fields = Vec::new();
                if self.peek() != &Token::RBrace {
                    fields.push(self.map_field()?);
                    while self.peek() == &Token::Comma {
                        self.advance();
                        if self.peek() == &Token::RBrace {
                            break;
                        }
                        fields.push(self.map_field()?);
                    }
                }
                self.expect(&Token::RBrace)?;
                Ok(Expr::Map(fields))
            }
            other => Err(ParseError::UnexpectedToken(other, self.pos)),
        }
    }

    fn map_field(&mut self) -> Result<(String, Expr), ParseError> {
        let key = match self.advance() {
            Token::Ident(name) => name,
            Token::Str(s) => s,
            other => return Err(ParseError::UnexpectedToken(other, self.pos)),
        };
        self.expect(&Token::Colon)?;
        let value = self.expression()?;
        Ok((key, value))
    }
}

#[cfg(test)]
mod tests {
    use super::super::lexer::tokenize;
    use super::*;

    fn parse_src(src: &str) -> Program {
        let tokens = tokenize(src).unwrap();
        parse(&tokens).unwrap()
    }

    #[test]
    fn parses_a_let_binding_with_a_binary_expression() {
        let program = parse_src("let x = 1 + 2 * 3;");
        assert_eq!(program.statements.len(), 1);
        assert!(matches!(program.statements[0], Stmt::Let { .. }));
    }

    #[test]
    fn parses_an_if_else() {
        let program = parse_src("if (x == 1) { return true; } else { return false; }");
        assert!(matches!(program.statements[0], Stmt::If { .. }));
    }

    #[test]
    fn parses_a_function_declaration_and_call() {
        let program = parse_src("function add(a, b) { return a + b; } let r = add(1, 2);");
        assert_eq!(program.statements.len(), 2);
        assert!(matches!(program.statements[0], Stmt::FunctionDecl { .. }));
    }

    #[test]
    fn parses_a_map_literal_with_a_function_expression_field() {
        let program = parse_src(
            r#"let app = { id: "demo", handleCommand: function(screenId, command, session) { return command; } };"#,
        );
        let Stmt::Let { value: Expr::Map(fields), .. } = &program.statements[0] else {
            panic!("expected a let binding to a map literal");
        };
        assert_eq!(fields.len(), 2);
        assert!(matches!(fields[1].1, Expr::FunctionLit { .. }));
    }

    #[test]
    fn parses_field_and_index_and_call_chains() {
        let program = parse_src("let x = obj.field[0](1, 2);");
        assert!(matches!(program.statements[0], Stmt::Let { .. }));
    }

    #[test]
    fn rejects_unterminated_blocks() {
        let tokens = tokenize("function f() { let x = 1;").unwrap();
        assert!(parse(&tokens).is_err());
    }
}
