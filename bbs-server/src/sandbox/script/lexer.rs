//! # Lexer
//!
//! Hand-rolled tokenizer for the restricted scripting language. No regex
//! here on purpose - the lexer defines the character-level grammar the
//! language can even express; `sandbox::static_analysis`'s regex checks
//! run over raw source text *before* this ever runs, as a cheap first
//! gate, not as a substitute for it.

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Number(f64),
    Str(String),
    Let,
    Function,
    If,
    Else,
    Return,
    True,
    False,
    Null,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,
    EqEq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    AndAnd,
    OrOr,
    Bang,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Semicolon,
    Dot,
    Eof,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum LexError {
    #[error("unterminated string literal at byte offset {0}")]
    UnterminatedString(usize),
    #[error("unexpected character '{0}' at byte offset {1}")]
    UnexpectedChar(char, usize),
}

pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c == '/' && chars.get(i + 1) == Some(&'/') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }

        if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            let n: f64 = text.parse().map_err(|_| LexError::UnexpectedChar(c, start))?;
            tokens.push(Token::Number(n));
            continue;
        }

        if c == '"' || c == '\'' {
            let quote = c;
            let start = i;
            i += 1;
            let mut s = String::new();
            while i < chars.len() && chars[i] != quote {
                if chars[i] == '\\' && i + 1 < chars.len() {
                    i += 1;
                    s.push(match chars[i] {
                        'n' => '\n',
                        't' => '\t',
                        other => other,
                    });
                } else {
                    s.push(chars[i]);
                }
                i += 1;
            }
            if i >= chars.len() {
                return Err(LexError::UnterminatedString(start));
            }
            i += 1; // closing quote
            tokens.push(Token::Str(s));
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            tokens.push(match word.as_str() {
                "let" => Token::Let,
                "function" => Token::Function,
                "if" => Token::If,
                "else" => Token::Else,
                "return" => Token::Return,
                "true" => Token::True,
                "false" => Token::False,
                "null" => Token::Null,
                _ => Token::Ident(word),
            });
            continue;
        }

        macro_rules! two_char {
            ($second:expr, $both:expr, $single:expr) => {{
                if chars.get(i + 1) == Some(&$second) {
                    i += 2;
                    tokens.push($both);
                } else {
                    i += 1;
                    tokens.push($single);
                }
            }};
        }

        match c {
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '%' => {
                tokens.push(Token::Percent);
                i += 1;
            }
            '=' => two_char!('=', Token::EqEq, Token::Eq),
            '!' => two_char!('=', Token::NotEq, Token::Bang),
            '<' => two_char!('=', Token::Lte, Token::Lt),
            '>' => two_char!('=', Token::Gte, Token::Gt),
            '&' => {
                if chars.get(i + 1) == Some(&'&') {
                    i += 2;
                    tokens.push(Token::AndAnd);
                } else {
                    return Err(LexError::UnexpectedChar(c, i));
                }
            }
            '|' => {
                if chars.get(i + 1) == Some(&'|') {
                    i += 2;
                    tokens.push(Token::OrOr);
                } else {
                    return Err(LexError::UnexpectedChar(c, i));
                }
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '{' => {
                tokens.push(Token::LBrace);
                i += 1;
            }
            '}' => {
                tokens.push(Token::RBrace);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            ':' => {
                tokens.push(Token::Colon);
                i += 1;
            }
            ';' => {
                tokens.push(Token::Semicolon);
                i += 1;
            }
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            other => return Err(LexError::UnexpectedChar(other, i)),
        }
    }

    tokens.push(Token::Eof);
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_a_let_binding() {
        let tokens = tokenize("let x = 1 + 2;").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Let,
                Token::Ident("x".into()),
                Token::Eq,
                Token::Number(1.0),
                Token::Plus,
                Token::Number(2.0),
                Token::Semicolon,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn tokenizes_string_literals_with_escapes() {
        let tokens = tokenize(r#""hello\nworld""#).unwrap();
        assert_eq!(tokens, vec![Token::Str("hello\nworld".to_string()), Token::Eof]);
    }

    #[test]
    fn rejects_unterminated_strings() {
        assert!(tokenize("\"unterminated").is_err());
    }

    #[test]
    fn skips_line_comments() {
        let tokens = tokenize("let x = 1; // trailing comment\n").unwrap();
        assert_eq!(tokens.len(), 6); // let, x, =, 1, ;, eof
    }
}
