//! Matcher expression compiler and evaluator.
//!
//! The matcher is a small boolean language over request and policy tokens:
//!
//! ```text
//! expr     := or
//! or       := and ( "||" and )*
//! and      := unary ( "&&" unary )*
//! unary    := "!" unary | primary
//! primary  := "(" expr ")" | call | operand ( "==" | "!=" ) operand
//! call     := ident "(" operand "," operand ")"
//! operand  := "r." ident | "p." ident | string
//! ```
//!
//! Built-in functions: `g` (role membership), `keyMatch` (trailing `*`
//! wildcard) and `regexMatch`.

use regex::Regex;

use crate::error::{ModelError, ModelResult};

/// Host services the matcher needs while evaluating.
pub trait MatchEnv {
    /// Returns true if `subject` equals `role` or holds it, directly or
    /// through inheritance.
    fn has_role(&self, subject: &str, role: &str) -> bool;

    /// Returns true if `value` matches the regular expression `pattern`.
    ///
    /// The default implementation compiles the pattern on every call.
    fn regex_match(&self, value: &str, pattern: &str) -> ModelResult<bool> {
        let re = Regex::new(pattern)
            .map_err(|e| ModelError::Evaluation(format!("invalid pattern {pattern:?}: {e}")))?;
        Ok(re.is_match(value))
    }
}

/// A value inside the matcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// Request token by position.
    Request(usize),
    /// Policy token by position.
    Policy(usize),
    /// String literal.
    Literal(String),
}

impl Operand {
    fn resolve<'a>(&'a self, request: &[&'a str; 3], rule: &[&'a str; 3]) -> &'a str {
        match self {
            Self::Request(i) => request[*i],
            Self::Policy(i) => rule[*i],
            Self::Literal(s) => s.as_str(),
        }
    }
}

/// Built-in matcher function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    /// `g(subject, role)`.
    Role,
    /// `keyMatch(key, pattern)`.
    KeyMatch,
    /// `regexMatch(value, pattern)`.
    RegexMatch,
}

/// Compiled matcher expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Logical or.
    Or(Box<Expr>, Box<Expr>),
    /// Logical and.
    And(Box<Expr>, Box<Expr>),
    /// Logical not.
    Not(Box<Expr>),
    /// String equality.
    Eq(Operand, Operand),
    /// String inequality.
    Ne(Operand, Operand),
    /// Built-in call.
    Call(Function, Operand, Operand),
}

impl Expr {
    /// Evaluates the expression for one request against one rule.
    pub fn eval(
        &self,
        request: &[&str; 3],
        rule: &[&str; 3],
        env: &dyn MatchEnv,
    ) -> ModelResult<bool> {
        match self {
            Self::Or(a, b) => Ok(a.eval(request, rule, env)? || b.eval(request, rule, env)?),
            Self::And(a, b) => Ok(a.eval(request, rule, env)? && b.eval(request, rule, env)?),
            Self::Not(a) => Ok(!a.eval(request, rule, env)?),
            Self::Eq(a, b) => Ok(a.resolve(request, rule) == b.resolve(request, rule)),
            Self::Ne(a, b) => Ok(a.resolve(request, rule) != b.resolve(request, rule)),
            Self::Call(func, a, b) => {
                let a = a.resolve(request, rule);
                let b = b.resolve(request, rule);
                match func {
                    Function::Role => Ok(env.has_role(a, b)),
                    Function::KeyMatch => Ok(key_match(a, b)),
                    Function::RegexMatch => env.regex_match(a, b),
                }
            }
        }
    }

    /// Returns true if the expression calls `g`.
    pub fn uses_roles(&self) -> bool {
        match self {
            Self::Or(a, b) | Self::And(a, b) => a.uses_roles() || b.uses_roles(),
            Self::Not(a) => a.uses_roles(),
            Self::Eq(..) | Self::Ne(..) => false,
            Self::Call(func, ..) => *func == Function::Role,
        }
    }

    /// Returns true if the top-level conjunction requires request token `i`
    /// to equal policy token `i`, which lets callers index rules on it.
    pub fn requires_exact(&self, position: usize) -> bool {
        match self {
            Self::And(a, b) => a.requires_exact(position) || b.requires_exact(position),
            Self::Eq(Operand::Request(r), Operand::Policy(p))
            | Self::Eq(Operand::Policy(p), Operand::Request(r)) => *r == position && *p == position,
            _ => false,
        }
    }
}

/// `keyMatch`: `pattern` may end in `*`, matching any suffix.
pub fn key_match(key: &str, pattern: &str) -> bool {
    match pattern.find('*') {
        Some(i) => key.starts_with(&pattern[..i]),
        None => key == pattern,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Str(String),
    LParen,
    RParen,
    Comma,
    AndAnd,
    OrOr,
    Bang,
    EqEq,
    NotEq,
}

fn tokenize(input: &str) -> ModelResult<Vec<(usize, Token)>> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let start = i;
        match c {
            b' ' | b'\t' => i += 1,
            b'(' => {
                tokens.push((start, Token::LParen));
                i += 1;
            }
            b')' => {
                tokens.push((start, Token::RParen));
                i += 1;
            }
            b',' => {
                tokens.push((start, Token::Comma));
                i += 1;
            }
            b'&' if bytes.get(i + 1) == Some(&b'&') => {
                tokens.push((start, Token::AndAnd));
                i += 2;
            }
            b'|' if bytes.get(i + 1) == Some(&b'|') => {
                tokens.push((start, Token::OrOr));
                i += 2;
            }
            b'=' if bytes.get(i + 1) == Some(&b'=') => {
                tokens.push((start, Token::EqEq));
                i += 2;
            }
            b'!' if bytes.get(i + 1) == Some(&b'=') => {
                tokens.push((start, Token::NotEq));
                i += 2;
            }
            b'!' => {
                tokens.push((start, Token::Bang));
                i += 1;
            }
            b'"' => {
                let end = input[i + 1..]
                    .find('"')
                    .ok_or_else(|| ModelError::matcher(start, "unterminated string literal"))?;
                tokens.push((start, Token::Str(input[i + 1..i + 1 + end].to_string())));
                i += end + 2;
            }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' || bytes[i] == b'.')
                {
                    i += 1;
                }
                tokens.push((start, Token::Ident(input[start..i].to_string())));
            }
            _ => {
                return Err(ModelError::matcher(
                    start,
                    format!("unexpected character {:?}", char::from(c)),
                ))
            }
        }
    }

    Ok(tokens)
}

/// Token names a matcher may reference.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    /// Request definition tokens.
    pub request: &'a [String; 3],
    /// Policy definition tokens.
    pub policy: &'a [String; 3],
    /// Whether a role definition exists.
    pub roles: bool,
}

struct Parser<'a> {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
    scope: Scope<'a>,
}

/// Compiles a matcher expression.
pub fn compile(input: &str, scope: Scope<'_>) -> ModelResult<Expr> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(ModelError::matcher(0, "empty matcher"));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: input.len(),
        scope,
    };
    let expr = parser.parse_or()?;
    if let Some((offset, token)) = parser.tokens.get(parser.pos) {
        return Err(ModelError::matcher(
            *offset,
            format!("unexpected trailing token {token:?}"),
        ));
    }
    Ok(expr)
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |(o, _)| *o)
    }

    fn next(&mut self) -> ModelResult<Token> {
        let token = self
            .tokens
            .get(self.pos)
            .map(|(_, t)| t.clone())
            .ok_or_else(|| ModelError::matcher(self.end, "unexpected end of expression"))?;
        self.pos += 1;
        Ok(token)
    }

    fn expect(&mut self, expected: &Token) -> ModelResult<()> {
        let offset = self.offset();
        let token = self.next()?;
        if &token == expected {
            Ok(())
        } else {
            Err(ModelError::matcher(
                offset,
                format!("expected {expected:?}, found {token:?}"),
            ))
        }
    }

    fn parse_or(&mut self) -> ModelResult<Expr> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::OrOr) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> ModelResult<Expr> {
        let mut left = self.parse_unary()?;
        while self.peek() == Some(&Token::AndAnd) {
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ModelResult<Expr> {
        if self.peek() == Some(&Token::Bang) {
            self.pos += 1;
            return Ok(Expr::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> ModelResult<Expr> {
        if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            let expr = self.parse_or()?;
            self.expect(&Token::RParen)?;
            return Ok(expr);
        }

        let is_call = matches!(self.peek(), Some(Token::Ident(_)))
            && matches!(self.tokens.get(self.pos + 1), Some((_, Token::LParen)));
        if is_call {
            return self.parse_call();
        }

        let left = self.parse_operand()?;
        let offset = self.offset();
        match self.next()? {
            Token::EqEq => Ok(Expr::Eq(left, self.parse_operand()?)),
            Token::NotEq => Ok(Expr::Ne(left, self.parse_operand()?)),
            other => Err(ModelError::matcher(
                offset,
                format!("expected comparison, found {other:?}"),
            )),
        }
    }

    fn parse_call(&mut self) -> ModelResult<Expr> {
        let offset = self.offset();
        let Token::Ident(name) = self.next()? else {
            return Err(ModelError::matcher(offset, "expected function name"));
        };
        let func = match name.as_str() {
            "g" if self.scope.roles => Function::Role,
            "g" => {
                return Err(ModelError::matcher(
                    offset,
                    "g() used without a [role_definition]",
                ))
            }
            "keyMatch" => Function::KeyMatch,
            "regexMatch" => Function::RegexMatch,
            other => {
                return Err(ModelError::matcher(
                    offset,
                    format!("unknown function {other}"),
                ))
            }
        };
        self.expect(&Token::LParen)?;
        let a = self.parse_operand()?;
        self.expect(&Token::Comma)?;
        let b = self.parse_operand()?;
        self.expect(&Token::RParen)?;
        Ok(Expr::Call(func, a, b))
    }

    fn parse_operand(&mut self) -> ModelResult<Operand> {
        let offset = self.offset();
        match self.next()? {
            Token::Str(s) => Ok(Operand::Literal(s)),
            Token::Ident(ident) => {
                let (prefix, name) = ident
                    .split_once('.')
                    .ok_or_else(|| ModelError::matcher(offset, format!("bare identifier {ident}")))?;
                let (tokens, is_request) = match prefix {
                    "r" => (self.scope.request, true),
                    "p" => (self.scope.policy, false),
                    _ => {
                        return Err(ModelError::matcher(
                            offset,
                            format!("unknown definition {prefix}"),
                        ))
                    }
                };
                let index = tokens
                    .iter()
                    .position(|t| t == name)
                    .ok_or_else(|| ModelError::matcher(offset, format!("unknown token {ident}")))?;
                Ok(if is_request {
                    Operand::Request(index)
                } else {
                    Operand::Policy(index)
                })
            }
            other => Err(ModelError::matcher(
                offset,
                format!("expected operand, found {other:?}"),
            )),
        }
    }
}
