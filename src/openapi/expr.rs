//! Predicate language: tokens, AST and a recursive-descent parser.
//!
//! ```text
//! expr    := or
//! or      := and ("or" and)*
//! and     := not ("and" not)*
//! not     := "not" not | compare
//! compare := operand [("==" | "!=" | "in" | "not" "in") operand
//!                    | "is" ["not"] "None"]
//! operand := primary ("." ident | "[" (string | int) "]" | "." method "(" args ")")*
//! primary := ident | string | int | True | False | None | "[" list "]" | "(" expr ")"
//! ```
//!
//! Anything outside this grammar that still looks like an expression
//! (ordering operators, arithmetic, function calls) is reported as
//! unsupported rather than as a syntax error.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Literal(Literal),
    List(Vec<Expr>),
    Ident(String),
    /// `operand.name`
    Attr(Box<Expr>, String),
    /// `operand["key"]` / `operand[0]`
    Index(Box<Expr>, Key),
    Call {
        receiver: Box<Expr>,
        method: Method,
        args: Vec<Expr>,
    },
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare {
        op: CmpOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    IsNone {
        operand: Box<Expr>,
        negated: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Str(String),
    Int(i64),
    Bool(bool),
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Str(String),
    Int(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    In,
    NotIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    StartsWith,
    EndsWith,
}

impl Method {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "startswith" => Some(Method::StartsWith),
            "endswith" => Some(Method::EndsWith),
            _ => None,
        }
    }
}

impl Expr {
    /// Every free identifier the expression reads, in source order.
    pub fn identifiers(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_identifiers(&mut out);
        out
    }

    fn collect_identifiers<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Ident(name) => out.push(name),
            Expr::List(items) => items.iter().for_each(|e| e.collect_identifiers(out)),
            Expr::Attr(inner, _) | Expr::Index(inner, _) | Expr::Not(inner) => {
                inner.collect_identifiers(out)
            }
            Expr::IsNone { operand, .. } => operand.collect_identifiers(out),
            Expr::Call { receiver, args, .. } => {
                receiver.collect_identifiers(out);
                args.iter().for_each(|e| e.collect_identifiers(out));
            }
            Expr::And(a, b) | Expr::Or(a, b) => {
                a.collect_identifiers(out);
                b.collect_identifiers(out);
            }
            Expr::Compare { lhs, rhs, .. } => {
                lhs.collect_identifiers(out);
                rhs.collect_identifiers(out);
            }
        }
    }
}

/// Why a predicate could not be turned into an AST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Not an expression at all.
    Syntax(String),
    /// Well-formed, but uses something the language does not offer.
    Unsupported(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Syntax(msg) | ParseError::Unsupported(msg) => f.write_str(msg),
        }
    }
}

type ParseResult<T> = Result<T, ParseError>;

fn syntax(msg: impl Into<String>) -> ParseError {
    ParseError::Syntax(msg.into())
}

fn unsupported(msg: impl Into<String>) -> ParseError {
    ParseError::Unsupported(msg.into())
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Int(i64),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    EqEq,
    NotEq,
    /// Operators that exist in similar languages but not in this one.
    Foreign(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(s) => write!(f, "{}", s),
            Token::Str(s) => write!(f, "{:?}", s),
            Token::Int(n) => write!(f, "{}", n),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
            Token::LBracket => f.write_str("["),
            Token::RBracket => f.write_str("]"),
            Token::Comma => f.write_str(","),
            Token::Dot => f.write_str("."),
            Token::EqEq => f.write_str("=="),
            Token::NotEq => f.write_str("!="),
            Token::Foreign(op) => f.write_str(op),
        }
    }
}

fn tokenize(src: &str) -> ParseResult<Vec<Token>> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
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
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '=' | '!' | '<' | '>' => {
                let two = chars.get(i + 1) == Some(&'=');
                let token = match (c, two) {
                    ('=', true) => Token::EqEq,
                    ('!', true) => Token::NotEq,
                    ('=', false) => return Err(syntax("assignment '=' is not an expression (use '==')")),
                    ('!', false) => return Err(syntax("unexpected '!'")),
                    (op, true) => Token::Foreign(format!("{}=", op)),
                    (op, false) => Token::Foreign(op.to_string()),
                };
                tokens.push(token);
                i += if two { 2 } else { 1 };
            }
            '+' | '-' | '*' | '/' | '%' | '&' | '|' | '^' | '~' | '@' => {
                tokens.push(Token::Foreign(c.to_string()));
                i += 1;
            }
            '\'' | '"' => {
                let (text, next) = read_string(&chars, i)?;
                tokens.push(Token::Str(text));
                i = next;
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let digits: String = chars[start..i].iter().collect();
                let n = digits
                    .parse()
                    .map_err(|_| syntax(format!("integer literal {} is too large", digits)))?;
                tokens.push(Token::Int(n));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(syntax(format!("unexpected character {:?}", other))),
        }
    }

    Ok(tokens)
}

/// Reads a quoted literal starting at `chars[start]`; returns the text and
/// the index just past the closing quote.
fn read_string(chars: &[char], start: usize) -> ParseResult<(String, usize)> {
    let quote = chars[start];
    let mut out = String::new();
    let mut i = start + 1;

    while i < chars.len() {
        match chars[i] {
            c if c == quote => return Ok((out, i + 1)),
            '\\' => {
                let escaped = chars
                    .get(i + 1)
                    .ok_or_else(|| syntax("unterminated string literal"))?;
                out.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    other => *other,
                });
                i += 2;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }

    Err(syntax("unterminated string literal"))
}

/// Bounds the recursion of both the parser and the interpreter: a tree is
/// never deeper than its token count, and brackets nest at most
/// `MAX_NESTING` levels.
const MAX_TOKENS: usize = 512;
const MAX_NESTING: usize = 64;

pub fn parse(src: &str) -> ParseResult<Expr> {
    let tokens = tokenize(src)?;
    if tokens.is_empty() {
        return Err(syntax("empty predicate"));
    }
    if tokens.len() > MAX_TOKENS {
        return Err(unsupported(format!(
            "predicate is too long ({} tokens, at most {})",
            tokens.len(),
            MAX_TOKENS
        )));
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.expr()?;
    match parser.peek() {
        None => Ok(expr),
        Some(Token::Foreign(op)) => Err(unsupported(format!("operator '{}' is not supported", op))),
        Some(tok) => Err(syntax(format!("unexpected '{}' after expression", tok))),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Open brackets around the current position.
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(s)) if s == kw)
    }

    fn peek_keyword_at(&self, offset: usize, kw: &str) -> bool {
        matches!(self.tokens.get(self.pos + offset), Some(Token::Ident(s)) if s == kw)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, want: Token) -> ParseResult<()> {
        match self.next() {
            Some(tok) if tok == want => Ok(()),
            Some(tok) => Err(syntax(format!("expected '{}', found '{}'", want, tok))),
            None => Err(syntax(format!("expected '{}', found end of input", want))),
        }
    }

    fn expr(&mut self) -> ParseResult<Expr> {
        self.or()
    }

    /// Parses the contents of a bracket pair.
    fn nested<T>(&mut self, inner: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        if self.depth >= MAX_NESTING {
            return Err(unsupported(format!(
                "predicate nests deeper than {} levels",
                MAX_NESTING
            )));
        }
        self.depth += 1;
        let result = inner(self);
        self.depth -= 1;
        result
    }

    fn or(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.and()?;
        while self.peek_keyword("or") {
            self.pos += 1;
            let rhs = self.and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.not()?;
        while self.peek_keyword("and") {
            self.pos += 1;
            let rhs = self.not()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn not(&mut self) -> ParseResult<Expr> {
        let mut negations = 0;
        while self.peek_keyword("not") {
            self.pos += 1;
            negations += 1;
        }
        let mut expr = self.compare()?;
        for _ in 0..negations {
            expr = Expr::Not(Box::new(expr));
        }
        Ok(expr)
    }

    fn compare(&mut self) -> ParseResult<Expr> {
        let lhs = self.operand()?;

        let op = match self.peek() {
            Some(Token::EqEq) => CmpOp::Eq,
            Some(Token::NotEq) => CmpOp::Ne,
            Some(Token::Ident(s)) if s == "in" => CmpOp::In,
            Some(Token::Ident(s)) if s == "not" && self.peek_keyword_at(1, "in") => {
                self.pos += 1;
                CmpOp::NotIn
            }
            Some(Token::Ident(s)) if s == "is" => {
                self.pos += 1;
                let negated = self.peek_keyword("not");
                if negated {
                    self.pos += 1;
                }
                return match self.next() {
                    Some(Token::Ident(s)) if s == "None" => Ok(Expr::IsNone {
                        operand: Box::new(lhs),
                        negated,
                    }),
                    _ => Err(unsupported("'is' is only supported as 'is None' or 'is not None'")),
                };
            }
            Some(Token::Foreign(op)) => {
                return Err(unsupported(format!("operator '{}' is not supported", op)));
            }
            _ => return Ok(lhs),
        };
        self.pos += 1;

        let rhs = self.operand()?;
        if let Some(Token::EqEq | Token::NotEq) = self.peek() {
            return Err(unsupported("chained comparisons are not supported"));
        }
        Ok(Expr::Compare {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    fn operand(&mut self) -> ParseResult<Expr> {
        let mut expr = self.primary()?;
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.pos += 1;
                    let name = match self.next() {
                        Some(Token::Ident(name)) => name,
                        // `resource.responses.200`
                        Some(Token::Int(n)) => n.to_string(),
                        _ => return Err(syntax("expected a name after '.'")),
                    };
                    if self.peek() == Some(&Token::LParen) {
                        let method = Method::from_name(&name).ok_or_else(|| {
                            unsupported(format!("method '{}' is not supported", name))
                        })?;
                        self.pos += 1;
                        let args = self.nested(|p| p.list_items(Token::RParen))?;
                        expr = Expr::Call {
                            receiver: Box::new(expr),
                            method,
                            args,
                        };
                    } else {
                        expr = Expr::Attr(Box::new(expr), name);
                    }
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    let key = match self.next() {
                        Some(Token::Str(s)) => Key::Str(s),
                        Some(Token::Int(n)) => Key::Int(n),
                        _ => {
                            return Err(unsupported(
                                "only string or integer literals can be used as an index",
                            ));
                        }
                    };
                    self.expect(Token::RBracket)?;
                    expr = Expr::Index(Box::new(expr), key);
                }
                Some(Token::LParen) => {
                    return Err(unsupported("function calls are not supported"));
                }
                _ => return Ok(expr),
            }
        }
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        match self.next() {
            Some(Token::Str(s)) => Ok(Expr::Literal(Literal::Str(s))),
            Some(Token::Int(n)) => Ok(Expr::Literal(Literal::Int(n))),
            Some(Token::Ident(name)) => Ok(match name.as_str() {
                "True" => Expr::Literal(Literal::Bool(true)),
                "False" => Expr::Literal(Literal::Bool(false)),
                "None" => Expr::Literal(Literal::None),
                "and" | "or" | "not" | "in" | "is" => {
                    return Err(syntax(format!("unexpected keyword '{}'", name)));
                }
                _ => Expr::Ident(name),
            }),
            Some(Token::LBracket) => Ok(Expr::List(self.nested(|p| p.list_items(Token::RBracket))?)),
            Some(Token::LParen) => self.nested(|p| {
                let inner = p.expr()?;
                p.expect(Token::RParen)?;
                Ok(inner)
            }),
            Some(Token::Foreign(op)) => Err(unsupported(format!("operator '{}' is not supported", op))),
            Some(tok) => Err(syntax(format!("unexpected '{}'", tok))),
            None => Err(syntax("unexpected end of input")),
        }
    }

    /// Comma-separated expressions up to `close`; a trailing comma is allowed.
    fn list_items(&mut self, close: Token) -> ParseResult<Vec<Expr>> {
        let mut items = Vec::new();
        loop {
            if self.peek() == Some(&close) {
                self.pos += 1;
                return Ok(items);
            }
            items.push(self.expr()?);
            match self.next() {
                Some(Token::Comma) => {}
                Some(tok) if tok == close => return Ok(items),
                Some(tok) => return Err(syntax(format!("expected ',' or '{}', found '{}'", close, tok))),
                None => return Err(syntax(format!("expected '{}', found end of input", close))),
            }
        }
    }
}
