//! Structured ticket query strings.
//!
//! Grammar (keywords are case-insensitive):
//!
//! ```text
//! expr    := and ("OR" and)*
//! and     := atom ("AND" atom)*
//! atom    := "(" expr ")" | field op value | field "IN" "[" value ("," value)* "]"
//! op      := "=" | "!=" | ">" | ">=" | "<" | "<=" | "~"
//! value   := bare-word | "double quoted" | 'single quoted'
//! ```
//!
//! Values are typed by the field they compare against: `number` takes
//! integers, `*_overdue` takes `true`/`false`, time fields take epoch
//! milliseconds, RFC 3339 timestamps, or `YYYY-MM-DD` dates (UTC midnight).
//! `~` is a case-insensitive contains on text fields.
//!
//! Every failure is a `query` validation error carrying the byte offset.

use chrono::{DateTime, NaiveDate};

use crate::access::{CmpOp, Field, FieldType, Predicate, Value};
use crate::error::{DeskError, ErrorCode, Result};

/// Parse a query string into a predicate.
///
/// # Errors
///
/// Returns [`DeskError::Validation`] naming the `query` parameter when the
/// input is malformed, names an unknown field, or carries a value of the
/// wrong type.
pub fn parse_query(input: &str) -> Result<Predicate> {
    let tokens = tokenize(input).map_err(invalid)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let predicate = parser.expr().map_err(invalid)?;
    if let Some(token) = parser.peek() {
        return Err(invalid(format!(
            "unexpected {} at offset {}",
            token.kind.describe(),
            token.offset
        )));
    }
    Ok(predicate)
}

fn invalid(reason: String) -> DeskError {
    DeskError::invalid("query", ErrorCode::InvalidQuery, reason)
}

/// Interpret a raw literal for `field`.
pub(crate) fn literal(field: Field, raw: &str) -> std::result::Result<Value, String> {
    match field.field_type() {
        FieldType::Text | FieldType::List => Ok(Value::Text(raw.to_string())),
        FieldType::Int => raw
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| format!("{field} expects an integer, got '{raw}'")),
        FieldType::Bool => match raw.to_ascii_lowercase().as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(format!("{field} expects true or false, got '{raw}'")),
        },
        FieldType::Time => parse_time_ms(raw)
            .map(Value::Int)
            .ok_or_else(|| format!("{field} expects a date, timestamp, or epoch millis, got '{raw}'")),
    }
}

fn parse_time_ms(raw: &str) -> Option<i64> {
    if let Ok(ms) = raw.parse::<i64>() {
        return Some(ms);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.timestamp_millis());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    Word(String),
    Quoted(String),
    Eq,
    Op(CmpOp),
    Tilde,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

impl TokenKind {
    fn describe(&self) -> String {
        match self {
            Self::Word(w) => format!("'{w}'"),
            Self::Quoted(q) => format!("{q:?}"),
            Self::Eq => "'='".into(),
            Self::Op(op) => format!("'{}'", op.symbol()),
            Self::Tilde => "'~'".into(),
            Self::LParen => "'('".into(),
            Self::RParen => "')'".into(),
            Self::LBracket => "'['".into(),
            Self::RBracket => "']'".into(),
            Self::Comma => "','".into(),
        }
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Self::Word(w) if w.eq_ignore_ascii_case(keyword))
    }
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    offset: usize,
}

fn tokenize(input: &str) -> std::result::Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(offset, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let simple = match c {
            '(' => Some(TokenKind::LParen),
            ')' => Some(TokenKind::RParen),
            '[' => Some(TokenKind::LBracket),
            ']' => Some(TokenKind::RBracket),
            ',' => Some(TokenKind::Comma),
            '=' => Some(TokenKind::Eq),
            '~' => Some(TokenKind::Tilde),
            _ => None,
        };
        if let Some(kind) = simple {
            chars.next();
            tokens.push(Token { kind, offset });
            continue;
        }

        match c {
            '!' | '<' | '>' => {
                chars.next();
                let followed_by_eq = chars.peek().is_some_and(|&(_, next)| next == '=');
                if followed_by_eq {
                    chars.next();
                }
                let op = match (c, followed_by_eq) {
                    ('!', true) => CmpOp::Ne,
                    ('<', false) => CmpOp::Lt,
                    ('<', true) => CmpOp::Lte,
                    ('>', false) => CmpOp::Gt,
                    ('>', true) => CmpOp::Gte,
                    _ => return Err(format!("expected '!=' at offset {offset}")),
                };
                tokens.push(Token {
                    kind: TokenKind::Op(op),
                    offset,
                });
            }
            '"' | '\'' => {
                chars.next();
                let mut text = String::new();
                let mut closed = false;
                while let Some((_, ch)) = chars.next() {
                    if ch == c {
                        closed = true;
                        break;
                    }
                    if ch == '\\' {
                        if let Some((_, escaped)) = chars.next() {
                            text.push(escaped);
                        }
                        continue;
                    }
                    text.push(ch);
                }
                if !closed {
                    return Err(format!("unterminated string starting at offset {offset}"));
                }
                tokens.push(Token {
                    kind: TokenKind::Quoted(text),
                    offset,
                });
            }
            _ => {
                let mut word = String::new();
                while let Some(&(_, ch)) = chars.peek() {
                    if ch.is_alphanumeric() || matches!(ch, '_' | '.' | '-' | ':' | '+' | '@') {
                        word.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if word.is_empty() {
                    return Err(format!("unexpected character '{c}' at offset {offset}"));
                }
                tokens.push(Token {
                    kind: TokenKind::Word(word),
                    offset,
                });
            }
        }
    }

    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Recursive descent
// ---------------------------------------------------------------------------

/// Deepest parenthesis nesting a query may use.
pub const MAX_QUERY_DEPTH: usize = 64;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

type ParseResult<T> = std::result::Result<T, String>;

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek().is_some_and(|t| t.kind.is_keyword(keyword)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> ParseResult<()> {
        match self.next() {
            Some(token) if &token.kind == kind => Ok(()),
            Some(token) => Err(format!(
                "expected {} at offset {}, found {}",
                kind.describe(),
                token.offset,
                token.kind.describe()
            )),
            None => Err(format!("expected {}, found end of query", kind.describe())),
        }
    }

    fn expr(&mut self) -> ParseResult<Predicate> {
        let mut branches = vec![self.and()?];
        while self.eat_keyword("OR") {
            branches.push(self.and()?);
        }
        Ok(if branches.len() == 1 {
            branches.remove(0)
        } else {
            Predicate::Or(branches)
        })
    }

    fn and(&mut self) -> ParseResult<Predicate> {
        let mut terms = vec![self.atom()?];
        while self.eat_keyword("AND") {
            terms.push(self.atom()?);
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            Predicate::And(terms)
        })
    }

    fn atom(&mut self) -> ParseResult<Predicate> {
        let Some(token) = self.next() else {
            return Err("expected a comparison, found end of query".into());
        };

        let name = match token.kind {
            TokenKind::LParen => {
                if self.depth >= MAX_QUERY_DEPTH {
                    return Err(format!("query nested too deeply at offset {}", token.offset));
                }
                self.depth += 1;
                let inner = self.expr()?;
                self.expect(&TokenKind::RParen)?;
                self.depth -= 1;
                return Ok(inner);
            }
            TokenKind::Word(ref w) if !w.eq_ignore_ascii_case("AND") && !w.eq_ignore_ascii_case("OR") => {
                w.clone()
            }
            other => {
                return Err(format!(
                    "expected a field name at offset {}, found {}",
                    token.offset,
                    other.describe()
                ));
            }
        };

        let field: Field = name
            .parse()
            .map_err(|reason: String| format!("{reason} at offset {}", token.offset))?;

        if self.eat_keyword("IN") {
            return self.in_list(field);
        }

        let Some(op_token) = self.next() else {
            return Err(format!("expected an operator after '{name}'"));
        };
        let ty = field.field_type();
        match op_token.kind {
            TokenKind::Eq => {
                let value = literal(field, &self.value()?)?;
                Ok(Predicate::Eq(field, value))
            }
            TokenKind::Op(op) => {
                if ty == FieldType::List || (ty == FieldType::Bool && op != CmpOp::Ne) {
                    return Err(format!("{field} does not support '{}'", op.symbol()));
                }
                let value = literal(field, &self.value()?)?;
                Ok(Predicate::Cmp(field, op, value))
            }
            TokenKind::Tilde => {
                if ty != FieldType::Text {
                    return Err(format!("{field} does not support '~'"));
                }
                Ok(Predicate::Contains(field, self.value()?))
            }
            other => Err(format!(
                "expected an operator at offset {}, found {}",
                op_token.offset,
                other.describe()
            )),
        }
    }

    fn in_list(&mut self, field: Field) -> ParseResult<Predicate> {
        self.expect(&TokenKind::LBracket)?;
        let mut values = vec![literal(field, &self.value()?)?];
        loop {
            match self.next() {
                Some(Token {
                    kind: TokenKind::Comma,
                    ..
                }) => values.push(literal(field, &self.value()?)?),
                Some(Token {
                    kind: TokenKind::RBracket,
                    ..
                }) => break,
                Some(token) => {
                    return Err(format!(
                        "expected ',' or ']' at offset {}, found {}",
                        token.offset,
                        token.kind.describe()
                    ));
                }
                None => return Err("unterminated IN list".into()),
            }
        }
        Ok(Predicate::In(field, values))
    }

    fn value(&mut self) -> ParseResult<String> {
        match self.next() {
            Some(Token {
                kind: TokenKind::Word(w) | TokenKind::Quoted(w),
                ..
            }) => Ok(w),
            Some(token) => Err(format!(
                "expected a value at offset {}, found {}",
                token.offset,
                token.kind.describe()
            )),
            None => Err("expected a value, found end of query".into()),
        }
    }
}
