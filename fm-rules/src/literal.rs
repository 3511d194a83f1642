//! The literal value parser (C3): quoted strings, numbers, booleans, null,
//! and JSON arrays/objects, with a prototype-pollution guard applied to every
//! literal JSON object ingested anywhere in the system.

use std::fmt::{self, Display};

use thiserror::Error;

use crate::span::Span;
use crate::value::Value;

const FORBIDDEN_KEYS: [&str; 3] = ["__proto__", "constructor", "prototype"];

#[derive(Debug, Error, PartialEq)]
pub enum LiteralError {
    #[error("unterminated string literal at {0}")]
    UnterminatedString(Span),
    #[error("invalid JSON literal at {span}: {message}")]
    InvalidJson { span: Span, message: String },
    #[error("unsafe properties: key {key:?} is not allowed in a literal object")]
    UnsafeProperties { key: String },
}

/// A literal value as it appears in condition/action source text: a quoted
/// string, a number, `true`/`false`, `null`, a JSON array/object, or bare
/// unquoted text (treated as a string).
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Value(Value),
    /// A `/pattern/flags` regex literal. Never produced by [`parse_literal`]
    /// (regex literals are lexed only inside the condition DSL); this
    /// variant exists so [`crate::condition::ast::Condition::Comparison`]
    /// can carry a `~` operand as a `Literal` like every other operator.
    Regex { pattern: String, flags: String },
}

impl Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "null"),
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Int(i) => write!(f, "{i}"),
            Literal::Float(n) => write!(f, "{n}"),
            Literal::String(s) => write!(f, "{s:?}"),
            Literal::Value(v) => write!(f, "{v}"),
            Literal::Regex { pattern, flags } => write!(f, "/{pattern}/{flags}"),
        }
    }
}

impl Literal {
    pub fn into_value(self) -> Value {
        match self {
            Literal::Null => Value::Null,
            Literal::Bool(b) => Value::Bool(b),
            Literal::Int(i) => Value::Int(i),
            Literal::Float(n) => Value::Float(n),
            Literal::String(s) => Value::String(s),
            Literal::Value(v) => v,
            Literal::Regex { pattern, flags } => Value::String(format!("/{pattern}/{flags}")),
        }
    }
}

/// Parses a single literal token's text (already isolated by the lexer),
/// e.g. `"hello"`, `42`, `-1.5`, `true`, `null`, `["a", "b"]`, `{"k": 1}`, or
/// a bare word (treated as a string).
pub fn parse_literal(text: &str, span: Span) -> Result<Literal, LiteralError> {
    let trimmed = text.trim();

    if trimmed.eq_ignore_ascii_case("null") {
        return Ok(Literal::Null);
    }
    if trimmed.eq_ignore_ascii_case("true") {
        return Ok(Literal::Bool(true));
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Ok(Literal::Bool(false));
    }

    if is_quoted(trimmed) {
        let unescaped = snailquote::unescape(trimmed)
            .map_err(|_| LiteralError::UnterminatedString(span))?;
        return Ok(Literal::String(unescaped));
    }

    if is_number(trimmed) {
        if let Ok(i) = trimmed.parse::<i64>() {
            return Ok(Literal::Int(i));
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            return Ok(Literal::Float(f));
        }
    }

    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        let json: serde_json::Value =
            serde_json::from_str(trimmed).map_err(|e| LiteralError::InvalidJson {
                span,
                message: e.to_string(),
            })?;
        let value: Value = json.into();
        reject_unsafe_keys(&value)?;
        return Ok(Literal::Value(value));
    }

    Ok(Literal::String(trimmed.to_string()))
}

fn is_number(text: &str) -> bool {
    let mut chars = text.chars().peekable();
    if let Some('-') = chars.peek() {
        chars.next();
    }
    let mut saw_digit = false;
    let mut saw_dot = false;
    for c in chars {
        if c.is_ascii_digit() {
            saw_digit = true;
        } else if c == '.' && !saw_dot {
            saw_dot = true;
        } else {
            return false;
        }
    }
    saw_digit
}

fn is_quoted(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.len() >= 2
        && ((bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[bytes.len() - 1] == b'\''))
}

/// Scans a value (and every nested value, at any depth) for a key equal to
/// `__proto__`, `constructor` or `prototype`, rejecting if found. Applied
/// uniformly wherever literal JSON enters the system: the literal parser, and
/// the `MERGE`/`MERGE_OVERWRITE`/object-`SET` execution paths.
pub fn reject_unsafe_keys(value: &Value) -> Result<(), LiteralError> {
    match value {
        Value::Map(map) => {
            for (key, inner) in map {
                if FORBIDDEN_KEYS.contains(&key.as_str()) {
                    return Err(LiteralError::UnsafeProperties { key: key.clone() });
                }
                reject_unsafe_keys(inner)?;
            }
            Ok(())
        }
        Value::Seq(items) => {
            for item in items {
                reject_unsafe_keys(item)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_quoted_strings_with_escapes() {
        let lit = parse_literal(r#""a\nb""#, Span::default()).unwrap();
        assert_eq!(lit, Literal::String("a\nb".to_string()));
    }

    #[test]
    fn parses_numbers_bools_and_null() {
        assert_eq!(parse_literal("42", Span::default()).unwrap(), Literal::Int(42));
        assert_eq!(
            parse_literal("-1.5", Span::default()).unwrap(),
            Literal::Float(-1.5)
        );
        assert_eq!(
            parse_literal("TRUE", Span::default()).unwrap(),
            Literal::Bool(true)
        );
        assert_eq!(parse_literal("null", Span::default()).unwrap(), Literal::Null);
    }

    #[test]
    fn rejects_dangerous_keys_at_any_depth() {
        let err = parse_literal(r#"{"a": {"__proto__": 1}}"#, Span::default()).unwrap_err();
        assert!(matches!(err, LiteralError::UnsafeProperties { .. }));
    }

    #[test]
    fn bare_text_is_a_string() {
        assert_eq!(
            parse_literal("draft", Span::default()).unwrap(),
            Literal::String("draft".to_string())
        );
    }
}
