//! The action parser (C8).
//!
//! The grammar is a flat `OPCODE path args...` shape per operation (spec.md
//! §4.6); there is no operator precedence to speak of, so this parser is a
//! straight dispatch on the opcode keyword rather than a Pratt parser. The
//! one irregular part is the `*_WHERE` forms, whose embedded condition text
//! is located with [`crate::raw_scan`] and handed to
//! [`crate::condition::parse_condition`] rather than re-tokenized here.

use thiserror::Error;

use crate::action::ast::{Action, MoveTarget, SortOrder};
use crate::action::lexer::{LexError, Lexer, Token, TokenKind};
use crate::condition::{self, Condition};
use crate::literal::{reject_unsafe_keys, Literal, LiteralError};
use crate::path::{Path, Segment};
use crate::raw_scan;
use crate::span::Span;
use crate::value::Value;

#[derive(Debug, Error)]
pub enum ActionParseError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Literal(#[from] LiteralError),
    #[error("invalid JSON literal at {span}: {message}")]
    InvalidJson { span: Span, message: String },
    #[error("invalid embedded condition at {span}: {source}")]
    Condition {
        span: Span,
        #[source]
        source: condition::ParseError,
    },
    #[error("expected {expected} but found {found} at {span}")]
    Unexpected {
        expected: String,
        found: String,
        span: Span,
    },
    #[error("unknown action keyword {keyword:?} at {span}")]
    UnknownOpcode { keyword: String, span: Span },
    #[error("a path cannot be empty at {0}")]
    EmptyPath(Span),
    #[error("MERGE requires a JSON object, not an array, at {0}")]
    MergeTargetNotObject(Span),
}

// Manual PartialEq: condition::ParseError doesn't derive it transitively in
// a way that's worth threading through serde_json's error type either, so
// tests compare on the `Display` text instead where needed.
impl PartialEq for ActionParseError {
    fn eq(&self, other: &Self) -> bool {
        format!("{self}") == format!("{other}")
    }
}

pub fn parse_action(source: &str) -> Result<Action, ActionParseError> {
    let mut parser = Parser::new(source)?;
    let action = parser.parse_action()?;
    parser.expect_eof()?;
    Ok(action)
}

struct Parser<'a> {
    source: &'a str,
    lexer: Lexer<'a>,
    current: Token,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Result<Self, ActionParseError> {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token()?;
        Ok(Parser {
            source,
            lexer,
            current,
        })
    }

    fn advance(&mut self) -> Result<Token, ActionParseError> {
        let tok = std::mem::replace(&mut self.current, self.lexer.next_token()?);
        Ok(tok)
    }

    fn expect_eof(&self) -> Result<(), ActionParseError> {
        if self.current.kind == TokenKind::Eof {
            Ok(())
        } else {
            Err(ActionParseError::Unexpected {
                expected: "end of input".into(),
                found: self.current.kind.to_string(),
                span: self.current.span,
            })
        }
    }

    fn expect_identifier(&mut self) -> Result<(String, Span), ActionParseError> {
        let tok = self.advance()?;
        match tok.kind {
            TokenKind::Identifier(name) => Ok((name, tok.span)),
            other => Err(ActionParseError::Unexpected {
                expected: "an identifier".into(),
                found: other.to_string(),
                span: tok.span,
            }),
        }
    }

    fn expect_keyword(&mut self, word: &str) -> Result<Span, ActionParseError> {
        let (name, span) = self.expect_identifier()?;
        if name.eq_ignore_ascii_case(word) {
            Ok(span)
        } else {
            Err(ActionParseError::Unexpected {
                expected: format!("keyword {word}"),
                found: name,
                span,
            })
        }
    }

    fn peek_keyword(&self, word: &str) -> bool {
        matches!(&self.current.kind, TokenKind::Identifier(name) if name.eq_ignore_ascii_case(word))
    }

    fn parse_action(&mut self) -> Result<Action, ActionParseError> {
        let (opcode, span) = self.expect_identifier()?;
        match opcode.to_ascii_uppercase().as_str() {
            "SET" => Ok(Action::Set {
                path: self.parse_path()?,
                value: self.parse_literal_value()?,
            }),
            "ADD" => Ok(Action::Add {
                path: self.parse_path()?,
                value: self.parse_literal_value()?,
            }),
            "DELETE" | "CLEAR" => Ok(Action::Delete {
                path: self.parse_path()?,
            }),
            "RENAME" => {
                let from = self.parse_path()?;
                let to = self.parse_path()?;
                Ok(Action::Rename { from, to })
            }
            "APPEND" => Ok(Action::Append {
                path: self.parse_path()?,
                value: self.parse_literal_value()?,
            }),
            "PREPEND" => Ok(Action::Prepend {
                path: self.parse_path()?,
                value: self.parse_literal_value()?,
            }),
            "INSERT_AT" => {
                let path = self.parse_path()?;
                let value = self.parse_literal_value()?;
                self.expect_keyword("AT")?;
                let index = self.parse_index()?;
                Ok(Action::InsertAt { path, value, index })
            }
            "INSERT_AFTER" => {
                let path = self.parse_path()?;
                let value = self.parse_literal_value()?;
                self.expect_keyword("AFTER")?;
                let target = self.parse_literal_value()?;
                Ok(Action::InsertAfter {
                    path,
                    value,
                    target,
                })
            }
            "INSERT_BEFORE" => {
                let path = self.parse_path()?;
                let value = self.parse_literal_value()?;
                self.expect_keyword("BEFORE")?;
                let target = self.parse_literal_value()?;
                Ok(Action::InsertBefore {
                    path,
                    value,
                    target,
                })
            }
            "REMOVE" => Ok(Action::Remove {
                path: self.parse_path()?,
                value: self.parse_literal_value()?,
            }),
            "REMOVE_ALL" => Ok(Action::RemoveAll {
                path: self.parse_path()?,
                value: self.parse_literal_value()?,
            }),
            "REMOVE_AT" => Ok(Action::RemoveAt {
                path: self.parse_path()?,
                index: self.parse_index()?,
            }),
            "REPLACE" => {
                let path = self.parse_path()?;
                let old = self.parse_literal_value()?;
                self.expect_keyword("WITH")?;
                let new = self.parse_literal_value()?;
                Ok(Action::Replace { path, old, new })
            }
            "REPLACE_ALL" => {
                let path = self.parse_path()?;
                let old = self.parse_literal_value()?;
                self.expect_keyword("WITH")?;
                let new = self.parse_literal_value()?;
                Ok(Action::ReplaceAll { path, old, new })
            }
            "DEDUPLICATE" => Ok(Action::Deduplicate {
                path: self.parse_path()?,
            }),
            "SORT" => {
                let path = self.parse_path()?;
                let order = self.parse_optional_order();
                Ok(Action::Sort { path, order })
            }
            "SORT_BY" => {
                let path = self.parse_path()?;
                self.expect_keyword("BY")?;
                let (field, _) = self.expect_identifier()?;
                let order = self.parse_optional_order();
                Ok(Action::SortBy { path, field, order })
            }
            "MOVE" => {
                let path = self.parse_path()?;
                self.expect_keyword("FROM")?;
                let from = self.parse_index()?;
                self.expect_keyword("TO")?;
                let to = self.parse_index()?;
                Ok(Action::Move { path, from, to })
            }
            "MOVE_WHERE" => {
                let path = self.parse_path()?;
                let condition = self.parse_where_condition(&["TO", "AFTER", "BEFORE"])?;
                let target = self.parse_move_target()?;
                Ok(Action::MoveWhere {
                    path,
                    condition,
                    target,
                })
            }
            "UPDATE_WHERE" => {
                let path = self.parse_path()?;
                let condition = self.parse_where_condition(&["SET"])?;
                self.expect_keyword("SET")?;
                let updates = self.parse_update_pairs()?;
                Ok(Action::UpdateWhere {
                    path,
                    condition,
                    updates,
                })
            }
            "MERGE" => {
                let path = self.parse_path()?;
                let object = self.parse_object_value()?;
                Ok(Action::Merge { path, object })
            }
            "MERGE_OVERWRITE" => {
                let path = self.parse_path()?;
                let object = self.parse_object_value()?;
                Ok(Action::MergeOverwrite { path, object })
            }
            _ => Err(ActionParseError::UnknownOpcode {
                keyword: opcode,
                span,
            }),
        }
    }

    fn parse_optional_order(&mut self) -> SortOrder {
        if self.peek_keyword("DESC") {
            self.advance().ok();
            SortOrder::Desc
        } else if self.peek_keyword("ASC") {
            self.advance().ok();
            SortOrder::Asc
        } else {
            SortOrder::Asc
        }
    }

    fn parse_move_target(&mut self) -> Result<MoveTarget, ActionParseError> {
        if self.peek_keyword("TO") {
            self.advance()?;
            if self.peek_keyword("START") {
                self.advance()?;
                return Ok(MoveTarget::Start);
            }
            if self.peek_keyword("END") {
                self.advance()?;
                return Ok(MoveTarget::End);
            }
            let index = self.parse_index()?;
            return Ok(MoveTarget::Index(index));
        }
        if self.peek_keyword("AFTER") {
            self.advance()?;
            let cond = self.parse_bare_condition(&[])?;
            return Ok(MoveTarget::After(cond));
        }
        if self.peek_keyword("BEFORE") {
            self.advance()?;
            let cond = self.parse_bare_condition(&[])?;
            return Ok(MoveTarget::Before(cond));
        }
        Err(ActionParseError::Unexpected {
            expected: "TO, AFTER or BEFORE".into(),
            found: self.current.kind.to_string(),
            span: self.current.span,
        })
    }

    fn parse_update_pairs(&mut self) -> Result<Vec<(String, Literal)>, ActionParseError> {
        let mut pairs = Vec::new();
        loop {
            let (field, _) = self.expect_identifier()?;
            let value = self.parse_literal_value()?;
            pairs.push((field, value));
            if self.current.kind == TokenKind::Comma {
                self.advance()?;
                continue;
            }
            break;
        }
        Ok(pairs)
    }

    /// Consumes the `WHERE` keyword and returns the parsed condition found
    /// between it and the first occurrence (at depth 0) of any of
    /// `terminators`. An empty `terminators` list means "to end of input".
    fn parse_where_condition(
        &mut self,
        terminators: &[&str],
    ) -> Result<Condition, ActionParseError> {
        self.expect_keyword("WHERE")?;
        self.parse_bare_condition(terminators)
    }

    /// Like [`Self::parse_where_condition`] but does not expect a leading
    /// `WHERE` keyword — used for `MOVE_WHERE`'s `AFTER cond`/`BEFORE cond`
    /// clauses, which hold the condition directly.
    fn parse_bare_condition(
        &mut self,
        terminators: &[&str],
    ) -> Result<Condition, ActionParseError> {
        let start = self.current.span.start;
        let end = raw_scan::capture_until_keyword(self.source, start, terminators);
        let text = self.source[start..end].trim();
        let span = Span::new(start, end);
        let cond = condition::parse_condition(text)
            .map_err(|source| ActionParseError::Condition { span, source })?;
        self.lexer.seek(end);
        self.current = self.lexer.next_token()?;
        Ok(cond)
    }

    /// Disambiguates a `[` token: a path index bracket (`tags[0]`) looks
    /// exactly like `[` Number `]`, whereas a JSON array value (`SET tags
    /// ["a", "b"]`) does not. Paths never index by anything but a bare
    /// integer, so two tokens of lookahead settle it without needing a
    /// general backtracking parser.
    fn current_is_path_index_bracket(&self) -> bool {
        if self.current.kind != TokenKind::LBracket {
            return false;
        }
        let mut probe = self.lexer.clone();
        let Ok(inside) = probe.next_token() else {
            return false;
        };
        let Ok(close) = probe.next_token() else {
            return false;
        };
        matches!(inside.kind, TokenKind::Number(_)) && close.kind == TokenKind::RBracket
    }

    fn parse_path(&mut self) -> Result<Path, ActionParseError> {
        let start_span = self.current.span;
        let mut segments = Vec::new();

        match self.current.kind.clone() {
            TokenKind::Identifier(name) => {
                self.advance()?;
                segments.push(field_or_length(&name));
            }
            TokenKind::LBracket => {}
            _ => {
                return Err(ActionParseError::Unexpected {
                    expected: "a path".into(),
                    found: self.current.kind.to_string(),
                    span: self.current.span,
                })
            }
        }

        loop {
            match &self.current.kind {
                TokenKind::Dot => {
                    self.advance()?;
                    let (name, _) = self.expect_identifier()?;
                    segments.push(field_or_length(&name));
                }
                TokenKind::LBracket if self.current_is_path_index_bracket() => {
                    self.advance()?;
                    let idx = self.parse_index()?;
                    self.expect_rbracket()?;
                    segments.push(Segment::Index(idx));
                }
                _ => break,
            }
        }

        if segments.is_empty() {
            return Err(ActionParseError::EmptyPath(start_span));
        }

        Ok(Path { segments })
    }

    fn expect_rbracket(&mut self) -> Result<(), ActionParseError> {
        let tok = self.advance()?;
        if tok.kind == TokenKind::RBracket {
            Ok(())
        } else {
            Err(ActionParseError::Unexpected {
                expected: "']'".into(),
                found: tok.kind.to_string(),
                span: tok.span,
            })
        }
    }

    fn parse_index(&mut self) -> Result<i64, ActionParseError> {
        let tok = self.advance()?;
        match tok.kind {
            TokenKind::Number(n) => n.parse::<i64>().map_err(|_| ActionParseError::Unexpected {
                expected: "an integer index".into(),
                found: n,
                span: tok.span,
            }),
            other => Err(ActionParseError::Unexpected {
                expected: "an integer index".into(),
                found: other.to_string(),
                span: tok.span,
            }),
        }
    }

    /// Parses a value operand: a scalar literal, or a JSON array/object
    /// captured and sliced directly out of the source text.
    fn parse_literal_value(&mut self) -> Result<Literal, ActionParseError> {
        match &self.current.kind {
            TokenKind::LBracket | TokenKind::LBrace => {
                let value = self.capture_json_value()?;
                Ok(Literal::Value(value))
            }
            _ => {
                let tok = self.advance()?;
                Ok(match tok.kind {
                    TokenKind::String(s) => Literal::String(s),
                    TokenKind::Number(n) => {
                        if let Ok(i) = n.parse::<i64>() {
                            Literal::Int(i)
                        } else {
                            Literal::Float(n.parse::<f64>().unwrap_or(0.0))
                        }
                    }
                    TokenKind::Bool(b) => Literal::Bool(b),
                    TokenKind::Null => Literal::Null,
                    TokenKind::Identifier(word) => Literal::String(word),
                    other => {
                        return Err(ActionParseError::Unexpected {
                            expected: "a value".into(),
                            found: other.to_string(),
                            span: tok.span,
                        })
                    }
                })
            }
        }
    }

    /// Parses the `MERGE`/`MERGE_OVERWRITE` object operand, which must be a
    /// JSON object (not an array).
    fn parse_object_value(&mut self) -> Result<Value, ActionParseError> {
        let span = self.current.span;
        match &self.current.kind {
            TokenKind::LBrace => self.capture_json_value(),
            TokenKind::LBracket => Err(ActionParseError::MergeTargetNotObject(span)),
            other => Err(ActionParseError::Unexpected {
                expected: "a JSON object".into(),
                found: other.to_string(),
                span,
            }),
        }
    }

    fn capture_json_value(&mut self) -> Result<Value, ActionParseError> {
        let start = self.current.span.start;
        let end = raw_scan::capture_balanced(self.source, start).map_err(|_| {
            ActionParseError::Unexpected {
                expected: "a balanced JSON literal".into(),
                found: self.current.kind.to_string(),
                span: self.current.span,
            }
        })?;
        let text = &self.source[start..end];
        let span = Span::new(start, end);
        let json: serde_json::Value =
            serde_json::from_str(text).map_err(|e| ActionParseError::InvalidJson {
                span,
                message: e.to_string(),
            })?;
        let value: Value = json.into();
        reject_unsafe_keys(&value)?;
        self.lexer.seek(end);
        self.current = self.lexer.next_token()?;
        Ok(value)
    }
}

fn field_or_length(name: &str) -> Segment {
    if name == "length" {
        Segment::Length
    } else {
        Segment::Field(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_set_with_string_value() {
        let action = parse_action(r#"SET status "done""#).unwrap();
        assert!(matches!(action, Action::Set { .. }));
    }

    #[test]
    fn parses_append_with_json_array_value() {
        let action = parse_action(r#"SET tags ["a", "b"]"#).unwrap();
        match action {
            Action::Set { value: Literal::Value(Value::Seq(items)), .. } => {
                assert_eq!(items.len(), 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_insert_at_with_at_keyword() {
        let action = parse_action(r#"INSERT_AT tags "x" AT 0"#).unwrap();
        assert!(matches!(
            action,
            Action::InsertAt { index: 0, .. }
        ));
    }

    #[test]
    fn parses_move_where_to_start() {
        let action =
            parse_action(r#"MOVE_WHERE tasks WHERE status = "done" TO START"#).unwrap();
        match action {
            Action::MoveWhere { target: MoveTarget::Start, .. } => {}
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_move_where_to_numeric_index() {
        let action = parse_action(r#"MOVE_WHERE tasks WHERE status = "done" TO 3"#).unwrap();
        match action {
            Action::MoveWhere { target: MoveTarget::Index(3), .. } => {}
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_move_where_after_condition() {
        let action = parse_action(
            r#"MOVE_WHERE tasks WHERE status = "done" AFTER priority = "high""#,
        )
        .unwrap();
        assert!(matches!(
            action,
            Action::MoveWhere { target: MoveTarget::After(_), .. }
        ));
    }

    #[test]
    fn parses_update_where_with_multiple_fields() {
        let action = parse_action(
            r#"UPDATE_WHERE tasks WHERE status = "pending" SET status "done", priority 1"#,
        )
        .unwrap();
        match action {
            Action::UpdateWhere { updates, .. } => assert_eq!(updates.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_merge_with_json_object() {
        let action = parse_action(r#"MERGE meta {"a": 1, "b": {"c": 2}}"#).unwrap();
        assert!(matches!(action, Action::Merge { .. }));
    }

    #[test]
    fn merge_rejects_array_operand() {
        let err = parse_action(r#"MERGE meta [1, 2]"#).unwrap_err();
        assert!(matches!(err, ActionParseError::MergeTargetNotObject(_)));
    }

    #[test]
    fn rejects_unknown_opcode() {
        let err = parse_action(r#"FROBNICATE a 1"#).unwrap_err();
        assert!(matches!(err, ActionParseError::UnknownOpcode { .. }));
    }

    #[test]
    fn parses_sort_by_with_explicit_order() {
        let action = parse_action("SORT_BY tasks BY priority DESC").unwrap();
        match action {
            Action::SortBy { order: SortOrder::Desc, field, .. } => assert_eq!(field, "priority"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_rename() {
        let action = parse_action("RENAME oldName newName").unwrap();
        assert!(matches!(action, Action::Rename { .. }));
    }
}
