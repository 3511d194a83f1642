//! The condition parser (C5): precedence `OR < AND < NOT < atom`.

use thiserror::Error;

use crate::condition::ast::{CompareOp, Condition, QuantifierKind};
use crate::condition::lexer::{LexError, Lexer, Token, TokenKind};
use crate::condition::regex_guard::{self, RegexGuardError};
use crate::literal::{parse_literal, Literal, LiteralError};
use crate::path::{Path, Segment};
use crate::span::Span;

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Literal(#[from] LiteralError),
    #[error("unsafe regex pattern at {span}: {source}")]
    UnsafeRegex {
        span: Span,
        #[source]
        source: RegexGuardError,
    },
    #[error("expected {expected} but found {found} at {span}")]
    Unexpected {
        expected: String,
        found: String,
        span: Span,
    },
    #[error("a path cannot be empty at {0}")]
    EmptyPath(Span),
}

pub fn parse_condition(source: &str) -> Result<Condition, ParseError> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser { tokens, pos: 0 };
    let cond = parser.parse_or()?;
    parser.expect_eof()?;
    Ok(cond)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect_eof(&self) -> Result<(), ParseError> {
        if self.peek().kind == TokenKind::Eof {
            Ok(())
        } else {
            Err(ParseError::Unexpected {
                expected: "end of input".into(),
                found: self.peek().kind.to_string(),
                span: self.peek().span,
            })
        }
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if &self.peek().kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        if self.peek().kind == kind {
            Ok(self.advance())
        } else {
            Err(ParseError::Unexpected {
                expected: kind.to_string(),
                found: self.peek().kind.to_string(),
                span: self.peek().span,
            })
        }
    }

    // OR < AND < NOT < atom
    fn parse_or(&mut self) -> Result<Condition, ParseError> {
        let mut left = self.parse_and()?;
        while self.eat(&TokenKind::Or) {
            let right = self.parse_and()?;
            left = Condition::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Condition, ParseError> {
        let mut left = self.parse_not()?;
        while self.eat(&TokenKind::And) {
            let right = self.parse_not()?;
            left = Condition::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Condition, ParseError> {
        if self.eat(&TokenKind::Not) {
            let inner = self.parse_not()?;
            return Ok(Condition::Not(Box::new(inner)));
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<Condition, ParseError> {
        if self.eat(&TokenKind::LParen) {
            let inner = self.parse_or()?;
            self.expect(TokenKind::RParen)?;
            return Ok(inner);
        }

        if matches!(self.peek().kind, TokenKind::Any | TokenKind::All) {
            let kind = if matches!(self.peek().kind, TokenKind::Any) {
                QuantifierKind::Any
            } else {
                QuantifierKind::All
            };
            self.advance();
            let array = self.parse_path()?;
            self.expect(TokenKind::Where)?;
            let body = self.parse_or()?;
            return Ok(Condition::Quantifier {
                kind,
                array,
                body: Box::new(body),
            });
        }

        let path = self.parse_path()?;
        self.parse_predicate(path)
    }

    fn parse_predicate(&mut self, path: Path) -> Result<Condition, ParseError> {
        let negated = self.eat(&TokenKind::Bang);

        match &self.peek().kind {
            TokenKind::Has => {
                self.advance();
                let value = self.parse_literal_token()?;
                Ok(Condition::Has {
                    path,
                    value,
                    negated,
                })
            }
            TokenKind::Empty => {
                self.advance();
                Ok(Condition::EmptyCheck { path, negated })
            }
            TokenKind::Exists => {
                self.advance();
                Ok(Condition::Existence { path, negated })
            }
            TokenKind::TypeCheck(kind) => {
                let kind = *kind;
                self.advance();
                Ok(Condition::TypeCheck {
                    path,
                    kind,
                    negated,
                })
            }
            _ if !negated => {
                let op = self.parse_compare_op()?;
                if op == CompareOp::Regex {
                    let (pattern, flags, span) = self.expect_regex()?;
                    regex_guard::validate(&pattern, &crate::limits::Limits::default())
                        .map_err(|source| ParseError::UnsafeRegex { span, source })?;
                    return Ok(Condition::Comparison {
                        left: path,
                        op,
                        right: Literal::Regex { pattern, flags },
                    });
                }
                let right = self.parse_literal_token()?;
                Ok(Condition::Comparison {
                    left: path,
                    op,
                    right,
                })
            }
            _ => Err(ParseError::Unexpected {
                expected: "has, empty, exists or a type-check after '!'".into(),
                found: self.peek().kind.to_string(),
                span: self.peek().span,
            }),
        }
    }

    fn parse_compare_op(&mut self) -> Result<CompareOp, ParseError> {
        let op = match &self.peek().kind {
            TokenKind::Eq => CompareOp::Eq,
            TokenKind::Ne => CompareOp::Ne,
            TokenKind::Lt => CompareOp::Lt,
            TokenKind::Le => CompareOp::Le,
            TokenKind::Gt => CompareOp::Gt,
            TokenKind::Ge => CompareOp::Ge,
            TokenKind::Tilde => CompareOp::Regex,
            _ => {
                return Err(ParseError::Unexpected {
                    expected: "a comparison operator".into(),
                    found: self.peek().kind.to_string(),
                    span: self.peek().span,
                })
            }
        };
        self.advance();
        Ok(op)
    }

    fn expect_regex(&mut self) -> Result<(String, String, Span), ParseError> {
        let tok = self.advance();
        match tok.kind {
            TokenKind::Regex { pattern, flags } => Ok((pattern, flags, tok.span)),
            other => Err(ParseError::Unexpected {
                expected: "a regex literal".into(),
                found: other.to_string(),
                span: tok.span,
            }),
        }
    }

    fn parse_literal_token(&mut self) -> Result<Literal, ParseError> {
        let tok = self.advance();
        let lit = match tok.kind {
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
            TokenKind::Identifier(ident) => parse_literal(&ident, tok.span)?,
            other => {
                return Err(ParseError::Unexpected {
                    expected: "a literal value".into(),
                    found: other.to_string(),
                    span: tok.span,
                })
            }
        };
        Ok(lit)
    }

    fn parse_path(&mut self) -> Result<Path, ParseError> {
        let start_span = self.peek().span;
        let mut segments = Vec::new();

        match self.peek().kind.clone() {
            TokenKind::Identifier(name) => {
                self.advance();
                segments.push(field_or_length(&name));
            }
            TokenKind::LBracket => {}
            _ => {
                return Err(ParseError::Unexpected {
                    expected: "a path".into(),
                    found: self.peek().kind.to_string(),
                    span: self.peek().span,
                })
            }
        }

        loop {
            match &self.peek().kind {
                TokenKind::Dot => {
                    self.advance();
                    let tok = self.expect_identifier()?;
                    segments.push(field_or_length(&tok));
                }
                TokenKind::LBracket => {
                    self.advance();
                    let idx = self.parse_index()?;
                    self.expect(TokenKind::RBracket)?;
                    segments.push(Segment::Index(idx));
                }
                _ => break,
            }
        }

        if segments.is_empty() {
            return Err(ParseError::EmptyPath(start_span));
        }

        Ok(Path { segments })
    }

    fn parse_index(&mut self) -> Result<i64, ParseError> {
        let tok = self.advance();
        match tok.kind {
            TokenKind::Number(n) => n.parse::<i64>().map_err(|_| ParseError::Unexpected {
                expected: "an integer index".into(),
                found: n,
                span: tok.span,
            }),
            other => Err(ParseError::Unexpected {
                expected: "an integer index".into(),
                found: other.to_string(),
                span: tok.span,
            }),
        }
    }

    fn expect_identifier(&mut self) -> Result<String, ParseError> {
        let tok = self.advance();
        match tok.kind {
            TokenKind::Identifier(name) => Ok(name),
            other => Err(ParseError::Unexpected {
                expected: "a field name".into(),
                found: other.to_string(),
                span: tok.span,
            }),
        }
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
    use crate::condition::ast::Condition;

    #[test]
    fn parses_simple_comparison() {
        let cond = parse_condition(r#"status = "draft""#).unwrap();
        assert!(matches!(
            cond,
            Condition::Comparison {
                op: CompareOp::Eq,
                ..
            }
        ));
    }

    #[test]
    fn parses_precedence_or_under_and() {
        // `a = 1 OR b = 2 AND c = 3` parses as `a=1 OR (b=2 AND c=3)`.
        let cond = parse_condition(r#"a = 1 OR b = 2 AND c = 3"#).unwrap();
        match cond {
            Condition::Or(_, right) => {
                assert!(matches!(*right, Condition::And(_, _)));
            }
            _ => panic!("expected Or at the top"),
        }
    }

    #[test]
    fn parses_negated_exists() {
        let cond = parse_condition("tags !exists").unwrap();
        assert!(matches!(
            cond,
            Condition::Existence { negated: true, .. }
        ));
    }

    #[test]
    fn parses_nested_any_quantifier() {
        let cond =
            parse_condition("ANY projects WHERE ANY tasks WHERE status = \"pending\"").unwrap();
        assert!(matches!(cond, Condition::Quantifier { .. }));
    }

    #[test]
    fn parses_type_check() {
        let cond = parse_condition("tags :array").unwrap();
        assert!(matches!(cond, Condition::TypeCheck { negated: false, .. }));
    }

    #[test]
    fn rejects_unsafe_regex_pattern() {
        let err = parse_condition(r#"title ~ /a++/"#).unwrap_err();
        assert!(matches!(err, ParseError::UnsafeRegex { .. }));
    }
}
