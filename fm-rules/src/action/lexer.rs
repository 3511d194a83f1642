//! The action lexer (C7).
//!
//! Unlike the condition lexer, this one is driven incrementally: the parser
//! pulls one token at a time and can reposition the cursor mid-stream. That
//! lets it hand off to [`crate::raw_scan`] when it meets an embedded JSON
//! literal or `WHERE` clause, then resume ordinary tokenizing right after
//! the slice it consumed raw.

use std::fmt;

use thiserror::Error;

use crate::span::Span;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Identifier(String),
    String(String),
    Number(String),
    Bool(bool),
    Null,
    Dot,
    Comma,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Identifier(s) => write!(f, "identifier `{s}`"),
            TokenKind::String(s) => write!(f, "string {s:?}"),
            TokenKind::Number(n) => write!(f, "number {n}"),
            TokenKind::Bool(b) => write!(f, "{b}"),
            TokenKind::Null => write!(f, "null"),
            TokenKind::Dot => write!(f, "'.'"),
            TokenKind::Comma => write!(f, "','"),
            TokenKind::LBracket => write!(f, "'['"),
            TokenKind::RBracket => write!(f, "']'"),
            TokenKind::LBrace => write!(f, "'{{'"),
            TokenKind::RBrace => write!(f, "'}}'"),
            TokenKind::Eof => write!(f, "end of input"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

#[derive(Debug, Error, PartialEq)]
pub enum LexError {
    #[error("unexpected character {found:?} at {span}")]
    UnexpectedChar { found: char, span: Span },
    #[error("unterminated string literal starting at {0}")]
    UnterminatedString(Span),
}

#[derive(Clone)]
pub struct Lexer<'a> {
    source: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer { source, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    fn peek_char(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
    }

    pub fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace();
        let start = self.pos;
        let Some(c) = self.peek_char() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                span: Span::new(start, start),
            });
        };

        match c {
            '.' => {
                self.bump();
                Ok(Token {
                    kind: TokenKind::Dot,
                    span: Span::new(start, self.pos),
                })
            }
            ',' => {
                self.bump();
                Ok(Token {
                    kind: TokenKind::Comma,
                    span: Span::new(start, self.pos),
                })
            }
            '[' => {
                self.bump();
                Ok(Token {
                    kind: TokenKind::LBracket,
                    span: Span::new(start, self.pos),
                })
            }
            ']' => {
                self.bump();
                Ok(Token {
                    kind: TokenKind::RBracket,
                    span: Span::new(start, self.pos),
                })
            }
            '{' => {
                self.bump();
                Ok(Token {
                    kind: TokenKind::LBrace,
                    span: Span::new(start, self.pos),
                })
            }
            '}' => {
                self.bump();
                Ok(Token {
                    kind: TokenKind::RBrace,
                    span: Span::new(start, self.pos),
                })
            }
            '"' | '\'' => self.lex_string(start),
            c if c.is_ascii_digit() || (c == '-' && self.could_be_number()) => {
                self.lex_number(start)
            }
            c if c.is_alphabetic() || c == '_' => self.lex_word(start),
            other => Err(LexError::UnexpectedChar {
                found: other,
                span: Span::new(start, start + other.len_utf8()),
            }),
        }
    }

    fn could_be_number(&self) -> bool {
        self.source[self.pos + 1..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit())
    }

    fn lex_string(&mut self, start: usize) -> Result<Token, LexError> {
        let quote = self.bump().unwrap();
        let mut value = String::new();
        loop {
            match self.bump() {
                None => return Err(LexError::UnterminatedString(Span::new(start, self.pos))),
                Some('\\') => match self.bump() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('r') => value.push('\r'),
                    Some(escaped) => value.push(escaped),
                    None => return Err(LexError::UnterminatedString(Span::new(start, self.pos))),
                },
                Some(c) if c == quote => break,
                Some(c) => value.push(c),
            }
        }
        Ok(Token {
            kind: TokenKind::String(value),
            span: Span::new(start, self.pos),
        })
    }

    fn lex_number(&mut self, start: usize) -> Result<Token, LexError> {
        if self.peek_char() == Some('-') {
            self.bump();
        }
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                self.bump();
            } else {
                break;
            }
        }
        if self.peek_char() == Some('.') {
            let save = self.pos;
            self.bump();
            if self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                while let Some(c) = self.peek_char() {
                    if c.is_ascii_digit() {
                        self.bump();
                    } else {
                        break;
                    }
                }
            } else {
                self.pos = save;
            }
        }
        Ok(Token {
            kind: TokenKind::Number(self.source[start..self.pos].to_string()),
            span: Span::new(start, self.pos),
        })
    }

    fn lex_word(&mut self, start: usize) -> Result<Token, LexError> {
        while let Some(c) = self.peek_char() {
            if c.is_alphanumeric() || c == '_' {
                self.bump();
            } else {
                break;
            }
        }
        let word = &self.source[start..self.pos];
        let span = Span::new(start, self.pos);
        let kind = match word.to_ascii_lowercase().as_str() {
            "true" => TokenKind::Bool(true),
            "false" => TokenKind::Bool(false),
            "null" => TokenKind::Null,
            _ => TokenKind::Identifier(word.to_string()),
        };
        Ok(Token { kind, span })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(source);
        let mut out = Vec::new();
        loop {
            let tok = lexer.next_token().unwrap();
            if tok.kind == TokenKind::Eof {
                break;
            }
            out.push(tok.kind);
        }
        out
    }

    #[test]
    fn lexes_opcode_and_path() {
        let toks = kinds("SET tags[0].name \"x\"");
        assert_eq!(
            toks,
            vec![
                TokenKind::Identifier("SET".into()),
                TokenKind::Identifier("tags".into()),
                TokenKind::LBracket,
                TokenKind::Number("0".into()),
                TokenKind::RBracket,
                TokenKind::Dot,
                TokenKind::Identifier("name".into()),
                TokenKind::String("x".into()),
            ]
        );
    }

    #[test]
    fn lexes_negative_index() {
        let toks = kinds("MOVE tags FROM -1 TO 0");
        assert!(toks.contains(&TokenKind::Number("-1".into())));
    }

    #[test]
    fn seek_resumes_tokenizing_mid_source() {
        let source = "SET a 1, SET b 2";
        let mut lexer = Lexer::new(source);
        lexer.next_token().unwrap();
        lexer.next_token().unwrap();
        lexer.next_token().unwrap();
        let comma_end = lexer.pos();
        lexer.seek(comma_end);
        let tok = lexer.next_token().unwrap();
        assert_eq!(tok.kind, TokenKind::Identifier("SET".into()));
    }

    #[test]
    fn lexes_brace_tokens_for_json_object_markers() {
        let toks = kinds("MERGE c {}");
        assert!(toks.contains(&TokenKind::LBrace));
        assert!(toks.contains(&TokenKind::RBrace));
    }
}
