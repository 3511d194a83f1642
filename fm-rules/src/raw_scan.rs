//! Raw-text scanning helpers shared by the action parser.
//!
//! The action grammar embeds two other sub-languages verbatim inside its own
//! source text: a JSON literal (`{…}` / `[…]`, for `MERGE`'s object operand
//! and any array/object value) and a condition (the `WHERE …` clause of
//! `MOVE_WHERE`/`UPDATE_WHERE`). Rather than teach the action lexer the full
//! token vocabulary of both sub-languages, the action parser locates their
//! textual extent directly — balanced-bracket matching for JSON, keyword
//! boundary scanning for conditions — and hands the substring to the real
//! parser for that sub-language.

use thiserror::Error;

use crate::span::Span;

#[derive(Debug, Error, PartialEq)]
pub enum RawScanError {
    #[error("unbalanced brackets starting at {0}")]
    Unbalanced(Span),
    #[error("unterminated string literal starting at {0}")]
    UnterminatedString(Span),
}

/// `start` must point at an opening `{` or `[`. Returns the byte offset just
/// past the matching closing bracket, treating `{}` and `[]` as
/// interchangeable depth markers (a mismatched pair is caught later by the
/// JSON parser, not here).
pub fn capture_balanced(source: &str, start: usize) -> Result<usize, RawScanError> {
    let mut i = start;
    let mut depth = 0i32;

    loop {
        let Some(c) = source[i..].chars().next() else {
            return Err(RawScanError::Unbalanced(Span::new(start, source.len())));
        };
        match c {
            '"' | '\'' => {
                i = skip_string(source, i)?;
            }
            '{' | '[' => {
                depth += 1;
                i += c.len_utf8();
            }
            '}' | ']' => {
                depth -= 1;
                i += c.len_utf8();
                if depth == 0 {
                    return Ok(i);
                }
            }
            other => {
                i += other.len_utf8();
            }
        }
    }
}

/// Scans from `start` for the first occurrence, at bracket depth 0 and
/// outside any string/regex literal, of a whole word matching one of
/// `terminators` (case-insensitive). Returns the byte offset the terminator
/// word starts at, or `source.len()` if none is found.
pub fn capture_until_keyword(source: &str, start: usize, terminators: &[&str]) -> usize {
    let mut i = start;
    let mut depth = 0i32;

    while i < source.len() {
        let Some(c) = source[i..].chars().next() else {
            break;
        };
        match c {
            '"' | '\'' => match skip_string(source, i) {
                Ok(next) => i = next,
                Err(_) => return source.len(),
            },
            '/' => match skip_regex(source, i) {
                Some(next) => i = next,
                None => i += c.len_utf8(),
            },
            '(' | '[' | '{' => {
                depth += 1;
                i += c.len_utf8();
            }
            ')' | ']' | '}' => {
                depth -= 1;
                i += c.len_utf8();
            }
            _ if depth == 0 && is_word_char(c) => {
                let word_start = i;
                while i < source.len() {
                    let Some(wc) = source[i..].chars().next() else {
                        break;
                    };
                    if is_word_char(wc) {
                        i += wc.len_utf8();
                    } else {
                        break;
                    }
                }
                let word = &source[word_start..i];
                if terminators.iter().any(|t| word.eq_ignore_ascii_case(t)) {
                    return word_start;
                }
            }
            _ => {
                i += c.len_utf8();
            }
        }
    }

    source.len()
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn skip_string(source: &str, start: usize) -> Result<usize, RawScanError> {
    let quote = source[start..].chars().next().unwrap();
    let mut i = start + quote.len_utf8();
    loop {
        let Some(c) = source[i..].chars().next() else {
            return Err(RawScanError::UnterminatedString(Span::new(start, source.len())));
        };
        if c == '\\' {
            i += c.len_utf8();
            if let Some(escaped) = source[i..].chars().next() {
                i += escaped.len_utf8();
            } else {
                return Err(RawScanError::UnterminatedString(Span::new(start, source.len())));
            }
        } else if c == quote {
            i += c.len_utf8();
            return Ok(i);
        } else {
            i += c.len_utf8();
        }
    }
}

/// Skips a `/pattern/flags` regex literal starting at `start` (which must
/// point at `/`). Returns `None` if this `/` does not open a well-formed
/// regex literal (no division operator exists in either DSL, so any
/// unterminated `/` is simply treated as an ordinary character).
fn skip_regex(source: &str, start: usize) -> Option<usize> {
    let mut i = start + 1;
    loop {
        let c = source[i..].chars().next()?;
        if c == '\\' {
            i += 1;
            let escaped = source[i..].chars().next()?;
            i += escaped.len_utf8();
        } else if c == '/' {
            i += 1;
            break;
        } else {
            i += c.len_utf8();
        }
    }
    while let Some(c) = source[i..].chars().next() {
        if c.is_ascii_alphabetic() {
            i += c.len_utf8();
        } else {
            break;
        }
    }
    Some(i)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_nested_json_object() {
        let src = r#"MERGE c {"ui": {"fontSize": 16}} extra"#;
        let start = src.find('{').unwrap();
        let end = capture_balanced(src, start).unwrap();
        assert_eq!(&src[start..end], r#"{"ui": {"fontSize": 16}}"#);
    }

    #[test]
    fn finds_top_level_terminator_keyword() {
        let src = "WHERE name = \"A\" SET status \"done\"";
        let where_end = capture_until_keyword(src, 0, &["SET"]);
        assert_eq!(&src[..where_end], "WHERE name = \"A\" ");
    }

    #[test]
    fn ignores_terminator_words_inside_strings() {
        let src = r#"name = "please SET this" SET status "done""#;
        let end = capture_until_keyword(src, 0, &["SET"]);
        assert_eq!(&src[..end], r#"name = "please SET this" "#);
    }

    #[test]
    fn ignores_terminator_words_inside_regex_literals() {
        let src = r#"title ~ /SET[a-z]+/ SET status "done""#;
        let end = capture_until_keyword(src, 0, &["SET"]);
        assert_eq!(&src[..end], r#"title ~ /SET[a-z]+/ "#);
    }
}
