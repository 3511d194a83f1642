//! The path resolver (C2): `segments ::= head ( '.' field | '[' signed_int ']' )*`.

use std::fmt::{self, Display};

use indexmap::IndexMap;
use thiserror::Error;

use crate::limits::Limits;
use crate::span::Span;
use crate::value::Value;

/// One step of a parsed [`Path`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Field(String),
    Index(i64),
    /// The `length` pseudo-field, legal only as the final segment.
    Length,
}

impl Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Field(name) => write!(f, ".{name}"),
            Segment::Index(i) => write!(f, "[{i}]"),
            Segment::Length => write!(f, ".length"),
        }
    }
}

/// A parsed path: a sequence of [`Segment`]s navigating nested maps and
/// sequences.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Path {
    pub segments: Vec<Segment>,
}

impl Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.segments.iter().enumerate() {
            match seg {
                Segment::Field(name) if i == 0 => write!(f, "{name}")?,
                Segment::Length if i == 0 => write!(f, "length")?,
                other => write!(f, "{other}")?,
            }
        }
        Ok(())
    }
}

/// Error raised while parsing a path's serialized form.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("unclosed bracket in path at {0}")]
    UnclosedBracket(Span),
    #[error("non-integer index in path at {0}")]
    NonIntegerIndex(Span),
    #[error("path depth {found} exceeds the limit of {limit}")]
    DepthExceeded { found: usize, limit: usize },
    #[error("path length {found} exceeds the limit of {limit}")]
    LengthExceeded { found: usize, limit: usize },
    #[error("unexpected character {found:?} in path at {span}")]
    UnexpectedChar { found: char, span: Span },
}

/// Parses a path's serialized form (`a.b[0].c[-1]`). An empty string yields
/// zero segments. Whitespace is not permitted inside a path.
pub fn parse_path(text: &str) -> Result<Path, PathError> {
    parse_path_with_limits(text, &Limits::default())
}

pub fn parse_path_with_limits(text: &str, limits: &Limits) -> Result<Path, PathError> {
    if text.len() > limits.max_path_length {
        return Err(PathError::LengthExceeded {
            found: text.len(),
            limit: limits.max_path_length,
        });
    }

    let mut segments = Vec::new();
    let bytes = text.as_bytes();
    let mut pos = 0usize;

    if text.is_empty() {
        return Ok(Path { segments });
    }

    // The head: a bare field name (no leading dot), unless the path starts
    // directly with a bracketed index.
    if bytes[pos] != b'[' {
        let (name, next) = read_field(text, pos);
        segments.push(field_or_length(name));
        pos = next;
    }

    while pos < bytes.len() {
        match bytes[pos] {
            b'.' => {
                pos += 1;
                let (name, next) = read_field(text, pos);
                if name.is_empty() {
                    return Err(PathError::UnexpectedChar {
                        found: '.',
                        span: Span::at(pos),
                    });
                }
                segments.push(field_or_length(name));
                pos = next;
            }
            b'[' => {
                let close = text[pos..]
                    .find(']')
                    .map(|rel| pos + rel)
                    .ok_or(PathError::UnclosedBracket(Span::new(pos, text.len())))?;
                let inner = &text[pos + 1..close];
                let idx: i64 = inner
                    .parse()
                    .map_err(|_| PathError::NonIntegerIndex(Span::new(pos + 1, close)))?;
                segments.push(Segment::Index(idx));
                pos = close + 1;
            }
            other => {
                return Err(PathError::UnexpectedChar {
                    found: other as char,
                    span: Span::at(pos),
                });
            }
        }
    }

    if segments.len() > limits.max_path_depth {
        return Err(PathError::DepthExceeded {
            found: segments.len(),
            limit: limits.max_path_depth,
        });
    }

    Ok(Path { segments })
}

fn field_or_length(name: &str) -> Segment {
    if name == "length" {
        Segment::Length
    } else {
        Segment::Field(name.to_string())
    }
}

fn read_field(text: &str, start: usize) -> (&str, usize) {
    let rest = &text[start..];
    let end = rest
        .find(|c| c == '.' || c == '[')
        .map(|rel| start + rel)
        .unwrap_or(text.len());
    (&text[start..end], end)
}

/// Normalizes a possibly-negative index against a container of length `len`.
/// Returns `None` if out of range after normalization.
fn normalize_index(i: i64, len: usize) -> Option<usize> {
    let resolved = if i < 0 { i + len as i64 } else { i };
    if resolved < 0 || resolved as usize >= len {
        None
    } else {
        Some(resolved as usize)
    }
}

/// Reads the value at `path` within `value`. `Index` on a non-sequence or
/// `Field` on a non-map returns `None`, as does an out-of-range index.
pub fn resolve<'a>(value: &'a Value, path: &Path) -> Option<&'a Value> {
    let mut current = value;
    for seg in &path.segments {
        current = match seg {
            Segment::Field(name) => current.as_map()?.get(name)?,
            Segment::Index(i) => {
                let seq = current.as_seq()?;
                let idx = normalize_index(*i, seq.len())?;
                &seq[idx]
            }
            Segment::Length => return None,
        };
    }
    Some(current)
}

/// Like [`resolve`], but also resolves a trailing `length` segment into a
/// transient `Int` value (so conditions like `tags.length > 2` work without
/// needing a reference into the tree).
pub fn resolve_owned(value: &Value, path: &Path) -> Option<Value> {
    if let Some((last, prefix)) = path.segments.split_last() {
        if *last == Segment::Length {
            let prefix_path = Path {
                segments: prefix.to_vec(),
            };
            let target = if prefix.is_empty() {
                Some(value)
            } else {
                resolve(value, &prefix_path)
            };
            return target.and_then(Value::length).map(Value::Int);
        }
    }
    resolve(value, path).cloned()
}

/// Returns `true` iff `path` resolves to a present entry, including an
/// explicit `Null` (presence, not truthiness).
pub fn exists(value: &Value, path: &Path) -> bool {
    if path.segments.is_empty() {
        return true;
    }
    resolve_owned(value, path).is_some()
}

/// Writes `new` at `path`, auto-vivifying missing parents: a missing parent
/// becomes a new map if the next segment is a field, a new sequence if the
/// next segment is an index. Writing `[i]` with `i >= len` extends the
/// sequence with `Null` fillers. An empty path is a no-op.
pub fn set(value: &mut Value, path: &Path, new: Value) {
    if path.segments.is_empty() {
        return;
    }
    set_rec(value, &path.segments, new);
}

fn set_rec(value: &mut Value, segments: &[Segment], new: Value) {
    let (seg, rest) = match segments.split_first() {
        Some(pair) => pair,
        None => {
            *value = new;
            return;
        }
    };

    match seg {
        Segment::Field(name) => {
            if !matches!(value, Value::Map(_)) {
                *value = Value::Map(IndexMap::new());
            }
            let map = value.as_map_mut().expect("just vivified");
            if rest.is_empty() {
                map.insert(name.clone(), new);
            } else {
                let entry = map.entry(name.clone()).or_insert(Value::Null);
                set_rec(entry, rest, new);
            }
        }
        Segment::Index(i) => {
            if !matches!(value, Value::Seq(_)) {
                *value = Value::Seq(Vec::new());
            }
            let seq = value.as_seq_mut().expect("just vivified");
            let idx = if *i < 0 { *i + seq.len() as i64 } else { *i };
            if idx < 0 {
                // Out-of-range negative index: nothing sane to do; ignore the
                // write rather than panic, matching the resolver's tolerant
                // treatment of out-of-bounds indices elsewhere.
                return;
            }
            let idx = idx as usize;
            while seq.len() <= idx {
                seq.push(Value::Null);
            }
            if rest.is_empty() {
                seq[idx] = new;
            } else {
                set_rec(&mut seq[idx], rest, new);
            }
        }
        Segment::Length => {
            // `length` is read-only; a write through it is a no-op.
        }
    }
}

/// Deletes the entry at `path`. Returns `false` if any prefix is missing or
/// the final parent is the wrong kind, or the index/key itself is absent.
pub fn delete(value: &mut Value, path: &Path) -> bool {
    let Some((last, prefix)) = path.segments.split_last() else {
        return false;
    };
    let prefix_path = Path {
        segments: prefix.to_vec(),
    };
    let Some(parent) = resolve_mut(value, &prefix_path) else {
        return false;
    };

    match last {
        Segment::Field(name) => match parent.as_map_mut() {
            Some(map) => map.shift_remove(name).is_some(),
            None => false,
        },
        Segment::Index(i) => match parent.as_seq_mut() {
            Some(seq) => match normalize_index(*i, seq.len()) {
                Some(idx) => {
                    seq.remove(idx);
                    true
                }
                None => false,
            },
            None => false,
        },
        Segment::Length => false,
    }
}

fn resolve_mut<'a>(value: &'a mut Value, path: &Path) -> Option<&'a mut Value> {
    let mut current = value;
    for seg in &path.segments {
        current = match seg {
            Segment::Field(name) => current.as_map_mut()?.get_mut(name)?,
            Segment::Index(i) => {
                let len = current.as_seq()?.len();
                let idx = normalize_index(*i, len)?;
                &mut current.as_seq_mut()?[idx]
            }
            Segment::Length => return None,
        };
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_value(pairs: &[(&str, Value)]) -> Value {
        Value::Map(pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
    }

    #[test]
    fn parses_dotted_and_bracketed_path() {
        let path = parse_path("a.b[0].c[-1]").unwrap();
        assert_eq!(
            path.segments,
            vec![
                Segment::Field("a".into()),
                Segment::Field("b".into()),
                Segment::Index(0),
                Segment::Field("c".into()),
                Segment::Index(-1),
            ]
        );
    }

    #[test]
    fn empty_string_yields_zero_segments() {
        assert_eq!(parse_path("").unwrap().segments.len(), 0);
    }

    #[test]
    fn unclosed_bracket_is_an_error() {
        assert!(matches!(
            parse_path("a[0"),
            Err(PathError::UnclosedBracket(_))
        ));
    }

    #[test]
    fn depth_and_length_limits_reject_oversized_paths() {
        let limits = Limits {
            max_path_depth: 2,
            ..Limits::default()
        };
        let err = parse_path_with_limits("a.b.c", &limits).unwrap_err();
        assert!(matches!(err, PathError::DepthExceeded { .. }));
    }

    #[test]
    fn resolve_handles_negative_indices() {
        let v = Value::Seq(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        let path = parse_path("[-1]").unwrap();
        assert_eq!(resolve(&v, &path), Some(&Value::Int(3)));
    }

    #[test]
    fn set_auto_vivifies_through_missing_parents() {
        let mut v = Value::Null;
        let path = parse_path("a.b[2]").unwrap();
        set(&mut v, &path, Value::Int(9));
        let expected = map_value(&[(
            "a",
            map_value(&[(
                "b",
                Value::Seq(vec![Value::Null, Value::Null, Value::Int(9)]),
            )]),
        )]);
        assert_eq!(v, expected);
    }

    #[test]
    fn exists_is_true_for_explicit_null() {
        let v = map_value(&[("a", Value::Null)]);
        let path = parse_path("a").unwrap();
        assert!(exists(&v, &path));
        let missing = parse_path("b").unwrap();
        assert!(!exists(&v, &missing));
    }

    #[test]
    fn delete_removes_key_and_reports_absence() {
        let mut v = map_value(&[("a", Value::Int(1))]);
        let path = parse_path("a").unwrap();
        assert!(delete(&mut v, &path));
        assert!(!delete(&mut v, &path));
    }

    #[test]
    fn length_segment_reads_size() {
        let v = map_value(&[("tags", Value::Seq(vec![Value::Int(1), Value::Int(2)]))]);
        let path = parse_path("tags.length").unwrap();
        assert_eq!(resolve_owned(&v, &path), Some(Value::Int(2)));
    }
}
