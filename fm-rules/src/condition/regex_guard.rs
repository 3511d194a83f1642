//! Regex pattern guard and a process-wide compiled-pattern cache.
//!
//! Grounded on the pack's `regex_cache` pattern: a global, thread-safe cache
//! of compiled patterns so repeated rule evaluation against the same
//! pattern text does not recompile it. `regex` is already linear-time and
//! cannot backtrack, so the deny-list and length cap below are a floor
//! against obviously pathological *authoring* (huge alternations, stacked
//! quantifiers) rather than a defense against `regex` itself looping.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use regex::Regex;
use thiserror::Error;

use crate::limits::Limits;

lazy_static::lazy_static! {
    static ref REGEX_CACHE: RwLock<HashMap<String, Regex>> = RwLock::new(HashMap::new());
}

#[derive(Debug, Error, PartialEq)]
pub enum RegexGuardError {
    #[error("pattern length {found} exceeds the limit of {limit}")]
    TooLong { found: usize, limit: usize },
    #[error("pattern contains a denied construct: {construct}")]
    DeniedConstruct { construct: &'static str },
    #[error("invalid regex syntax: {0}")]
    Invalid(String),
    #[error("regex execution timeout")]
    Timeout,
}

const DENIED_SUBSTRINGS: [&str; 6] = ["+*", "*+", "++", "**", ".*.*", "{n,}"];

/// Rejects patterns longer than `max_regex_length`, or matching a deny-list
/// of pathological shapes: nested quantifiers (`+*`, `*+`), repeated `.*`
/// pairs, or repeated quantifier characters (`++`, `**`). Also rejects any
/// unbounded unquantified repetition range `{n,}`.
pub fn validate(pattern: &str, limits: &Limits) -> Result<(), RegexGuardError> {
    if pattern.len() > limits.max_regex_length {
        return Err(RegexGuardError::TooLong {
            found: pattern.len(),
            limit: limits.max_regex_length,
        });
    }

    for construct in DENIED_SUBSTRINGS.iter().copied().filter(|c| *c != "{n,}") {
        if pattern.contains(construct) {
            return Err(RegexGuardError::DeniedConstruct { construct });
        }
    }

    if has_unbounded_repetition_range(pattern) {
        return Err(RegexGuardError::DeniedConstruct { construct: "{n,}" });
    }

    Regex::new(pattern).map_err(|e| RegexGuardError::Invalid(e.to_string()))?;

    Ok(())
}

fn has_unbounded_repetition_range(pattern: &str) -> bool {
    let bytes = pattern.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' {
            if let Some(close) = pattern[i..].find('}') {
                let body = &pattern[i + 1..i + close];
                if body.ends_with(',') && body[..body.len() - 1].chars().all(|c| c.is_ascii_digit()) && !body[..body.len()-1].is_empty() {
                    return true;
                }
                i += close;
            }
        }
        i += 1;
    }
    false
}

/// Gets a compiled pattern from the cache, compiling and caching it if
/// absent. Flags (`imsx`) are applied as an inline group, filtering to the
/// subset `regex` understands; an unsupported flag character is ignored
/// rather than rejected (the DSL's `/pattern/flags` syntax is borrowed from
/// ECMAScript regex literals, which support flags `regex` has no concept
/// of, e.g. `g`).
pub fn get_or_compile(pattern: &str, flags: &str) -> Result<Regex, RegexGuardError> {
    let supported: String = flags.chars().filter(|c| "imsx".contains(*c)).collect();
    let key = if supported.is_empty() {
        pattern.to_string()
    } else {
        format!("(?{supported}){pattern}")
    };

    {
        let cache = REGEX_CACHE.read().expect("regex cache poisoned");
        if let Some(re) = cache.get(&key) {
            return Ok(re.clone());
        }
    }

    let compiled = Regex::new(&key).map_err(|e| RegexGuardError::Invalid(e.to_string()))?;
    let mut cache = REGEX_CACHE.write().expect("regex cache poisoned");
    cache.entry(key).or_insert_with(|| compiled.clone());
    Ok(compiled)
}

/// Runs `regex.is_match(text)`, failing with [`RegexGuardError::Timeout`] if
/// the call's wall-clock duration exceeds `regex_timeout_ms`. `regex`
/// guarantees linear time in the input length, so this only fires against
/// truly enormous inputs, but the budget is enforced unconditionally per
/// the specification.
pub fn timed_is_match(re: &Regex, text: &str, limits: &Limits) -> Result<bool, RegexGuardError> {
    let budget = Duration::from_millis(limits.regex_timeout_ms);
    let start = Instant::now();
    let result = re.is_match(text);
    if start.elapsed() > budget {
        return Err(RegexGuardError::Timeout);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_overlong_pattern() {
        let limits = Limits {
            max_regex_length: 5,
            ..Limits::default()
        };
        let err = validate("abcdef", &limits).unwrap_err();
        assert!(matches!(err, RegexGuardError::TooLong { .. }));
    }

    #[test]
    fn rejects_denied_constructs() {
        assert!(validate("a++", &Limits::default()).is_err());
        assert!(validate("a.*.*b", &Limits::default()).is_err());
        assert!(validate("a{2,}", &Limits::default()).is_err());
    }

    #[test]
    fn accepts_bounded_repetition() {
        assert!(validate("a{2,5}", &Limits::default()).is_ok());
    }

    #[test]
    fn cache_returns_equivalent_compiled_pattern() {
        let a = get_or_compile(r"^foo\d+$", "").unwrap();
        let b = get_or_compile(r"^foo\d+$", "").unwrap();
        assert_eq!(a.as_str(), b.as_str());
        assert!(a.is_match("foo42"));
    }
}
