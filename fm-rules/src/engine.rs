//! The rule engine (C11): orchestrates extract → template → condition →
//! action → diff for a single `(value, rule)` pair, per spec.md §4.9.

use std::time::Instant;

use chrono::{DateTime, Local};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::action::{self, ActionParseError};
use crate::condition::{self, EvalError, ParseError as ConditionParseError};
use crate::limits::Limits;
use crate::template::{self, TemplateError};
use crate::value::Value;

pub use crate::template::FileContext;

/// Per-rule options the engine consumes; `scope` is host-owned (spec.md §3
/// "Rule") and not represented here at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleOptions {
    pub backup: bool,
}

/// A rule as the engine sees it: condition/action text plus the options the
/// core actually reads. `id`, `name` and `scope` are carried through for
/// the host's own bookkeeping (e.g. in a `FileResult` log line) but the
/// engine never branches on them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub id: String,
    pub name: String,
    pub condition: String,
    pub action: String,
    pub options: RuleOptions,
}

/// The clock the core consumes for template expansion (spec.md §6). A host
/// supplies its own implementation; tests supply a fixed one so `run_rule`
/// stays deterministic.
pub trait Clock {
    fn now(&self) -> DateTime<Local>;
}

/// The host's real-time clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock that always returns the same instant, for deterministic tests.
pub struct FixedClock(pub DateTime<Local>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        self.0
    }
}

/// The outcome classification of one `run_rule` call (spec.md §4.9 step 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Warning,
    Error,
    Skipped,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Success => "success",
            Status::Warning => "warning",
            Status::Error => "error",
            Status::Skipped => "skipped",
        }
    }
}

/// The outcome of applying one rule to one value (spec.md §3 "FileResult").
#[derive(Debug, Clone)]
pub struct FileResult {
    pub status: Status,
    pub modified: bool,
    pub changes: Vec<String>,
    pub original_value: Value,
    pub new_value: Value,
    pub error: Option<String>,
    pub warning: Option<String>,
    pub duration_ms: u128,
}

/// Every way `run_rule` can fail before it ever reaches the executor; these
/// all surface as `Status::Error` with `new_value == original_value`
/// (spec.md §7 "atomic per file").
#[derive(Debug, Error)]
pub enum RuleError {
    #[error(transparent)]
    Condition(#[from] ConditionParseError),
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Action(#[from] ActionParseError),
}

/// Runs `rule` against `value` using the default [`Limits`] and the real
/// system clock. See [`run_rule_with`] for the fully parameterized form.
pub fn run_rule(rule: &Rule, value: &Value, ctx: &FileContext) -> FileResult {
    run_rule_with(rule, value, ctx, &SystemClock, &Limits::default())
}

/// Runs `rule` against `value`, per spec.md §4.9's operation sequence:
/// clone, evaluate condition (skip if false), expand templates, parse and
/// execute the action, classify the result.
#[instrument(skip(rule, value, ctx, clock, limits), fields(rule_id = %rule.id))]
pub fn run_rule_with(
    rule: &Rule,
    value: &Value,
    ctx: &FileContext,
    clock: &dyn Clock,
    limits: &Limits,
) -> FileResult {
    let start = Instant::now();
    let working = value.clone();

    if !rule.condition.trim().is_empty() {
        let condition = match condition::parse_condition(&rule.condition) {
            Ok(c) => c,
            Err(e) => return error_result(value, RuleError::from(e), start),
        };
        match condition::evaluate_with_limits(&condition, &working, limits) {
            Ok(true) => {}
            Ok(false) => {
                debug!("condition false, skipping");
                return skipped_result(value, start);
            }
            Err(e) => return error_result(value, RuleError::from(e), start),
        }
    }

    let now = clock.now();
    let expanded = match template::expand(&rule.action, &working, ctx, now) {
        Ok(s) => s,
        Err(e) => return error_result(value, RuleError::from(e), start),
    };

    let action = match action::parse_action(&expanded) {
        Ok(a) => a,
        Err(e) => return error_result(value, RuleError::from(e), start),
    };

    let mut mutated = working;
    let outcome = action::execute(&action, &mut mutated);

    if !outcome.success {
        let message = outcome.error.unwrap_or_else(|| "action failed".to_string());
        return FileResult {
            status: Status::Error,
            modified: false,
            changes: outcome.changes,
            original_value: value.clone(),
            new_value: value.clone(),
            error: Some(message),
            warning: None,
            duration_ms: start.elapsed().as_millis(),
        };
    }

    let status = match (outcome.modified, &outcome.warning) {
        (_, Some(_)) => Status::Warning,
        (false, None) => Status::Skipped,
        (true, None) => Status::Success,
    };

    FileResult {
        status,
        modified: outcome.modified,
        changes: outcome.changes,
        original_value: value.clone(),
        new_value: mutated,
        error: None,
        warning: outcome.warning,
        duration_ms: start.elapsed().as_millis(),
    }
}

fn error_result(original: &Value, err: RuleError, start: Instant) -> FileResult {
    FileResult {
        status: Status::Error,
        modified: false,
        changes: Vec::new(),
        original_value: original.clone(),
        new_value: original.clone(),
        error: Some(err.to_string()),
        warning: None,
        duration_ms: start.elapsed().as_millis(),
    }
}

fn skipped_result(original: &Value, start: Instant) -> FileResult {
    FileResult {
        status: Status::Skipped,
        modified: false,
        changes: Vec::new(),
        original_value: original.clone(),
        new_value: original.clone(),
        error: None,
        warning: None,
        duration_ms: start.elapsed().as_millis(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use indexmap::IndexMap;

    fn map(pairs: &[(&str, Value)]) -> Value {
        let mut m = IndexMap::new();
        for (k, v) in pairs {
            m.insert(k.to_string(), v.clone());
        }
        Value::Map(m)
    }

    fn rule(condition: &str, action: &str) -> Rule {
        Rule {
            id: "r1".to_string(),
            name: "test rule".to_string(),
            condition: condition.to_string(),
            action: action.to_string(),
            options: RuleOptions::default(),
        }
    }

    fn clock() -> FixedClock {
        FixedClock(Local.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn conditional_set_applies_when_condition_holds() {
        let v = map(&[("status", Value::String("draft".into()))]);
        let r = rule(r#"status = "draft""#, r#"SET status "reviewed""#);
        let result = run_rule_with(&r, &v, &FileContext::default(), &clock(), &Limits::default());
        assert_eq!(result.status, Status::Success);
        assert_eq!(
            result.new_value,
            map(&[("status", Value::String("reviewed".into()))])
        );
    }

    #[test]
    fn conditional_set_skips_when_condition_false() {
        let v = map(&[("status", Value::String("published".into()))]);
        let r = rule(r#"status = "draft""#, r#"SET status "reviewed""#);
        let result = run_rule_with(&r, &v, &FileContext::default(), &clock(), &Limits::default());
        assert_eq!(result.status, Status::Skipped);
        assert_eq!(result.new_value, v);
        assert!(!result.modified);
    }

    #[test]
    fn append_to_non_array_is_an_error_and_value_is_unchanged() {
        let v = map(&[("status", Value::String("draft".into()))]);
        let r = rule("", r#"APPEND status "x""#);
        let result = run_rule_with(&r, &v, &FileContext::default(), &clock(), &Limits::default());
        assert_eq!(result.status, Status::Error);
        assert_eq!(result.new_value, result.original_value);
    }

    #[test]
    fn remove_missing_value_is_a_warning() {
        let v = map(&[("tags", Value::Seq(vec![Value::String("a".into())]))]);
        let r = rule("", r#"REMOVE tags "z""#);
        let result = run_rule_with(&r, &v, &FileContext::default(), &clock(), &Limits::default());
        assert_eq!(result.status, Status::Warning);
        assert_eq!(result.new_value, v);
    }

    #[test]
    fn empty_condition_always_runs_the_action() {
        let v = map(&[]);
        let r = rule("", r#"SET status "done""#);
        let result = run_rule_with(&r, &v, &FileContext::default(), &clock(), &Limits::default());
        assert_eq!(result.status, Status::Success);
    }

    #[test]
    fn template_expansion_happens_before_action_parsing() {
        let v = map(&[]);
        let ctx = FileContext {
            basename: "my-note".to_string(),
            path: "notes/my-note.md".to_string(),
            folder: "notes".to_string(),
            vault_name: "Vault".to_string(),
        };
        let r = rule("", r#"SET title "{{filename}}""#);
        let result = run_rule_with(&r, &v, &ctx, &clock(), &Limits::default());
        assert_eq!(result.status, Status::Success);
        assert_eq!(
            result.new_value,
            map(&[("title", Value::String("my-note".into()))])
        );
    }

    #[test]
    fn determinism_same_inputs_yield_same_result() {
        let v = map(&[("tags", Value::Seq(vec![Value::String("a".into())]))]);
        let r = rule("", r#"APPEND tags "b""#);
        let a = run_rule_with(&r, &v, &FileContext::default(), &clock(), &Limits::default());
        let b = run_rule_with(&r, &v, &FileContext::default(), &clock(), &Limits::default());
        assert_eq!(a.new_value, b.new_value);
        assert_eq!(a.status, b.status);
    }
}
