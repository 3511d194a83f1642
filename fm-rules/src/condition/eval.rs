//! The condition evaluator (C6): truth tables over a [`Value`].

use thiserror::Error;

use crate::condition::ast::{CompareOp, Condition, QuantifierKind};
use crate::condition::regex_guard::{self, RegexGuardError};
use crate::limits::Limits;
use crate::literal::Literal;
use crate::path::{self, Path};
use crate::value::Value;

#[derive(Debug, Error, PartialEq)]
pub enum EvalError {
    #[error("regex error: {0}")]
    Regex(#[from] RegexGuardError),
}

/// Evaluates `condition` against `value` using the default [`Limits`].
pub fn evaluate(condition: &Condition, value: &Value) -> Result<bool, EvalError> {
    evaluate_with_limits(condition, value, &Limits::default())
}

pub fn evaluate_with_limits(
    condition: &Condition,
    value: &Value,
    limits: &Limits,
) -> Result<bool, EvalError> {
    match condition {
        Condition::Comparison { left, op, right } => {
            eval_comparison(value, left, *op, right, limits)
        }
        Condition::Existence { path, negated } => {
            let result = path::exists(value, path);
            Ok(result != *negated)
        }
        Condition::TypeCheck {
            path,
            kind,
            negated,
        } => {
            let result = path::resolve_owned(value, path)
                .map(|v| v.is_kind(*kind))
                .unwrap_or(false);
            Ok(result != *negated)
        }
        Condition::EmptyCheck { path, negated } => {
            let result = match path::resolve_owned(value, path) {
                None => false,
                Some(v) => v.is_empty_value(),
            };
            Ok(result != *negated)
        }
        Condition::Has {
            path,
            value: lit,
            negated,
        } => {
            let target = path::resolve_owned(value, path);
            let result = match target {
                Some(Value::Seq(items)) => {
                    let needle = lit.clone().into_value();
                    items.iter().any(|item| item.value_eq(&needle))
                }
                _ => false,
            };
            Ok(result != *negated)
        }
        Condition::Quantifier { kind, array, body } => {
            eval_quantifier(value, *kind, array, body, limits)
        }
        Condition::Not(inner) => Ok(!evaluate_with_limits(inner, value, limits)?),
        Condition::And(l, r) => {
            Ok(evaluate_with_limits(l, value, limits)? && evaluate_with_limits(r, value, limits)?)
        }
        Condition::Or(l, r) => {
            Ok(evaluate_with_limits(l, value, limits)? || evaluate_with_limits(r, value, limits)?)
        }
    }
}

fn eval_comparison(
    value: &Value,
    left: &Path,
    op: CompareOp,
    right: &Literal,
    limits: &Limits,
) -> Result<bool, EvalError> {
    let resolved = path::resolve_owned(value, left);

    if op == CompareOp::Regex {
        let Literal::Regex { pattern, flags } = right else {
            return Ok(false);
        };
        let Some(text) = resolved.as_ref().and_then(Value::as_str) else {
            return Ok(false);
        };
        let compiled = regex_guard::get_or_compile(pattern, flags)?;
        return Ok(regex_guard::timed_is_match(&compiled, text, limits)?);
    }

    let Some(left_value) = resolved else {
        // Absent: `!=` is true, everything else false.
        return Ok(op == CompareOp::Ne);
    };

    let right_value = right.clone().into_value();

    match op {
        CompareOp::Eq => Ok(left_value.value_eq(&right_value)),
        CompareOp::Ne => Ok(!left_value.value_eq(&right_value)),
        CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge => {
            match (left_value.as_f64(), right_value.as_f64()) {
                (Some(a), Some(b)) => Ok(match op {
                    CompareOp::Lt => a < b,
                    CompareOp::Le => a <= b,
                    CompareOp::Gt => a > b,
                    CompareOp::Ge => a >= b,
                    _ => unreachable!(),
                }),
                _ => Ok(false),
            }
        }
        CompareOp::Regex => unreachable!("handled above"),
    }
}

fn eval_quantifier(
    value: &Value,
    kind: QuantifierKind,
    array: &Path,
    body: &Condition,
    limits: &Limits,
) -> Result<bool, EvalError> {
    let Some(Value::Seq(items)) = path::resolve_owned(value, array) else {
        return Ok(false);
    };

    if items.is_empty() {
        return Ok(false);
    }

    match kind {
        QuantifierKind::Any => {
            for item in &items {
                if evaluate_with_limits(body, item, limits)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        QuantifierKind::All => {
            for item in &items {
                if !evaluate_with_limits(body, item, limits)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::parser::parse_condition;
    use indexmap::IndexMap;

    fn map(pairs: &[(&str, Value)]) -> Value {
        let mut m = IndexMap::new();
        for (k, v) in pairs {
            m.insert(k.to_string(), v.clone());
        }
        Value::Map(m)
    }

    #[test]
    fn missing_comparison_makes_ne_true_and_others_false() {
        let v = map(&[]);
        assert!(evaluate(&parse_condition("status != \"x\"").unwrap(), &v).unwrap());
        assert!(!evaluate(&parse_condition("status = \"x\"").unwrap(), &v).unwrap());
    }

    #[test]
    fn empty_check_truth_table() {
        let cases: Vec<(Value, bool)> = vec![
            (Value::Null, false),
            (Value::Seq(vec![]), true),
            (Value::Seq(vec![Value::Null]), false),
            (Value::String(String::new()), true),
            (Value::Map(IndexMap::new()), true),
            (Value::Int(0), false),
        ];
        for (val, expect_empty) in cases {
            let v = map(&[("f", val)]);
            assert_eq!(
                evaluate(&parse_condition("f empty").unwrap(), &v).unwrap(),
                expect_empty
            );
            assert_eq!(
                evaluate(&parse_condition("f !empty").unwrap(), &v).unwrap(),
                !expect_empty
            );
        }
    }

    #[test]
    fn missing_path_empty_check_is_false_but_negated_is_true() {
        let v = map(&[]);
        assert!(!evaluate(&parse_condition("f empty").unwrap(), &v).unwrap());
        assert!(evaluate(&parse_condition("f !empty").unwrap(), &v).unwrap());
    }

    #[test]
    fn has_checks_array_membership_by_value() {
        let v = map(&[("tags", Value::Seq(vec![Value::String("a".into())]))]);
        assert!(evaluate(&parse_condition("tags has \"a\"").unwrap(), &v).unwrap());
        assert!(!evaluate(&parse_condition("tags has \"z\"").unwrap(), &v).unwrap());
        assert!(evaluate(&parse_condition("tags !has \"z\"").unwrap(), &v).unwrap());
    }

    #[test]
    fn nested_any_quantifier_matches_spec_scenario_8() {
        let v = map(&[(
            "projects",
            Value::Seq(vec![
                map(&[(
                    "tasks",
                    Value::Seq(vec![map(&[("status", Value::String("done".into()))])]),
                )]),
                map(&[(
                    "tasks",
                    Value::Seq(vec![map(&[("status", Value::String("pending".into()))])]),
                )]),
            ]),
        )]);
        let cond =
            parse_condition("ANY projects WHERE ANY tasks WHERE status = \"pending\"").unwrap();
        assert!(evaluate(&cond, &v).unwrap());
    }

    #[test]
    fn all_quantifier_over_empty_array_is_false() {
        let v = map(&[("xs", Value::Seq(vec![]))]);
        assert!(!evaluate(&parse_condition("ALL xs WHERE a = 1").unwrap(), &v).unwrap());
    }

    #[test]
    fn numeric_equality_coerces_int_and_float() {
        let v = map(&[("n", Value::Int(3))]);
        assert!(evaluate(&parse_condition("n = 3.0").unwrap(), &v).unwrap());
    }

    #[test]
    fn regex_matches_against_string_field() {
        let v = map(&[("title", Value::String("Hello World".into()))]);
        assert!(evaluate(&parse_condition("title ~ /^Hello/").unwrap(), &v).unwrap());
        assert!(!evaluate(&parse_condition("title ~ /^Bye/").unwrap(), &v).unwrap());
    }
}
