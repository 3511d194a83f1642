#![forbid(unsafe_code)]

//! # fm-rules: a rule engine for bulk mutation of Markdown front-matter
//!
//! `fm-rules` evaluates small textual rules — a condition and an action,
//! both in their own tiny DSLs — against the parsed YAML front matter of a
//! Markdown note and produces a new, mutated value plus a human-readable
//! log of what changed. It never touches a filesystem, never walks a
//! directory tree, and never schedules anything: all of that is a host's
//! job. This crate is the part that decides, given one note and one rule,
//! what the resulting front matter should be.
//!
//! ## How to use this crate
//!
//! If you already have a parsed front-matter [`Value`] and a rule's
//! condition/action text, [`engine::run_rule`] is the one-stop entry
//! point: it evaluates the condition, expands any `{{...}}` templates in
//! the action, parses and applies the action, and returns a
//! [`engine::FileResult`] classified as success, warning, error or
//! skipped.
//!
//! For the common case of a whole Markdown file on disk, [`frontmatter`]
//! splits the raw text into front matter and body, and joins them back
//! together afterward without disturbing a single byte of the body.
//!
//! A host that persists rules as a JSON document edited through its own
//! settings UI will want [`rule_storage::RuleFile`], which tolerates
//! partially corrupt entries by dropping them rather than failing the
//! whole load.
//!
//! ## Layout
//!
//! - [`value`] — the dynamic [`Value`] every other module operates on.
//! - [`path`] — dotted/bracketed path resolution into a [`Value`].
//! - [`literal`] — the literal grammar shared by conditions and actions.
//! - [`condition`] — the predicate language (`lexer`/`parser`/`eval`) and
//!   its regular-expression guard.
//! - [`action`] — the mutation language (`lexer`/`parser`/`exec`).
//! - [`template`] — `{{name}}` placeholder expansion in action text.
//! - [`engine`] — orchestrates a full condition → template → action run.
//! - [`frontmatter`] — splits/joins a Markdown note's YAML front matter.
//! - [`rule_storage`] — the host-facing JSON rule document shape.
//!
//! Everything in this crate is deterministic given its inputs (including
//! the clock, which the engine takes as a parameter): running the same
//! rule against the same value twice always produces the same result.

pub mod action;
pub mod condition;
pub mod engine;
pub mod frontmatter;
pub mod limits;
pub mod literal;
pub mod path;
/// Balanced-bracket and keyword-boundary text scanning shared by the
/// action parser when it hands a slice of source off to another
/// sub-language's parser (embedded JSON literals, embedded `WHERE`
/// conditions).
mod raw_scan;
pub mod rule_storage;
/// Byte-offset spans used in error messages across every parser in this
/// crate.
pub mod span;
pub mod template;
/// Small `Display`-formatting helpers shared by [`value`] and error types.
mod utils;
pub mod value;

pub use crate::engine::{run_rule, FileContext, FileResult, Rule, RuleOptions, Status};
pub use crate::value::Value;

use thiserror::Error;

use crate::action::ActionParseError;
use crate::condition::{EvalError, ParseError as ConditionParseError};
use crate::engine::RuleError;
use crate::frontmatter::FrontMatterError;
use crate::template::TemplateError;

/// The union of every error this crate's public entry points can produce.
/// Individual modules expose their own narrower error enums; this one
/// exists for callers that want a single type to propagate with `?`.
#[derive(Debug, Error)]
pub enum Error {
    #[error("condition error: {0}")]
    Condition(#[from] ConditionParseError),
    #[error("evaluation error: {0}")]
    Eval(#[from] EvalError),
    #[error("template error: {0}")]
    Template(#[from] TemplateError),
    #[error("action error: {0}")]
    Action(#[from] ActionParseError),
    #[error("rule error: {0}")]
    Rule(#[from] RuleError),
    #[error("front matter error: {0}")]
    FrontMatter(#[from] FrontMatterError),
    #[error("rule storage error: {0}")]
    RuleStorage(#[from] serde_json::Error),
}
