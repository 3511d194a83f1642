//! The action executor (C9): applies a parsed [`Action`] to a [`Value`] in
//! place, per spec.md §4.7.

use std::fmt;

use indexmap::IndexMap;

use crate::action::ast::{Action, MoveTarget, SortOrder};
use crate::condition::{self, Condition};
use crate::literal::Literal;
use crate::path::{self, Path, Segment};
use crate::value::Value;

/// A `Vec<String>` of human-readable lines describing what an action did.
/// Exists as its own type (rather than a bare `Vec<String>` threaded through
/// every branch) so every call site goes through one formatting choke point.
#[derive(Debug, Default)]
pub struct ChangeLog(Vec<String>);

impl ChangeLog {
    pub fn new() -> Self {
        ChangeLog(Vec::new())
    }

    pub fn push_line(&mut self, args: fmt::Arguments<'_>) {
        self.0.push(args.to_string());
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

macro_rules! log_line {
    ($log:expr, $($arg:tt)*) => {
        $log.push_line(format_args!($($arg)*))
    };
}

/// The uniform result shape every action produces, per spec.md §4.7.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutcome {
    pub success: bool,
    pub modified: bool,
    pub changes: Vec<String>,
    pub error: Option<String>,
    pub warning: Option<String>,
}

impl ActionOutcome {
    fn ok(modified: bool, log: ChangeLog) -> Self {
        ActionOutcome {
            success: true,
            modified,
            changes: log.into_vec(),
            error: None,
            warning: None,
        }
    }

    fn warn(log: ChangeLog, warning: impl Into<String>) -> Self {
        ActionOutcome {
            success: true,
            modified: false,
            changes: log.into_vec(),
            error: None,
            warning: Some(warning.into()),
        }
    }

    fn warn_modified(log: ChangeLog, warning: impl Into<String>) -> Self {
        ActionOutcome {
            success: true,
            modified: true,
            changes: log.into_vec(),
            error: None,
            warning: Some(warning.into()),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        ActionOutcome {
            success: false,
            modified: false,
            changes: Vec::new(),
            error: Some(message.into()),
            warning: None,
        }
    }
}

/// Executes `action` against `value` in place.
pub fn execute(action: &Action, value: &mut Value) -> ActionOutcome {
    match action {
        Action::Set { path, value: lit } => exec_set(value, path, lit),
        Action::Add { path, value: lit } => exec_add(value, path, lit),
        Action::Delete { path } => exec_delete(value, path),
        Action::Rename { from, to } => exec_rename(value, from, to),
        Action::Append { path, value: lit } => exec_append(value, path, lit, true),
        Action::Prepend { path, value: lit } => exec_append(value, path, lit, false),
        Action::InsertAt { path, value: lit, index } => exec_insert_at(value, path, lit, *index),
        Action::InsertAfter { path, value: lit, target } => {
            exec_insert_near(value, path, lit, target, true)
        }
        Action::InsertBefore { path, value: lit, target } => {
            exec_insert_near(value, path, lit, target, false)
        }
        Action::Remove { path, value: lit } => exec_remove(value, path, lit, false),
        Action::RemoveAll { path, value: lit } => exec_remove(value, path, lit, true),
        Action::RemoveAt { path, index } => exec_remove_at(value, path, *index),
        Action::Replace { path, old, new } => exec_replace(value, path, old, new, false),
        Action::ReplaceAll { path, old, new } => exec_replace(value, path, old, new, true),
        Action::Deduplicate { path } => exec_deduplicate(value, path),
        Action::Sort { path, order } => exec_sort(value, path, *order),
        Action::SortBy { path, field, order } => exec_sort_by(value, path, field, *order),
        Action::Move { path, from, to } => exec_move(value, path, *from, *to),
        Action::MoveWhere { path, condition, target } => {
            exec_move_where(value, path, condition, target)
        }
        Action::UpdateWhere { path, condition, updates } => {
            exec_update_where(value, path, condition, updates)
        }
        Action::Merge { path, object } => exec_merge(value, path, object, true),
        Action::MergeOverwrite { path, object } => exec_merge(value, path, object, false),
    }
}

fn exec_set(value: &mut Value, path: &Path, lit: &Literal) -> ActionOutcome {
    let new_value = lit.clone().into_value();
    let old = path::resolve_owned(value, path);
    let modified = old.as_ref() != Some(&new_value);
    path::set(value, path, new_value.clone());
    let mut log = ChangeLog::new();
    log_line!(log, "SET {path} → {new_value}");
    ActionOutcome::ok(modified, log)
}

fn exec_add(value: &mut Value, path: &Path, lit: &Literal) -> ActionOutcome {
    if path::exists(value, path) {
        let mut log = ChangeLog::new();
        log_line!(log, "ADD {path}: already present, skipped");
        return ActionOutcome::warn(log, format!("{path} already exists"));
    }
    let new_value = lit.clone().into_value();
    path::set(value, path, new_value.clone());
    let mut log = ChangeLog::new();
    log_line!(log, "ADD {path} → {new_value}");
    ActionOutcome::ok(true, log)
}

fn exec_delete(value: &mut Value, path: &Path) -> ActionOutcome {
    let removed = path::delete(value, path);
    let mut log = ChangeLog::new();
    if removed {
        log_line!(log, "DELETE {path}");
    } else {
        log_line!(log, "DELETE {path}: not present, skipped");
    }
    ActionOutcome::ok(removed, log)
}

/// Splits `path` into its parent path and final field name, for operations
/// (`RENAME`) that mutate a parent map's keys rather than the value at
/// `path` itself. Errors if `path` is empty or does not end in a plain field.
fn field_parent(op: &str, path: &Path) -> Result<(Path, String), ActionOutcome> {
    let Some((last, prefix)) = path.segments.split_last() else {
        return Err(ActionOutcome::error(format!("{op}: path cannot be empty")));
    };
    let Segment::Field(key) = last else {
        return Err(ActionOutcome::error(format!(
            "{op}: path must end in a field name"
        )));
    };
    let prefix_path = Path {
        segments: prefix.to_vec(),
    };
    Ok((prefix_path, key.clone()))
}

fn write_back_at(value: &mut Value, prefix: &Path, new: Value) {
    if prefix.segments.is_empty() {
        *value = new;
    } else {
        path::set(value, prefix, new);
    }
}

fn exec_rename(value: &mut Value, from: &Path, to: &Path) -> ActionOutcome {
    let (from_prefix, from_key) = match field_parent("RENAME", from) {
        Ok(t) => t,
        Err(e) => return e,
    };
    let (to_prefix, to_key) = match field_parent("RENAME", to) {
        Ok(t) => t,
        Err(e) => return e,
    };

    if from_prefix != to_prefix {
        // Rare cross-parent rename: move the value wholesale. Insertion
        // order within either parent is not preserved for this case.
        let Some(old_value) = path::resolve_owned(value, from) else {
            let mut log = ChangeLog::new();
            log_line!(log, "RENAME {from}: not present, skipped");
            return ActionOutcome::warn(log, format!("{from} does not exist"));
        };
        path::delete(value, from);
        path::set(value, to, old_value);
        let mut log = ChangeLog::new();
        log_line!(log, "RENAME {from} → {to}");
        return ActionOutcome::ok(true, log);
    }

    let mut parent = if from_prefix.segments.is_empty() {
        value.clone()
    } else {
        match path::resolve_owned(value, &from_prefix) {
            Some(v) => v,
            None => return ActionOutcome::error(format!("RENAME: {from_prefix} does not exist")),
        }
    };
    let Some(map) = parent.as_map_mut() else {
        return ActionOutcome::error("RENAME: parent is not a map");
    };

    let Some(old_index) = map.get_index_of(&from_key) else {
        let mut log = ChangeLog::new();
        log_line!(log, "RENAME {from}: not present, skipped");
        return ActionOutcome::warn(log, format!("{from_key} does not exist"));
    };
    let overwrote = to_key != from_key && map.contains_key(&to_key);
    let val = map.shift_remove(&from_key).expect("checked above");
    map.shift_insert(old_index.min(map.len()), to_key.clone(), val);

    write_back_at(value, &from_prefix, parent);

    let mut log = ChangeLog::new();
    log_line!(log, "RENAME {from_key} → {to_key}");
    if overwrote {
        ActionOutcome::warn_modified(log, format!("{to_key} already existed, overwritten"))
    } else {
        ActionOutcome::ok(true, log)
    }
}

fn exec_append(value: &mut Value, path: &Path, lit: &Literal, at_end: bool) -> ActionOutcome {
    let op = if at_end { "APPEND" } else { "PREPEND" };
    let new_elem = lit.clone().into_value();
    let mut log = ChangeLog::new();

    let mut items = match path::resolve_owned(value, path) {
        None => Vec::new(),
        Some(Value::Seq(items)) => items,
        Some(_) => return ActionOutcome::error(format!("{op}: {path} is not an array")),
    };
    if at_end {
        items.push(new_elem);
    } else {
        items.insert(0, new_elem);
    }
    log_line!(log, "{op} {path} → {}", Value::Seq(items.clone()));
    path::set(value, path, Value::Seq(items));
    ActionOutcome::ok(true, log)
}

fn normalize_insert_index(i: i64, len: usize) -> Option<usize> {
    let resolved = if i < 0 { i + len as i64 } else { i };
    if resolved < 0 || resolved as usize > len {
        None
    } else {
        Some(resolved as usize)
    }
}

fn exec_insert_at(value: &mut Value, path: &Path, lit: &Literal, index: i64) -> ActionOutcome {
    let new_elem = lit.clone().into_value();
    let mut log = ChangeLog::new();

    let mut items = match path::resolve_owned(value, path) {
        None => {
            if index != 0 {
                return ActionOutcome::error(format!(
                    "INSERT_AT: {path} does not exist and index {index} is not 0"
                ));
            }
            Vec::new()
        }
        Some(Value::Seq(items)) => items,
        Some(_) => return ActionOutcome::error(format!("INSERT_AT: {path} is not an array")),
    };

    let Some(idx) = normalize_insert_index(index, items.len()) else {
        return ActionOutcome::error(format!(
            "INSERT_AT: index {index} out of range for length {}",
            items.len()
        ));
    };
    items.insert(idx, new_elem);
    log_line!(log, "INSERT_AT {path}[{index}] → {}", Value::Seq(items.clone()));
    path::set(value, path, Value::Seq(items));
    ActionOutcome::ok(true, log)
}

fn exec_insert_near(
    value: &mut Value,
    path: &Path,
    lit: &Literal,
    target: &Literal,
    after: bool,
) -> ActionOutcome {
    let op = if after { "INSERT_AFTER" } else { "INSERT_BEFORE" };
    let target_value = target.clone().into_value();
    let new_elem = lit.clone().into_value();

    let Some(Value::Seq(mut items)) = path::resolve_owned(value, path) else {
        return ActionOutcome::error(format!("{op}: {path} is not an array"));
    };
    let Some(pos) = items.iter().position(|v| v.value_eq(&target_value)) else {
        return ActionOutcome::error(format!("{op}: target not found in {path}"));
    };
    let idx = if after { pos + 1 } else { pos };
    items.insert(idx, new_elem);
    let mut log = ChangeLog::new();
    log_line!(log, "{op} {path} → {}", Value::Seq(items.clone()));
    path::set(value, path, Value::Seq(items));
    ActionOutcome::ok(true, log)
}

fn exec_remove(value: &mut Value, path: &Path, lit: &Literal, all: bool) -> ActionOutcome {
    let op = if all { "REMOVE_ALL" } else { "REMOVE" };
    let needle = lit.clone().into_value();
    let mut log = ChangeLog::new();

    let items = match path::resolve_owned(value, path) {
        None => {
            log_line!(log, "{op} {path}: not present, skipped");
            return ActionOutcome::warn(log, format!("{path} does not exist"));
        }
        Some(Value::Seq(items)) => items,
        Some(_) => return ActionOutcome::error(format!("{op}: {path} is not an array")),
    };

    let mut removed_any = false;
    let new_items: Vec<Value> = if all {
        items
            .into_iter()
            .filter(|v| {
                let matches = v.value_eq(&needle);
                removed_any |= matches;
                !matches
            })
            .collect()
    } else {
        let mut out = Vec::new();
        let mut done = false;
        for item in items {
            if !done && item.value_eq(&needle) {
                done = true;
                removed_any = true;
                continue;
            }
            out.push(item);
        }
        out
    };

    if !removed_any {
        log_line!(log, "{op} {path}: value not found, skipped");
        return ActionOutcome::warn(log, format!("value not found in {path}"));
    }

    log_line!(log, "{op} {path} → {}", Value::Seq(new_items.clone()));
    path::set(value, path, Value::Seq(new_items));
    ActionOutcome::ok(true, log)
}

fn exec_remove_at(value: &mut Value, path: &Path, index: i64) -> ActionOutcome {
    let mut items = match path::resolve_owned(value, path) {
        None => return ActionOutcome::error(format!("REMOVE_AT: {path} does not exist")),
        Some(Value::Seq(items)) => items,
        Some(_) => return ActionOutcome::error(format!("REMOVE_AT: {path} is not an array")),
    };
    let resolved = if index < 0 { index + items.len() as i64 } else { index };
    if resolved < 0 || resolved as usize >= items.len() {
        return ActionOutcome::error(format!(
            "REMOVE_AT: index {index} out of range for length {}",
            items.len()
        ));
    }
    let removed = items.remove(resolved as usize);
    let mut log = ChangeLog::new();
    log_line!(log, "REMOVE_AT {path}[{index}] removed {removed}");
    path::set(value, path, Value::Seq(items));
    ActionOutcome::ok(true, log)
}

fn exec_replace(
    value: &mut Value,
    path: &Path,
    old_lit: &Literal,
    new_lit: &Literal,
    all: bool,
) -> ActionOutcome {
    let op = if all { "REPLACE_ALL" } else { "REPLACE" };
    let old_needle = old_lit.clone().into_value();
    let new_elem = new_lit.clone().into_value();
    let mut log = ChangeLog::new();

    let items = match path::resolve_owned(value, path) {
        None => {
            log_line!(log, "{op} {path}: not present, skipped");
            return ActionOutcome::warn(log, format!("{path} does not exist"));
        }
        Some(Value::Seq(items)) => items,
        Some(Value::String(s)) => {
            let old_str = old_needle.as_str().unwrap_or_default();
            let new_str = new_elem.as_str().unwrap_or_default();
            if !s.contains(old_str) {
                log_line!(log, "{op} {path}: substring not found, skipped");
                return ActionOutcome::warn(log, format!("substring not found in {path}"));
            }
            let replaced = if all {
                s.replace(old_str, new_str)
            } else {
                s.replacen(old_str, new_str, 1)
            };
            log_line!(log, "{op} {path} → {replaced:?}");
            path::set(value, path, Value::String(replaced));
            return ActionOutcome::ok(true, log);
        }
        Some(_) => return ActionOutcome::error(format!("{op}: {path} is not an array or string")),
    };

    let mut replaced_any = false;
    let mut done = false;
    let new_items: Vec<Value> = items
        .into_iter()
        .map(|item| {
            if item.value_eq(&old_needle) && (all || !done) {
                replaced_any = true;
                done = true;
                new_elem.clone()
            } else {
                item
            }
        })
        .collect();

    if !replaced_any {
        log_line!(log, "{op} {path}: value not found, skipped");
        return ActionOutcome::warn(log, format!("value not found in {path}"));
    }

    log_line!(log, "{op} {path} → {}", Value::Seq(new_items.clone()));
    path::set(value, path, Value::Seq(new_items));
    ActionOutcome::ok(true, log)
}

fn exec_deduplicate(value: &mut Value, path: &Path) -> ActionOutcome {
    let items = match path::resolve_owned(value, path) {
        None => return ActionOutcome::ok(false, ChangeLog::new()),
        Some(Value::Seq(items)) => items,
        Some(_) => return ActionOutcome::error(format!("DEDUPLICATE: {path} is not an array")),
    };

    let original_len = items.len();
    let mut out: Vec<Value> = Vec::with_capacity(items.len());
    for item in items {
        if out.iter().any(|kept| kept.value_eq(&item)) {
            continue;
        }
        out.push(item);
    }

    let modified = out.len() != original_len;
    let mut log = ChangeLog::new();
    if modified {
        log_line!(
            log,
            "DEDUPLICATE {path}: removed {} duplicate(s)",
            original_len - out.len()
        );
        path::set(value, path, Value::Seq(out));
    } else {
        log_line!(log, "DEDUPLICATE {path}: no duplicates found");
    }
    ActionOutcome::ok(modified, log)
}

fn exec_sort(value: &mut Value, path: &Path, order: SortOrder) -> ActionOutcome {
    let items = match path::resolve_owned(value, path) {
        None => return ActionOutcome::ok(false, ChangeLog::new()),
        Some(Value::Seq(items)) => items,
        Some(_) => return ActionOutcome::error(format!("SORT: {path} is not an array")),
    };

    let mut sorted = items.clone();
    sorted.sort_by(|a, b| {
        let ord = a.compare_for_sort(b);
        if order == SortOrder::Desc {
            ord.reverse()
        } else {
            ord
        }
    });

    let modified = sorted != items;
    let mut log = ChangeLog::new();
    log_line!(log, "SORT {path} → {}", Value::Seq(sorted.clone()));
    path::set(value, path, Value::Seq(sorted));
    ActionOutcome::ok(modified, log)
}

fn exec_sort_by(value: &mut Value, path: &Path, field: &str, order: SortOrder) -> ActionOutcome {
    let items = match path::resolve_owned(value, path) {
        None => return ActionOutcome::ok(false, ChangeLog::new()),
        Some(Value::Seq(items)) => items,
        Some(_) => return ActionOutcome::error(format!("SORT_BY: {path} is not an array")),
    };

    let key_of = |v: &Value| -> Value {
        v.as_map()
            .and_then(|m| m.get(field))
            .cloned()
            .unwrap_or(Value::Null)
    };

    let mut sorted = items.clone();
    sorted.sort_by(|a, b| {
        let ord = key_of(a).compare_for_sort(&key_of(b));
        if order == SortOrder::Desc {
            ord.reverse()
        } else {
            ord
        }
    });

    let modified = sorted != items;
    let mut log = ChangeLog::new();
    log_line!(log, "SORT_BY {path} BY {field} → {}", Value::Seq(sorted.clone()));
    path::set(value, path, Value::Seq(sorted));
    ActionOutcome::ok(modified, log)
}

fn exec_move(value: &mut Value, path: &Path, from: i64, to: i64) -> ActionOutcome {
    let mut items = match path::resolve_owned(value, path) {
        None => return ActionOutcome::error(format!("MOVE: {path} does not exist")),
        Some(Value::Seq(items)) => items,
        Some(_) => return ActionOutcome::error(format!("MOVE: {path} is not an array")),
    };

    let from_resolved = if from < 0 { from + items.len() as i64 } else { from };
    if from_resolved < 0 || from_resolved as usize >= items.len() {
        return ActionOutcome::error(format!("MOVE: source index {from} out of range"));
    }
    let elem = items.remove(from_resolved as usize);

    let to_resolved = if to < 0 { to + items.len() as i64 } else { to };
    let to_idx = to_resolved.clamp(0, items.len() as i64) as usize;
    items.insert(to_idx, elem);

    let mut log = ChangeLog::new();
    log_line!(log, "MOVE {path} {from}→{to} → {}", Value::Seq(items.clone()));
    path::set(value, path, Value::Seq(items));
    ActionOutcome::ok(true, log)
}

fn exec_move_where(
    value: &mut Value,
    path: &Path,
    cond: &Condition,
    target: &MoveTarget,
) -> ActionOutcome {
    let items = match path::resolve_owned(value, path) {
        None => return ActionOutcome::error(format!("MOVE_WHERE: {path} does not exist")),
        Some(Value::Seq(items)) => items,
        Some(_) => return ActionOutcome::error(format!("MOVE_WHERE: {path} is not an array")),
    };

    let mut matched = Vec::new();
    let mut remaining = Vec::new();
    for item in &items {
        match condition::evaluate(cond, item) {
            Ok(true) => matched.push(item.clone()),
            _ => remaining.push(item.clone()),
        }
    }

    let mut log = ChangeLog::new();
    if matched.is_empty() {
        log_line!(log, "MOVE_WHERE {path}: no elements matched, skipped");
        return ActionOutcome::warn(log, "no elements matched".to_string());
    }

    let insert_at = match target {
        MoveTarget::Start => 0,
        MoveTarget::End => remaining.len(),
        MoveTarget::Index(i) => {
            if *i == 0 {
                0
            } else {
                remaining.len()
            }
        }
        MoveTarget::After(anchor) => {
            match remaining.iter().position(|item| {
                condition::evaluate(anchor, item).unwrap_or(false)
            }) {
                Some(pos) => pos + 1,
                None => {
                    log_line!(log, "MOVE_WHERE {path}: no anchor found, skipped");
                    return ActionOutcome::warn(log, "no anchor element found".to_string());
                }
            }
        }
        MoveTarget::Before(anchor) => {
            match remaining.iter().position(|item| {
                condition::evaluate(anchor, item).unwrap_or(false)
            }) {
                Some(pos) => pos,
                None => {
                    log_line!(log, "MOVE_WHERE {path}: no anchor found, skipped");
                    return ActionOutcome::warn(log, "no anchor element found".to_string());
                }
            }
        }
    };

    let insert_at = insert_at.min(remaining.len());
    let mut result = remaining;
    for (offset, item) in matched.into_iter().enumerate() {
        result.insert(insert_at + offset, item);
    }

    log_line!(log, "MOVE_WHERE {path} → {}", Value::Seq(result.clone()));
    path::set(value, path, Value::Seq(result));
    ActionOutcome::ok(true, log)
}

fn exec_update_where(
    value: &mut Value,
    path: &Path,
    cond: &Condition,
    updates: &[(String, Literal)],
) -> ActionOutcome {
    let items = match path::resolve_owned(value, path) {
        None => Vec::new(),
        Some(Value::Seq(items)) => items,
        Some(_) => return ActionOutcome::error(format!("UPDATE_WHERE: {path} is not an array")),
    };

    let mut matched_count = 0usize;
    let mut new_items = Vec::with_capacity(items.len());
    for item in items {
        if condition::evaluate(cond, &item).unwrap_or(false) {
            matched_count += 1;
            let mut updated = item;
            for (field, lit) in updates {
                let field_path = path::parse_path(field).unwrap_or(Path {
                    segments: vec![Segment::Field(field.clone())],
                });
                path::set(&mut updated, &field_path, lit.clone().into_value());
            }
            new_items.push(updated);
        } else {
            new_items.push(item);
        }
    }

    let mut log = ChangeLog::new();
    if matched_count == 0 {
        log_line!(log, "UPDATE_WHERE {path}: no elements matched, skipped");
        return ActionOutcome::warn(log, "no elements matched".to_string());
    }

    log_line!(
        log,
        "UPDATE_WHERE {path}: updated {matched_count} element(s)"
    );
    path::set(value, path, Value::Seq(new_items));
    ActionOutcome::ok(true, log)
}

fn deep_merge(target: &mut IndexMap<String, Value>, source: &IndexMap<String, Value>) {
    for (key, src_val) in source {
        match (target.get_mut(key), src_val) {
            (Some(Value::Map(tm)), Value::Map(sm)) => deep_merge(tm, sm),
            _ => {
                target.insert(key.clone(), src_val.clone());
            }
        }
    }
}

fn exec_merge(value: &mut Value, path: &Path, object: &Value, deep: bool) -> ActionOutcome {
    let op = if deep { "MERGE" } else { "MERGE_OVERWRITE" };
    let Value::Map(source) = object else {
        return ActionOutcome::error(format!("{op}: operand is not an object"));
    };

    let existing = path::resolve_owned(value, path);
    let mut target = match existing.clone() {
        None => IndexMap::new(),
        Some(Value::Map(m)) => m,
        Some(_) => return ActionOutcome::error(format!("{op}: {path} is not an object")),
    };

    if deep {
        deep_merge(&mut target, source);
    } else {
        for (key, val) in source {
            target.insert(key.clone(), val.clone());
        }
    }

    let merged = Value::Map(target);
    let modified = existing.as_ref() != Some(&merged);
    let mut log = ChangeLog::new();
    log_line!(log, "{op} {path} → {merged}");
    path::set(value, path, merged);
    ActionOutcome::ok(modified, log)
}
