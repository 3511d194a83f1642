//! The action abstract syntax tree.

use crate::condition::Condition;
use crate::literal::Literal;
use crate::path::Path;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Where `MOVE_WHERE` relocates the matched element to.
#[derive(Debug, Clone, PartialEq)]
pub enum MoveTarget {
    Start,
    End,
    Index(i64),
    After(Condition),
    Before(Condition),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Set { path: Path, value: Literal },
    Add { path: Path, value: Literal },
    Delete { path: Path },
    Rename { from: Path, to: Path },
    Append { path: Path, value: Literal },
    Prepend { path: Path, value: Literal },
    InsertAt { path: Path, value: Literal, index: i64 },
    InsertAfter { path: Path, value: Literal, target: Literal },
    InsertBefore { path: Path, value: Literal, target: Literal },
    Remove { path: Path, value: Literal },
    RemoveAll { path: Path, value: Literal },
    RemoveAt { path: Path, index: i64 },
    Replace { path: Path, old: Literal, new: Literal },
    ReplaceAll { path: Path, old: Literal, new: Literal },
    Deduplicate { path: Path },
    Sort { path: Path, order: SortOrder },
    SortBy { path: Path, field: String, order: SortOrder },
    Move { path: Path, from: i64, to: i64 },
    MoveWhere { path: Path, condition: Condition, target: MoveTarget },
    UpdateWhere { path: Path, condition: Condition, updates: Vec<(String, Literal)> },
    Merge { path: Path, object: Value },
    MergeOverwrite { path: Path, object: Value },
}

impl Action {
    /// The path every action ultimately targets, used for logging and for
    /// the "field exists at all" sanity checks the executor performs before
    /// dispatching.
    pub fn path(&self) -> &Path {
        match self {
            Action::Set { path, .. }
            | Action::Add { path, .. }
            | Action::Delete { path }
            | Action::Append { path, .. }
            | Action::Prepend { path, .. }
            | Action::InsertAt { path, .. }
            | Action::InsertAfter { path, .. }
            | Action::InsertBefore { path, .. }
            | Action::Remove { path, .. }
            | Action::RemoveAll { path, .. }
            | Action::RemoveAt { path, .. }
            | Action::Replace { path, .. }
            | Action::ReplaceAll { path, .. }
            | Action::Deduplicate { path }
            | Action::Sort { path, .. }
            | Action::SortBy { path, .. }
            | Action::Move { path, .. }
            | Action::MoveWhere { path, .. }
            | Action::UpdateWhere { path, .. }
            | Action::Merge { path, .. }
            | Action::MergeOverwrite { path, .. } => path,
            Action::Rename { from, .. } => from,
        }
    }
}
