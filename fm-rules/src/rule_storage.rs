//! The host-facing rule storage shape (spec.md §4.10 "Rule storage"): the
//! JSON document a host loads, edits via its own UI, and persists — not
//! something the core ever writes to disk itself.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::engine::{Rule, RuleOptions};

/// The top-level document a host reads from its rules file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleFile {
    pub version: u32,
    pub rules: Vec<RuleRecord>,
    #[serde(default)]
    pub settings: Settings,
    #[serde(rename = "lastRun", skip_serializing_if = "Option::is_none", default)]
    pub last_run: Option<String>,
}

/// One stored rule entry, in the shape a host's settings UI actually edits.
/// `enabled` and `scope` are host concerns the engine itself never reads;
/// [`RuleRecord::to_rule`] is the seam where that's made explicit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleRecord {
    pub id: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub condition: String,
    pub action: String,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default)]
    pub backup: bool,
}

fn default_true() -> bool {
    true
}

/// Which files a rule applies to; the engine is scope-blind, so this is
/// entirely the host's responsibility to honor before calling `run_rule`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    #[default]
    Vault,
    Folder {
        path: String,
    },
    Tag {
        name: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub default_backup: bool,
    pub scan_timeout_ms: u64,
    pub debug: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            default_backup: false,
            scan_timeout_ms: 30_000,
            debug: false,
        }
    }
}

impl RuleRecord {
    /// Whether this record is well-formed enough to hand to the engine:
    /// non-empty id/name and non-empty action text. An empty condition is
    /// legal (spec.md §4.9: no condition means the action always runs).
    fn is_valid(&self) -> bool {
        !self.id.trim().is_empty() && !self.name.trim().is_empty() && !self.action.trim().is_empty()
    }

    fn to_rule(&self) -> Rule {
        Rule {
            id: self.id.clone(),
            name: self.name.clone(),
            condition: self.condition.clone(),
            action: self.action.clone(),
            options: RuleOptions {
                backup: self.backup,
            },
        }
    }
}

impl RuleFile {
    /// Parses a rules document from JSON text.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Serializes this document back to JSON text, pretty-printed the way a
    /// host's settings file is meant to be diffed and hand-edited.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Returns every enabled, well-formed rule as an engine [`Rule`], in
    /// storage order. Entries that are disabled or structurally invalid
    /// (missing id/name/action) are silently dropped, per spec.md §4.10 —
    /// a corrupt single entry must never fail the whole load.
    pub fn enabled_rules(&self) -> Vec<Rule> {
        self.rules
            .iter()
            .filter_map(|record| {
                if !record.enabled {
                    return None;
                }
                if !record.is_valid() {
                    warn!(rule_id = %record.id, rule_name = %record.name, "dropping invalid rule record");
                    return None;
                }
                Some(record.to_rule())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_document() {
        let text = r#"{
            "version": 1,
            "rules": [
                {
                    "id": "r1",
                    "name": "mark reviewed",
                    "condition": "status = \"draft\"",
                    "action": "SET status \"reviewed\""
                }
            ]
        }"#;
        let file = RuleFile::from_json(text).unwrap();
        assert_eq!(file.version, 1);
        assert_eq!(file.rules.len(), 1);
        assert!(file.rules[0].enabled);
        assert_eq!(file.settings.scan_timeout_ms, 30_000);
    }

    #[test]
    fn disabled_rules_are_dropped_from_enabled_rules() {
        let text = r#"{
            "version": 1,
            "rules": [
                {"id": "r1", "name": "a", "enabled": false, "condition": "", "action": "SET a 1"}
            ]
        }"#;
        let file = RuleFile::from_json(text).unwrap();
        assert_eq!(file.enabled_rules().len(), 0);
    }

    #[test]
    fn invalid_rule_entries_are_silently_dropped() {
        let text = r#"{
            "version": 1,
            "rules": [
                {"id": "", "name": "", "condition": "", "action": ""},
                {"id": "r2", "name": "good", "condition": "", "action": "SET a 1"}
            ]
        }"#;
        let file = RuleFile::from_json(text).unwrap();
        let rules = file.enabled_rules();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].id, "r2");
    }

    #[test]
    fn round_trips_through_json() {
        let text = r#"{
            "version": 2,
            "rules": [],
            "settings": {"default_backup": true, "scan_timeout_ms": 5000, "debug": false},
            "lastRun": "2024-01-01T00:00:00Z"
        }"#;
        let file = RuleFile::from_json(text).unwrap();
        let back = file.to_json().unwrap();
        let reparsed = RuleFile::from_json(&back).unwrap();
        assert_eq!(reparsed.version, 2);
        assert_eq!(reparsed.last_run.as_deref(), Some("2024-01-01T00:00:00Z"));
    }
}
