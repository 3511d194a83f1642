//! Integration tests exercising whole rules against literal Markdown notes,
//! covering spec.md §8's concrete scenarios end to end through the
//! front-matter codec and the rule engine together.

use chrono::{Local, TimeZone};
use fm_rules::engine::{run_rule_with, Clock, FileContext, Rule, RuleOptions, Status};
use fm_rules::frontmatter;
use fm_rules::limits::Limits;
use fm_rules::value::Value;

struct FixedClock;

impl Clock for FixedClock {
    fn now(&self) -> chrono::DateTime<Local> {
        Local.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }
}

fn rule(condition: &str, action: &str) -> Rule {
    Rule {
        id: "note-rule".to_string(),
        name: "note rule".to_string(),
        condition: condition.to_string(),
        action: action.to_string(),
        options: RuleOptions::default(),
    }
}

fn run(text: &str, r: &Rule) -> (Status, Value, String) {
    let (front_matter, body) = frontmatter::split(text).unwrap();
    let ctx = FileContext {
        basename: "note".into(),
        path: "note.md".into(),
        folder: "".into(),
        vault_name: "vault".into(),
    };
    let result = run_rule_with(r, &front_matter, &ctx, &FixedClock, &Limits::default());
    let rejoined = frontmatter::join(&result.new_value, body).unwrap();
    (result.status, result.new_value, rejoined)
}

#[test]
fn append_to_existing_array_succeeds() {
    let text = "---\ntags:\n  - work\n  - project\n---\nBody.\n";
    let (status, value, rejoined) = run(text, &rule("", r#"APPEND tags "urgent""#));
    assert_eq!(status, Status::Success);
    let Value::Map(map) = &value else { panic!() };
    assert_eq!(
        map.get("tags"),
        Some(&Value::Seq(vec![
            Value::String("work".into()),
            Value::String("project".into()),
            Value::String("urgent".into()),
        ]))
    );
    assert!(rejoined.contains("urgent"));
    assert!(rejoined.ends_with("Body.\n"));
}

#[test]
fn append_to_non_array_is_an_error_and_leaves_value_unchanged() {
    let text = "---\nstatus: draft\n---\nBody.\n";
    let (status, value, _) = run(text, &rule("", r#"APPEND status "x""#));
    assert_eq!(status, Status::Error);
    let Value::Map(map) = &value else { panic!() };
    assert_eq!(map.get("status"), Some(&Value::String("draft".into())));
}

#[test]
fn conditional_set_applies_only_when_condition_holds() {
    let draft = "---\nstatus: draft\n---\nBody.\n";
    let (status, value, _) =
        run(draft, &rule(r#"status = "draft""#, r#"SET status "reviewed""#));
    assert_eq!(status, Status::Success);
    let Value::Map(map) = &value else { panic!() };
    assert_eq!(map.get("status"), Some(&Value::String("reviewed".into())));

    let published = "---\nstatus: published\n---\nBody.\n";
    let (status, _, rejoined) = run(
        published,
        &rule(r#"status = "draft""#, r#"SET status "reviewed""#),
    );
    assert_eq!(status, Status::Skipped);
    assert!(rejoined.contains("published"));
}

#[test]
fn update_where_sets_multiple_fields_on_matched_element() {
    let text = "---\ntasks:\n  - name: A\n    status: pending\n    priority: 0\n---\nBody.\n";
    let (status, value, _) = run(
        text,
        &rule(
            "",
            r#"UPDATE_WHERE tasks WHERE name = "A" SET status "done", priority 5"#,
        ),
    );
    assert_eq!(status, Status::Success);
    let Value::Map(map) = &value else { panic!() };
    let Some(Value::Seq(tasks)) = map.get("tasks") else { panic!() };
    let Value::Map(task) = &tasks[0] else { panic!() };
    assert_eq!(task.get("status"), Some(&Value::String("done".into())));
    assert_eq!(task.get("priority"), Some(&Value::Int(5)));
}

#[test]
fn move_where_to_start_preserves_relative_order() {
    let text = "---\nx:\n  - w: true\n  - w: false\n  - w: true\n  - w: false\n---\nBody.\n";
    let (status, value, _) = run(text, &rule("", "MOVE_WHERE x WHERE w = false TO START"));
    assert_eq!(status, Status::Success);
    let Value::Map(map) = &value else { panic!() };
    let Some(Value::Seq(items)) = map.get("x") else { panic!() };
    let flags: Vec<bool> = items
        .iter()
        .map(|v| {
            let Value::Map(m) = v else { panic!() };
            matches!(m.get("w"), Some(Value::Bool(true)))
        })
        .collect();
    assert_eq!(flags, vec![false, false, true, true]);
}

#[test]
fn merge_is_deep_and_merge_overwrite_is_shallow() {
    let text = "---\nc:\n  ui:\n    theme: dark\n    fontSize: 14\n---\nBody.\n";

    let (status, value, _) = run(text, &rule("", r#"MERGE c {"ui":{"fontSize":16}}"#));
    assert_eq!(status, Status::Success);
    let Value::Map(map) = &value else { panic!() };
    let Some(Value::Map(c)) = map.get("c") else { panic!() };
    let Some(Value::Map(ui)) = c.get("ui") else { panic!() };
    assert_eq!(ui.get("theme"), Some(&Value::String("dark".into())));
    assert_eq!(ui.get("fontSize"), Some(&Value::Int(16)));

    let (status, value, _) = run(
        text,
        &rule("", r#"MERGE_OVERWRITE c {"ui":{"fontSize":16}}"#),
    );
    assert_eq!(status, Status::Success);
    let Value::Map(map) = &value else { panic!() };
    let Some(Value::Map(c)) = map.get("c") else { panic!() };
    let Some(Value::Map(ui)) = c.get("ui") else { panic!() };
    assert_eq!(ui.get("theme"), None);
    assert_eq!(ui.get("fontSize"), Some(&Value::Int(16)));
}

#[test]
fn remove_missing_value_is_a_warning_not_an_error() {
    let text = "---\ntags:\n  - a\n---\nBody.\n";
    let (status, value, _) = run(text, &rule("", r#"REMOVE tags "z""#));
    assert_eq!(status, Status::Warning);
    let Value::Map(map) = &value else { panic!() };
    assert_eq!(
        map.get("tags"),
        Some(&Value::Seq(vec![Value::String("a".into())]))
    );
}

#[test]
fn nested_any_quantifier_matches_pending_task_in_any_project() {
    let text = "---\nprojects:\n  - tasks:\n      - status: done\n  - tasks:\n      - status: pending\n---\nBody.\n";
    let (status, _, _) = run(
        text,
        &rule(
            "ANY projects WHERE ANY tasks WHERE status = \"pending\"",
            "SET matched true",
        ),
    );
    assert_eq!(status, Status::Success);
}

#[test]
fn note_with_no_front_matter_gets_one_added_on_first_write() {
    let text = "Just a body, no front matter.\n";
    let (status, value, rejoined) = run(text, &rule("", r#"SET status "new""#));
    assert_eq!(status, Status::Success);
    let Value::Map(map) = &value else { panic!() };
    assert_eq!(map.get("status"), Some(&Value::String("new".into())));
    assert!(rejoined.starts_with("---\n"));
    assert!(rejoined.ends_with("Just a body, no front matter.\n"));
}

#[test]
fn template_placeholder_is_expanded_before_the_action_runs() {
    let text = "---\nstatus: draft\n---\nBody.\n";
    let (status, value, _) = run(text, &rule("", r#"SET reviewed_on "{{today}}""#));
    assert_eq!(status, Status::Success);
    let Value::Map(map) = &value else { panic!() };
    assert_eq!(
        map.get("reviewed_on"),
        Some(&Value::String("2024-06-01".into()))
    );
}
