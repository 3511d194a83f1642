//! The template resolver (C10): expands `{{ name }}` placeholders in action
//! source text before it reaches the action parser.

use chrono::{DateTime, Local};
use thiserror::Error;

use crate::path;
use crate::span::Span;
use crate::value::Value;

#[derive(Debug, Error, PartialEq)]
pub enum TemplateError {
    #[error("unknown template placeholder {name:?} at {span}")]
    UnknownName { name: String, span: Span },
    #[error("template placeholder fm:{path} has no matching front-matter value, at {span}")]
    MissingFrontMatter { path: String, span: Span },
    #[error("unclosed template placeholder starting at {0}")]
    Unclosed(Span),
}

/// The host-supplied facts about the file a rule is running against, needed
/// to resolve `filename`/`filepath`/`folder`/`vault` placeholders.
#[derive(Debug, Clone, Default)]
pub struct FileContext {
    pub basename: String,
    pub path: String,
    pub folder: String,
    pub vault_name: String,
}

/// Expands every `{{ name }}` occurrence in `source`, using `value` for
/// `fm:PATH` lookups, `ctx` for file-identity placeholders, and `now` for
/// every date/time placeholder.
pub fn expand(
    source: &str,
    value: &Value,
    ctx: &FileContext,
    now: DateTime<Local>,
) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    let mut base_offset = 0usize;

    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after_open = open + 2;
        let Some(close_rel) = rest[after_open..].find("}}") else {
            return Err(TemplateError::Unclosed(Span::new(
                base_offset + open,
                source.len(),
            )));
        };
        let name = rest[after_open..after_open + close_rel].trim();
        let span = Span::new(base_offset + open, base_offset + after_open + close_rel + 2);
        out.push_str(&resolve_name(name, value, ctx, now, span)?);
        let consumed = after_open + close_rel + 2;
        base_offset += consumed;
        rest = &rest[consumed..];
    }
    out.push_str(rest);

    Ok(out)
}

fn resolve_name(
    name: &str,
    value: &Value,
    ctx: &FileContext,
    now: DateTime<Local>,
    span: Span,
) -> Result<String, TemplateError> {
    if let Some(path_text) = name.strip_prefix("fm:") {
        return resolve_front_matter(path_text.trim(), value, span);
    }
    if let Some(format) = name.strip_prefix("date:") {
        return Ok(now.format(format.trim()).to_string());
    }

    match name {
        "today" => Ok(now.format("%Y-%m-%d").to_string()),
        "now" => Ok(now.to_rfc3339()),
        "timestamp" => Ok(now.timestamp().to_string()),
        "year" => Ok(now.format("%Y").to_string()),
        "month" => Ok(now.format("%m").to_string()),
        "day" => Ok(now.format("%d").to_string()),
        "time" => Ok(now.format("%H:%M:%S").to_string()),
        "filename" | "basename" => Ok(ctx.basename.clone()),
        "filepath" => Ok(ctx.path.clone()),
        "folder" => Ok(ctx.folder.clone()),
        "vault" => Ok(ctx.vault_name.clone()),
        _ => Err(TemplateError::UnknownName {
            name: name.to_string(),
            span,
        }),
    }
}

fn resolve_front_matter(path_text: &str, value: &Value, span: Span) -> Result<String, TemplateError> {
    let parsed = path::parse_path(path_text).map_err(|_| TemplateError::MissingFrontMatter {
        path: path_text.to_string(),
        span,
    })?;
    let found = path::resolve_owned(value, &parsed).ok_or_else(|| {
        TemplateError::MissingFrontMatter {
            path: path_text.to_string(),
            span,
        }
    })?;
    Ok(serialize_for_template(&found))
}

/// Scalars render as their canonical text; arrays and maps render as JSON,
/// per spec.md §4.8's "non-string front-matter values are serialized" rule.
fn serialize_for_template(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Seq(_) | Value::Map(_) => {
            let json: serde_json::Value = value.clone().into();
            json.to_string()
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use indexmap::IndexMap;

    fn fixed_now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 15, 9, 30, 0).unwrap()
    }

    fn ctx() -> FileContext {
        FileContext {
            basename: "daily-note".into(),
            path: "journal/daily-note.md".into(),
            folder: "journal".into(),
            vault_name: "MyVault".into(),
        }
    }

    #[test]
    fn expands_today_and_filename() {
        let value = Value::Map(IndexMap::new());
        let out = expand("Note {{filename}} on {{today}}", &value, &ctx(), fixed_now()).unwrap();
        assert_eq!(out, "Note daily-note on 2024-03-15");
    }

    #[test]
    fn expands_date_format_placeholder() {
        let value = Value::Map(IndexMap::new());
        let out = expand("{{date:%Y/%m}}", &value, &ctx(), fixed_now()).unwrap();
        assert_eq!(out, "2024/03");
    }

    #[test]
    fn expands_front_matter_scalar_and_array() {
        let mut map = IndexMap::new();
        map.insert("status".to_string(), Value::String("draft".into()));
        map.insert(
            "tags".to_string(),
            Value::Seq(vec![Value::String("a".into()), Value::String("b".into())]),
        );
        let value = Value::Map(map);

        let out = expand("SET status \"{{fm:status}}-reviewed\"", &value, &ctx(), fixed_now())
            .unwrap();
        assert_eq!(out, "SET status \"draft-reviewed\"");

        let out = expand("{{fm:tags}}", &value, &ctx(), fixed_now()).unwrap();
        assert_eq!(out, r#"["a","b"]"#);
    }

    #[test]
    fn unknown_name_is_an_error() {
        let value = Value::Map(IndexMap::new());
        let err = expand("{{bogus}}", &value, &ctx(), fixed_now()).unwrap_err();
        assert!(matches!(err, TemplateError::UnknownName { .. }));
    }

    #[test]
    fn missing_fm_target_is_an_error() {
        let value = Value::Map(IndexMap::new());
        let err = expand("{{fm:missing}}", &value, &ctx(), fixed_now()).unwrap_err();
        assert!(matches!(err, TemplateError::MissingFrontMatter { .. }));
    }
}
