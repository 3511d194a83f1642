//! The front-matter codec: splits a Markdown note into its YAML front
//! matter and body, and joins an edited front-matter value back with the
//! original body, preserving body bytes exactly (spec.md §4.1 "Front-matter
//! extraction").

use indexmap::IndexMap;
use thiserror::Error;

use crate::value::Value;

const FENCE: &str = "---";

#[derive(Debug, Error, PartialEq)]
pub enum FrontMatterError {
    #[error("front matter is not valid YAML: {0}")]
    InvalidYaml(String),
    #[error("front matter must be a YAML mapping, found {0}")]
    NotAMapping(&'static str),
    #[error("front-matter value contains a non-finite number (NaN or infinity)")]
    NonFiniteNumber,
    #[error("front matter uses an unsupported YAML tag {0:?}")]
    UnsupportedTag(String),
}

/// Splits `text` into `(front_matter, body)`. A note with no opening `---`
/// fence on its first line has no front matter at all: this returns an
/// empty map and the whole text as body, unchanged.
pub fn split(text: &str) -> Result<(Value, &str), FrontMatterError> {
    let Some(rest) = text.strip_prefix(FENCE) else {
        return Ok((Value::Map(IndexMap::new()), text));
    };
    // The opening fence must be alone on its line.
    let Some(after_open) = rest.strip_prefix('\n').or_else(|| rest.strip_prefix("\r\n")) else {
        return Ok((Value::Map(IndexMap::new()), text));
    };

    let Some((yaml_text, body)) = find_closing_fence(after_open) else {
        return Ok((Value::Map(IndexMap::new()), text));
    };

    let docs: serde_yaml::Value =
        serde_yaml::from_str(yaml_text).map_err(|e| FrontMatterError::InvalidYaml(e.to_string()))?;
    let value = yaml_to_value(&docs)?;
    if !matches!(value, Value::Map(_)) {
        return Err(FrontMatterError::NotAMapping(value.type_name()));
    }
    Ok((value, body))
}

/// Finds the line `---` or `...` that closes the front-matter block
/// starting right after the opening fence. Returns the YAML text and the
/// body text (including the leading newline the closing fence was on).
fn find_closing_fence(rest: &str) -> Option<(&str, &str)> {
    let mut offset = 0usize;
    for line in rest.split_inclusive('\n') {
        let trimmed = line.trim_end_matches(['\n', '\r']);
        if trimmed == FENCE || trimmed == "..." {
            let yaml_text = &rest[..offset];
            let body_start = offset + line.len();
            return Some((yaml_text, &rest[body_start..]));
        }
        offset += line.len();
    }
    None
}

/// Joins `front_matter` back with `body`. An empty-map front matter
/// produces the body unchanged, with no fences added.
pub fn join(front_matter: &Value, body: &str) -> Result<String, FrontMatterError> {
    let Value::Map(map) = front_matter else {
        return Err(FrontMatterError::NotAMapping(front_matter.type_name()));
    };
    if map.is_empty() {
        return Ok(body.to_string());
    }

    let yaml = value_to_yaml(front_matter)?;
    let rendered =
        serde_yaml::to_string(&yaml).map_err(|e| FrontMatterError::InvalidYaml(e.to_string()))?;

    let mut out = String::with_capacity(rendered.len() + body.len() + 8);
    out.push_str(FENCE);
    out.push('\n');
    out.push_str(&rendered);
    out.push_str(FENCE);
    out.push('\n');
    out.push_str(body);
    Ok(out)
}

/// Converts a parsed YAML document to our `Value`, preserving mapping
/// insertion order and rejecting constructs spec.md doesn't define a
/// mutation story for (tags, non-finite floats).
fn yaml_to_value(yaml: &serde_yaml::Value) -> Result<Value, FrontMatterError> {
    match yaml {
        serde_yaml::Value::Null => Ok(Value::Null),
        serde_yaml::Value::Bool(b) => Ok(Value::Bool(*b)),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Int(i))
            } else if let Some(f) = n.as_f64() {
                if f.is_finite() {
                    Ok(Value::Float(f))
                } else {
                    Err(FrontMatterError::NonFiniteNumber)
                }
            } else {
                Err(FrontMatterError::NonFiniteNumber)
            }
        }
        serde_yaml::Value::String(s) => Ok(Value::String(s.clone())),
        serde_yaml::Value::Sequence(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(yaml_to_value(item)?);
            }
            Ok(Value::Seq(out))
        }
        serde_yaml::Value::Mapping(entries) => {
            let mut out = IndexMap::with_capacity(entries.len());
            for (k, v) in entries {
                let key = match k {
                    serde_yaml::Value::String(s) => s.clone(),
                    other => serde_yaml::to_string(other)
                        .map_err(|e| FrontMatterError::InvalidYaml(e.to_string()))?
                        .trim()
                        .to_string(),
                };
                out.insert(key, yaml_to_value(v)?);
            }
            Ok(Value::Map(out))
        }
        serde_yaml::Value::Tagged(tagged) => {
            Err(FrontMatterError::UnsupportedTag(tagged.tag.to_string()))
        }
    }
}

fn value_to_yaml(value: &Value) -> Result<serde_yaml::Value, FrontMatterError> {
    match value {
        Value::Null => Ok(serde_yaml::Value::Null),
        Value::Bool(b) => Ok(serde_yaml::Value::Bool(*b)),
        Value::Int(i) => Ok(serde_yaml::Value::Number((*i).into())),
        Value::Float(f) => {
            if !f.is_finite() {
                return Err(FrontMatterError::NonFiniteNumber);
            }
            Ok(serde_yaml::Value::Number((*f).into()))
        }
        Value::String(s) => Ok(serde_yaml::Value::String(s.clone())),
        Value::Seq(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(value_to_yaml(item)?);
            }
            Ok(serde_yaml::Value::Sequence(out))
        }
        Value::Map(map) => {
            let mut out = serde_yaml::Mapping::new();
            for (k, v) in map {
                out.insert(serde_yaml::Value::String(k.clone()), value_to_yaml(v)?);
            }
            Ok(serde_yaml::Value::Mapping(out))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_front_matter_and_body() {
        let text = "---\nstatus: draft\ntags:\n  - a\n  - b\n---\n# Heading\n\nBody text.\n";
        let (fm, body) = split(text).unwrap();
        let Value::Map(map) = &fm else { panic!("expected map") };
        assert_eq!(map.get("status"), Some(&Value::String("draft".into())));
        assert_eq!(body, "# Heading\n\nBody text.\n");
    }

    #[test]
    fn note_with_no_front_matter_round_trips_untouched() {
        let text = "# Just a heading\n\nNo front matter here.\n";
        let (fm, body) = split(text).unwrap();
        assert_eq!(fm, Value::Map(IndexMap::new()));
        assert_eq!(body, text);
    }

    #[test]
    fn join_preserves_body_bytes_exactly() {
        let body = "# Heading\n\nSome body text with  double  spaces.\n";
        let mut map = IndexMap::new();
        map.insert("status".to_string(), Value::String("done".into()));
        let joined = join(&Value::Map(map), body).unwrap();
        let (_, round_tripped_body) = split(&joined).unwrap();
        assert_eq!(round_tripped_body, body);
    }

    #[test]
    fn join_with_empty_map_leaves_body_unchanged() {
        let body = "plain body\n";
        let joined = join(&Value::Map(IndexMap::new()), body).unwrap();
        assert_eq!(joined, body);
    }

    #[test]
    fn round_trip_preserves_key_order() {
        let text = "---\nzeta: 1\nalpha: 2\nmid: 3\n---\nbody\n";
        let (fm, body) = split(text).unwrap();
        let joined = join(&fm, body).unwrap();
        let zeta_pos = joined.find("zeta").unwrap();
        let alpha_pos = joined.find("alpha").unwrap();
        let mid_pos = joined.find("mid").unwrap();
        assert!(zeta_pos < alpha_pos && alpha_pos < mid_pos);
    }

    #[test]
    fn rejects_non_mapping_front_matter() {
        let text = "---\n- a\n- b\n---\nbody\n";
        let err = split(text).unwrap_err();
        assert!(matches!(err, FrontMatterError::NotAMapping(_)));
    }

    #[test]
    fn unterminated_fence_is_treated_as_no_front_matter() {
        let text = "---\nstatus: draft\nno closing fence here\n";
        let (fm, body) = split(text).unwrap();
        assert_eq!(fm, Value::Map(IndexMap::new()));
        assert_eq!(body, text);
    }
}
