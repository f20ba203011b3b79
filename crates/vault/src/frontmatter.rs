//! C2 — Frontmatter Store.
//!
//! Parses Markdown with an optional leading YAML frontmatter block and
//! serializes it back losslessly. `serde_yaml::Value`/`Mapping` is used
//! directly as the tagged dynamic-value type the spec calls for (Null, Bool,
//! Number, String, Sequence, Mapping) rather than a hand-rolled enum —
//! numeric fidelity for floats like `8.57` falls out of `serde_yaml::Number`
//! for free.

use serde_yaml::{Mapping, Value};

use crate::error::VaultError;

const DELIMITER: &str = "---";

/// Parse `content` into `(frontmatter, body)`. If `content` does not begin
/// with a `---` delimiter line, the frontmatter is an empty mapping and the
/// body is the full input.
pub fn parse(content: &str) -> Result<(Mapping, String), VaultError> {
    let mut lines = content.splitn(2, '\n');
    let Some(first_line) = lines.next() else {
        return Ok((Mapping::new(), content.to_string()));
    };

    if first_line.trim_end_matches('\r') != DELIMITER {
        return Ok((Mapping::new(), content.to_string()));
    }

    let rest = lines.next().unwrap_or("");

    // Find the closing `---` line.
    let mut yaml_lines = Vec::new();
    let mut body_start = None;
    let mut consumed = 0usize;
    for line in rest.split_inclusive('\n') {
        let trimmed = line.trim_end_matches(['\n', '\r']);
        if trimmed == DELIMITER {
            consumed += line.len();
            body_start = Some(consumed);
            break;
        }
        yaml_lines.push(line);
        consumed += line.len();
    }

    let Some(body_start) = body_start else {
        // No closing delimiter: treat the whole thing as plain content.
        return Ok((Mapping::new(), content.to_string()));
    };

    let yaml_text: String = yaml_lines.concat();
    let data: Value = if yaml_text.trim().is_empty() {
        Value::Mapping(Mapping::new())
    } else {
        serde_yaml::from_str(&yaml_text).map_err(|source| VaultError::InvalidFrontmatter {
            path: Default::default(),
            source,
        })?
    };

    let mapping = match data {
        Value::Mapping(m) => m,
        Value::Null => Mapping::new(),
        _ => {
            return Err(VaultError::NotAMapping {
                path: Default::default(),
            });
        }
    };

    let body = rest[body_start..].strip_prefix('\n').unwrap_or(&rest[body_start..]);
    Ok((mapping, body.to_string()))
}

/// Serialize `data` and `body` back to `---\n<yaml>\n---\n\n<body>`.
/// Insertion order of top-level keys in `data` is preserved because
/// `serde_yaml::Mapping` is order-preserving.
pub fn serialize(data: &Mapping, body: &str) -> Result<String, VaultError> {
    if data.is_empty() {
        return Ok(body.to_string());
    }

    let yaml = serde_yaml::to_string(&Value::Mapping(data.clone())).map_err(|source| {
        VaultError::InvalidFrontmatter {
            path: Default::default(),
            source,
        }
    })?;
    let yaml = yaml.trim_end_matches('\n');

    Ok(format!("{DELIMITER}\n{yaml}\n{DELIMITER}\n\n{body}"))
}

fn split_dotted(key: &str) -> Vec<&str> {
    key.split('.').collect()
}

/// Read a dotted-path key out of a mapping. Intermediate segments that are
/// not mappings cause the lookup to fail (return `None`), matching the
/// "intermediate mappings are created on set" contract for `set_path` — a
/// read never mutates.
pub fn get_path(data: &Mapping, dotted_key: &str) -> Option<Value> {
    let segments = split_dotted(dotted_key);
    let mut current = Value::Mapping(data.clone());

    for segment in segments {
        match current {
            Value::Mapping(ref m) => {
                current = m.get(Value::String(segment.to_string()))?.clone();
            }
            _ => return None,
        }
    }

    Some(current)
}

/// Write `value` at a dotted-path key, creating intermediate mappings as
/// needed.
pub fn set_path(data: &mut Mapping, dotted_key: &str, value: Value) {
    let segments = split_dotted(dotted_key);
    set_path_segments(data, &segments, value);
}

fn set_path_segments(data: &mut Mapping, segments: &[&str], value: Value) {
    debug_assert!(!segments.is_empty());
    let key = Value::String(segments[0].to_string());

    if segments.len() == 1 {
        data.insert(key, value);
        return;
    }

    let entry = data.entry(key).or_insert_with(|| Value::Mapping(Mapping::new()));
    if !matches!(entry, Value::Mapping(_)) {
        *entry = Value::Mapping(Mapping::new());
    }
    let Value::Mapping(nested) = entry else {
        unreachable!()
    };
    set_path_segments(nested, &segments[1..], value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_no_frontmatter_returns_full_body() {
        let (data, body) = parse("# Just a note\n\nSome text.").unwrap();
        assert!(data.is_empty());
        assert_eq!(body, "# Just a note\n\nSome text.");
    }

    #[test]
    fn parse_extracts_frontmatter_and_body() {
        let content = "---\ntitle: Hello\nbgg_id: \"174430\"\n---\n\n# Body here\n";
        let (data, body) = parse(content).unwrap();
        assert_eq!(
            data.get(Value::String("title".into())),
            Some(&Value::String("Hello".into()))
        );
        assert_eq!(body, "# Body here\n");
    }

    #[test]
    fn parse_serialize_round_trips_untouched_keys() {
        let content = "---\ntitle: Gloomhaven\nbgg_id: \"174430\"\n---\n\nBody text.";
        let (data, body) = parse(content).unwrap();
        let out = serialize(&data, &body).unwrap();
        let (data2, body2) = parse(&out).unwrap();
        assert_eq!(data, data2);
        assert_eq!(body, body2);
    }

    #[test]
    fn get_path_reads_nested_value() {
        let (data, _) = parse("---\nbgg:\n  rating: 8.57\n---\n\nbody").unwrap();
        let value = get_path(&data, "bgg.rating").unwrap();
        assert_eq!(value.as_f64(), Some(8.57));
    }

    #[test]
    fn get_path_missing_key_returns_none() {
        let (data, _) = parse("---\ntitle: x\n---\n\nbody").unwrap();
        assert!(get_path(&data, "nope.nested").is_none());
    }

    #[test]
    fn set_path_creates_intermediate_mappings() {
        let mut data = Mapping::new();
        set_path(&mut data, "bgg.rating", Value::Number(8.57.into()));
        let rating = get_path(&data, "bgg.rating").unwrap();
        assert_eq!(rating.as_f64(), Some(8.57));
    }

    #[test]
    fn set_path_get_path_is_idempotent_no_op() {
        let (mut data, _) = parse("---\nbgg:\n  rating: 8.57\n  weight: 3.87\n---\n\nbody").unwrap();
        let before = data.clone();
        let existing = get_path(&data, "bgg.rating").unwrap();
        set_path(&mut data, "bgg.rating", existing);
        assert_eq!(before, data);
    }

    #[test]
    fn numeric_fidelity_is_preserved_through_round_trip() {
        let content = "---\nbgg:\n  rating: 8.57\n---\n\nbody";
        let (data, body) = parse(content).unwrap();
        let out = serialize(&data, &body).unwrap();
        assert!(out.contains("8.57"));
    }
}
