use serde_json::{Map, Value};

/// A soft reference field in a partial update.
#[derive(Debug, PartialEq, Eq)]
pub enum Reference {
    Omitted,
    /// `null` or a blank string.
    Cleared,
    Set(String),
}

pub fn classify_reference(value: Option<&Value>) -> Result<Reference, String> {
    match value {
        None => Ok(Reference::Omitted),
        Some(Value::Null) => Ok(Reference::Cleared),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(Reference::Cleared),
        Some(Value::String(s)) => Ok(Reference::Set(s.trim().to_owned())),
        Some(other) => Err(format!("expected string or null, got {other}")),
    }
}

/// Rewrites every cleared reference in `changes` to an explicit `null`.
pub fn clear_blank_references(changes: &mut Map<String, Value>, fields: &[&str]) -> Result<(), String> {
    for field in fields {
        match classify_reference(changes.get(*field)).map_err(|err| format!("{field}: {err}"))? {
            Reference::Cleared => {
                changes.insert((*field).to_string(), Value::Null);
            }
            Reference::Set(id) => {
                changes.insert((*field).to_string(), Value::String(id));
            }
            Reference::Omitted => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn blank_strings_clear_references() {
        let mut changes = json!({ "groupId": "  ", "sectionId": " s-1 ", "title": "" })
            .as_object()
            .cloned()
            .unwrap_or_default();
        clear_blank_references(&mut changes, &["groupId", "sectionId", "eventId"]).unwrap();
        assert_eq!(changes["groupId"], Value::Null);
        assert_eq!(changes["sectionId"], "s-1");
        assert_eq!(changes["title"], "");
        assert!(!changes.contains_key("eventId"));
    }

    #[test]
    fn non_string_references_are_rejected() {
        assert_eq!(
            classify_reference(Some(&json!(7))),
            Err("expected string or null, got 7".to_string())
        );
    }
}
