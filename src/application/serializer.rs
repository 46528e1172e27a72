//! Wire representation of a todo and validation of incoming payloads.
//!
//! Field names on the wire match the entity. Incoming fields distinguish
//! "absent" from an explicit `null`, so PATCH can tell them apart. Text
//! fields are trimmed.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::domain::todo::{CreateTodo, Todo, UpdateTodo};

pub const TITLE_MAX_LENGTH: usize = 200;

const REQUIRED: &str = "This field is required.";
const NULL: &str = "This field may not be null.";
const BLANK: &str = "This field may not be blank.";
const NOT_A_STRING: &str = "Not a valid string.";
const NOT_A_BOOLEAN: &str = "Must be a valid boolean.";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TodoRepresentation {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Todo> for TodoRepresentation {
    fn from(t: Todo) -> Self {
        Self { id: t.id.0, title: t.title, description: t.description, completed: t.completed, created_at: t.created_at }
    }
}

/// Request body for create, replace and partial update.
///
/// Fields are kept as raw JSON so that type errors end up in the field-level
/// error map. `None` means the field was left out, `Some(Value::Null)` means
/// it was sent as `null`. Read-only and unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TodoWrite {
    #[serde(default, deserialize_with = "present")]
    pub title: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub completed: Option<Value>,
}

fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

/// Field-level validation failures, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(transparent)]
#[error("invalid fields: {}", .0.keys().copied().collect::<Vec<_>>().join(", "))]
pub struct ValidationError(pub BTreeMap<&'static str, Vec<String>>);

impl ValidationError {
    fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    #[cfg(test)]
    pub(crate) fn messages(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    fn into_result<T>(self, value: T) -> Result<T, ValidationError> {
        if self.0.is_empty() { Ok(value) } else { Err(self) }
    }
}

/// POST: title required, description optional.
pub fn validate_create(input: TodoWrite) -> Result<CreateTodo, ValidationError> {
    let mut errors = ValidationError::default();
    let title = required_title(input.title, &mut errors);
    let description = text(input.description, "description", &mut errors).unwrap_or_default();
    errors.into_result(CreateTodo { title: title.unwrap_or_default(), description })
}

/// PUT: title required; omitted description and completed fall back to their defaults.
pub fn validate_replace(input: TodoWrite) -> Result<UpdateTodo, ValidationError> {
    let mut errors = ValidationError::default();
    let title = required_title(input.title, &mut errors);
    let description = text(input.description, "description", &mut errors).unwrap_or_default();
    let completed = boolean(input.completed, "completed", &mut errors).unwrap_or(false);
    errors.into_result(UpdateTodo::replace(title.unwrap_or_default(), description, completed))
}

/// PATCH: only the fields present are validated and applied.
pub fn validate_patch(input: TodoWrite) -> Result<UpdateTodo, ValidationError> {
    let mut errors = ValidationError::default();
    let title = match input.title {
        None => None,
        some => required_title(some, &mut errors),
    };
    let description = text(input.description, "description", &mut errors);
    let completed = boolean(input.completed, "completed", &mut errors);
    errors.into_result(UpdateTodo { title, description, completed })
}

fn required_title(value: Option<Value>, errors: &mut ValidationError) -> Option<String> {
    if value.is_none() {
        errors.add("title", REQUIRED);
        return None;
    }
    let title = text(value, "title", errors)?;
    if title.is_empty() {
        errors.add("title", BLANK);
    } else if title.chars().count() > TITLE_MAX_LENGTH {
        errors.add("title", format!("Ensure this field has no more than {TITLE_MAX_LENGTH} characters."));
    } else {
        return Some(title);
    }
    None
}

/// Trimmed text. Numbers are taken in their JSON spelling; other types are errors.
fn text(value: Option<Value>, field: &'static str, errors: &mut ValidationError) -> Option<String> {
    match value? {
        Value::Null => errors.add(field, NULL),
        Value::String(s) => return Some(s.trim().to_string()),
        Value::Number(n) => return Some(n.to_string()),
        _ => errors.add(field, NOT_A_STRING),
    }
    None
}

fn boolean(value: Option<Value>, field: &'static str, errors: &mut ValidationError) -> Option<bool> {
    match value? {
        Value::Null => errors.add(field, NULL),
        Value::Bool(b) => return Some(b),
        Value::Number(n) if n.as_i64() == Some(1) => return Some(true),
        Value::Number(n) if n.as_i64() == Some(0) => return Some(false),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "yes" | "y" | "on" | "1" => return Some(true),
            "false" | "f" | "no" | "n" | "off" | "0" => return Some(false),
            _ => errors.add(field, NOT_A_BOOLEAN),
        },
        _ => errors.add(field, NOT_A_BOOLEAN),
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write(value: serde_json::Value) -> TodoWrite { serde_json::from_value(value).unwrap() }

    #[test]
    fn create_requires_title() {
        let err = validate_create(write(json!({ "description": "Sin título" }))).unwrap_err();
        assert_eq!(err.messages("title"), [REQUIRED]);
    }

    #[test]
    fn create_rejects_blank_and_null_titles() {
        assert_eq!(validate_create(write(json!({ "title": "   " }))).unwrap_err().messages("title"), [BLANK]);
        assert_eq!(validate_create(write(json!({ "title": null }))).unwrap_err().messages("title"), [NULL]);
    }

    #[test]
    fn create_rejects_overlong_title() {
        let title = "x".repeat(TITLE_MAX_LENGTH + 1);
        let err = validate_create(write(json!({ "title": title }))).unwrap_err();
        assert_eq!(err.messages("title").len(), 1);
        assert!(validate_create(write(json!({ "title": "x".repeat(TITLE_MAX_LENGTH) }))).is_ok());
    }

    #[test]
    fn create_defaults_description_and_trims_title() {
        let input = validate_create(write(json!({ "title": "  Nuevo todo ", "completed": true, "id": 7 }))).unwrap();
        assert_eq!(input, CreateTodo::new("Nuevo todo"));
    }

    #[test]
    fn replace_fills_defaults() {
        let update = validate_replace(write(json!({ "title": "t" }))).unwrap();
        assert_eq!(update, UpdateTodo::replace("t".into(), String::new(), false));
        assert!(validate_replace(write(json!({ "completed": true }))).is_err());
    }

    #[test]
    fn patch_only_touches_given_fields() {
        let update = validate_patch(write(json!({ "title": "Título actualizado" }))).unwrap();
        assert_eq!(update, UpdateTodo { title: Some("Título actualizado".into()), ..Default::default() });
        assert!(validate_patch(write(json!({}))).unwrap().is_empty());
    }

    #[test]
    fn patch_rejects_null_fields() {
        let err = validate_patch(write(json!({ "description": null, "completed": null }))).unwrap_err();
        assert_eq!(err.messages("description"), [NULL]);
        assert_eq!(err.messages("completed"), [NULL]);
        assert!(err.messages("title").is_empty());
    }

    #[test]
    fn errors_serialize_as_field_map() {
        let err = validate_create(TodoWrite::default()).unwrap_err();
        assert_eq!(serde_json::to_value(&err).unwrap(), json!({ "title": [REQUIRED] }));
    }

    #[test]
    fn wrong_types_become_field_errors() {
        let err = validate_patch(write(json!({ "title": true, "description": [1], "completed": "maybe" }))).unwrap_err();
        assert_eq!(err.messages("title"), [NOT_A_STRING]);
        assert_eq!(err.messages("description"), [NOT_A_STRING]);
        assert_eq!(err.messages("completed"), [NOT_A_BOOLEAN]);
    }

    #[test]
    fn lenient_scalars_are_coerced() {
        let update = validate_patch(write(json!({ "title": 5, "completed": "yes" }))).unwrap();
        assert_eq!(update.title.as_deref(), Some("5"));
        assert_eq!(update.completed, Some(true));
        assert_eq!(validate_patch(write(json!({ "completed": 0 }))).unwrap().completed, Some(false));
    }

    #[test]
    fn description_is_trimmed() {
        let input = validate_create(write(json!({ "title": "t", "description": "  Nueva descripción \n" }))).unwrap();
        assert_eq!(input.description, "Nueva descripción");
    }
}
