//! Materialized payload of an input step.
//!
//! An input leaf's expression evaluates to a value shaped like
//! `{ defaults, validators, presentation }`. Rendering collaborators draw the
//! presentation, seed the fields from `defaults`, and check submissions
//! against `validators`. The older authoring names `defaultValues`,
//! `resolver`, and `render` are accepted as aliases.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value};

/// Evaluated value of an input step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputValue {
    /// Initial field values, keyed by field name.
    #[serde(default, alias = "defaultValues")]
    pub defaults: JsonMap<String, Value>,
    /// Ordered validation rules per field.
    #[serde(default, alias = "resolver")]
    pub validators: IndexMap<String, Vec<ValidationRule>>,
    /// Opaque description handed to the renderer.
    #[serde(default, alias = "render")]
    pub presentation: Value,
}

/// A predicate paired with the message shown when it does not hold.
///
/// Authored as a two element array: `["age >= 18", "Too young"]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "(Value, String)", into = "(Value, String)")]
pub struct ValidationRule {
    pub predicate: Value,
    pub message: String,
}

impl From<(Value, String)> for ValidationRule {
    fn from((predicate, message): (Value, String)) -> Self {
        Self { predicate, message }
    }
}

impl From<ValidationRule> for (Value, String) {
    fn from(rule: ValidationRule) -> Self {
        (rule.predicate, rule.message)
    }
}

/// Field-level validation failure surfaced to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}
