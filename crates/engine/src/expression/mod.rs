//! # Expression Evaluation
//!
//! Every leaf of a flow tree carries one JSON value that is materialized
//! against the walk's [`Environment`]; condition and loop nodes carry a
//! predicate. The engine only ever talks to an [`Evaluator`], so hosts can plug
//! in their own expression language. [`TemplateEvaluator`] is the default.
//!
//! ## Template Syntax
//!
//! - A string that is exactly `${{ expr }}` evaluates to the typed result of
//!   `expr` (a number stays a number, a list stays a list).
//! - A string with embedded `${{ ... }}` segments is interpolated as text.
//! - Other strings and scalars are literals; lists and objects are evaluated
//!   element by element.
//! - Predicates may be written bare (`n < 3`) or wrapped (`${{ n < 3 }}`).
//!
//! ## Usage
//!
//! ```rust
//! use formflow_engine::expression::{Evaluator, TemplateEvaluator};
//! use formflow_types::Environment;
//! use serde_json::json;
//!
//! let environment: Environment = [("n".to_string(), json!(2))].into_iter().collect();
//! let evaluator = TemplateEvaluator;
//!
//! let value = evaluator.evaluate(&json!({ "next": "${{ n + 1 }}", "label": "step ${{ n }}" }), &environment)?;
//! assert_eq!(value, json!({ "next": 3, "label": "step 2" }));
//! assert!(evaluator.test(&json!("n < 3"), &environment)?);
//! # Ok::<(), formflow_engine::expression::EvaluationError>(())
//! ```

mod eval;
mod parser;

use formflow_types::Environment;
use serde_json::Value;
use thiserror::Error;

pub use eval::{format_json_value, is_truthy, json_equals};

/// Failure raised while evaluating an expression or consuming its result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    #[error("cannot parse expression '{expression}': {reason}")]
    Parse { expression: String, reason: String },
    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),
    #[error("type error: {0}")]
    Type(String),
    #[error("division by zero")]
    DivisionByZero,
    /// The value was produced but does not have the shape its consumer needs.
    #[error("expected {expected}, got {found}")]
    UnexpectedShape { expected: String, found: String },
}

/// Pure evaluation of data-binding expressions.
///
/// Implementations must not have side effects and must only read from the
/// provided environment.
pub trait Evaluator: Send + Sync {
    /// Materializes `expression` against `environment`.
    fn evaluate(&self, expression: &Value, environment: &Environment) -> Result<Value, EvaluationError>;

    /// Decides how a non-boolean predicate result is read.
    ///
    /// The default follows [`is_truthy`].
    fn truthy(&self, value: &Value) -> bool {
        is_truthy(value)
    }

    /// Evaluates a condition, loop, or validation predicate.
    fn test(&self, predicate: &Value, environment: &Environment) -> Result<bool, EvaluationError> {
        let value = self.evaluate(predicate, environment)?;
        Ok(self.truthy(&value))
    }
}

/// Default evaluator for `${{ ... }}` templates.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateEvaluator;

impl TemplateEvaluator {
    /// Evaluates raw expression source such as `n + 1`.
    pub fn evaluate_source(&self, source: &str, environment: &Environment) -> Result<Value, EvaluationError> {
        let expression = parser::parse(source)?;
        eval::evaluate(&expression, environment)
    }

    fn evaluate_text(&self, text: &str, environment: &Environment) -> Result<Value, EvaluationError> {
        if let Some(source) = single_template(text) {
            return self.evaluate_source(source, environment);
        }
        if !text.contains("${{") {
            return Ok(Value::String(text.to_string()));
        }

        let mut output = String::new();
        let mut remaining = text;
        while let Some(start) = remaining.find("${{") {
            let (before, after) = remaining.split_at(start);
            output.push_str(before);
            let Some(end) = after.find("}}") else {
                // Unterminated marker: keep the rest verbatim.
                output.push_str(after);
                return Ok(Value::String(output));
            };
            let value = self.evaluate_source(after[3..end].trim(), environment)?;
            output.push_str(&format_json_value(&value));
            remaining = &after[end + 2..];
        }
        output.push_str(remaining);
        Ok(Value::String(output))
    }
}

impl Evaluator for TemplateEvaluator {
    fn evaluate(&self, expression: &Value, environment: &Environment) -> Result<Value, EvaluationError> {
        match expression {
            Value::String(text) => self.evaluate_text(text, environment),
            Value::Array(items) => items
                .iter()
                .map(|item| self.evaluate(item, environment))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Value::Object(map) => {
                let mut evaluated = serde_json::Map::new();
                for (key, value) in map {
                    evaluated.insert(key.clone(), self.evaluate(value, environment)?);
                }
                Ok(Value::Object(evaluated))
            }
            scalar => Ok(scalar.clone()),
        }
    }

    fn test(&self, predicate: &Value, environment: &Environment) -> Result<bool, EvaluationError> {
        let value = match predicate {
            Value::String(text) => self.evaluate_source(&normalize_condition_expression(text), environment)?,
            other => self.evaluate(other, environment)?,
        };
        Ok(self.truthy(&value))
    }
}

/// Trims a condition and strips an outer `${{ ... }}` wrapper when present.
pub fn normalize_condition_expression(raw_expression: &str) -> String {
    match single_template(raw_expression) {
        Some(inner) => inner.to_string(),
        None => raw_expression.trim().to_string(),
    }
}

/// Returns the inner source when `text` is exactly one `${{ ... }}` block.
fn single_template(text: &str) -> Option<&str> {
    let inner = text.trim().strip_prefix("${{")?.strip_suffix("}}")?;
    if inner.contains("${{") || inner.contains("}}") {
        return None;
    }
    Some(inner.trim())
}
