//! Field-level validation of submitted values.
//!
//! Each field declares an ordered list of `[predicate, message]` rules. The
//! first rule whose predicate does not hold produces that field's message.
//! A predicate holds when its result is truthy, the same reading conditions
//! and loops use. Failures are user feedback, not engine errors: a predicate
//! that cannot be evaluated against the submitted values (wrong type, missing
//! field) fails its rule. Only a predicate that cannot be parsed at all
//! surfaces as a [`FlowError`].
//!
//! Rules are part of the input's value, so `${{ }}` segments inside them are
//! resolved when the step is materialized. A predicate that refers to the
//! submitted fields is written bare (`age >= 18`).

use formflow_types::FieldError;
use serde_json::{Map as JsonMap, Value};
use tracing::debug;

use crate::{
    error::FlowError,
    expression::{EvaluationError, Evaluator},
    point::InputPoint,
};

/// Checks `values` against the validators of `point`.
///
/// Predicates see the point's environment with `values` layered on top, so a
/// rule can refer both to the fields being submitted and to earlier answers.
/// Fields are checked in declaration order.
pub fn validate_submission(
    evaluator: &dyn Evaluator,
    point: &InputPoint,
    values: &JsonMap<String, Value>,
) -> Result<Vec<FieldError>, FlowError> {
    let scope = point.with_environment(values);
    let environment = scope.environment();
    let mut errors = Vec::new();

    for (field, rules) in &point.value().validators {
        for rule in rules {
            let holds = match evaluator.test(&rule.predicate, environment) {
                Ok(holds) => holds,
                Err(source @ EvaluationError::Parse { .. }) => return Err(FlowError::expression(point.address(), source)),
                Err(source) => {
                    debug!(
                        address = %point.address(),
                        field = field.as_str(),
                        error = %source,
                        "validation rule could not be evaluated against the submission"
                    );
                    false
                }
            };
            if !holds {
                errors.push(FieldError::new(field.as_str(), rule.message.as_str()));
                break;
            }
        }
    }

    Ok(errors)
}
