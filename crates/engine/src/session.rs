//! Caller-side walk history for a single run of a flow.
//!
//! A session keeps the stack of input points shown so far. Submitting
//! validates, asks the engine for the next stop, and pushes it; stepping back
//! discards the newest entry. Earlier points already hold their evaluated
//! values, so going back never re-evaluates anything.

use formflow_types::{Environment, FieldError};
use serde_json::{Map as JsonMap, Value};
use tracing::{debug, info};

use crate::{
    error::FlowError,
    flow::Flow,
    point::{InputPoint, Stop},
    validate::validate_submission,
};

/// Result of [`FlowSession::submit`].
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// Validation failed; the session did not move.
    Rejected(Vec<FieldError>),
    /// A new input step is now current.
    Advanced,
    /// The flow reached its terminal; carries the result.
    Finished(Value),
}

/// Exclusive owner of one walk over a [`Flow`].
#[derive(Debug, Clone)]
pub struct FlowSession<'f> {
    flow: &'f Flow,
    previous: Vec<InputPoint>,
    current: InputPoint,
    outcome: Option<Value>,
}

impl<'f> FlowSession<'f> {
    pub fn start(flow: &'f Flow) -> Result<Self, FlowError> {
        Self::start_with(flow, Environment::new())
    }

    /// Starts a walk with seed variables already in scope.
    pub fn start_with(flow: &'f Flow, environment: Environment) -> Result<Self, FlowError> {
        let current = flow.initial_with(environment)?;
        Ok(Self {
            flow,
            previous: Vec::new(),
            current,
            outcome: None,
        })
    }

    /// The input step awaiting values (the last one shown once finished).
    pub fn current(&self) -> &InputPoint {
        &self.current
    }

    /// Every input point on the stack, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &InputPoint> {
        self.previous.iter().chain(std::iter::once(&self.current))
    }

    pub fn depth(&self) -> usize {
        self.previous.len() + 1
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn outcome(&self) -> Option<&Value> {
        self.outcome.as_ref()
    }

    /// Validates `values` against the current step without moving.
    pub fn validate(&self, values: &JsonMap<String, Value>) -> Result<Vec<FieldError>, FlowError> {
        validate_submission(self.flow.evaluator(), &self.current, values)
    }

    /// Submits values for the current step.
    ///
    /// On any error the session is left exactly as it was.
    pub fn submit(&mut self, values: JsonMap<String, Value>) -> Result<Submission, FlowError> {
        if self.is_finished() {
            return Err(FlowError::invalid_flow("the session has finished; step back before submitting again"));
        }

        let errors = self.validate(&values)?;
        if !errors.is_empty() {
            debug!(address = %self.current.address(), failures = errors.len(), "submission rejected");
            return Ok(Submission::Rejected(errors));
        }

        let (settled, stop) = self.flow.next(&self.current, &values)?;
        match stop {
            Stop::Input(next) => {
                self.previous.push(settled);
                self.current = next;
                debug!(address = %self.current.address(), depth = self.depth(), "session advanced");
                Ok(Submission::Advanced)
            }
            Stop::Terminal(terminal) => {
                self.current = settled;
                info!(address = %terminal.address(), "flow finished");
                let value = terminal.into_value();
                self.outcome = Some(value.clone());
                Ok(Submission::Finished(value))
            }
        }
    }

    /// Steps back one input.
    ///
    /// From a finished session this re-opens the last step. Returns `false`
    /// when already at the first step.
    pub fn back(&mut self) -> bool {
        if self.outcome.take().is_some() {
            return true;
        }
        match self.previous.pop() {
            Some(point) => {
                self.current = point;
                debug!(address = %self.current.address(), depth = self.depth(), "session stepped back");
                true
            }
            None => false,
        }
    }
}
