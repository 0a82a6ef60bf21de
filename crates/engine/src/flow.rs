//! The flow engine: turns "submit values at this input" into "the next input
//! or the final result".
//!
//! The walk is a resumable depth-first, pre-order traversal. Between calls the
//! only state is the [`InputPoint`] the caller holds; each call re-enters the
//! tree from its root through addresses. Binding leaves are absorbed inside
//! the walk and never observed by the caller.

use std::{fmt, sync::Arc};

use formflow_types::{Address, Environment};
use serde_json::{Map as JsonMap, Value};
use tracing::debug;

use crate::{
    error::FlowError,
    expression::{Evaluator, TemplateEvaluator},
    model::{FlowNode, NodeKind},
    navigate::Navigator,
    point::{InputPoint, Point, Stop},
};

/// What the walk does with the address it currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Move {
    /// Visit the node at the address: stop on it, absorb it, or enter it.
    Enter,
    /// Move past the node at the address, climbing while levels run out.
    Advance,
}

/// An immutable flow tree paired with the evaluator used to walk it.
#[derive(Clone)]
pub struct Flow {
    root: FlowNode,
    evaluator: Arc<dyn Evaluator>,
}

impl fmt::Debug for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flow").field("root", &self.root).finish_non_exhaustive()
    }
}

impl Flow {
    /// Wraps a classified tree. The root must be a sequence.
    pub fn new(root: FlowNode) -> Result<Self, FlowError> {
        if root.kind() != NodeKind::Sequence {
            return Err(FlowError::invalid_flow(format!(
                "the root node must be a sequence, found a {}",
                root.kind()
            )));
        }
        Ok(Self {
            root,
            evaluator: Arc::new(TemplateEvaluator),
        })
    }

    /// Classifies a raw JSON tree and wraps it.
    pub fn from_json(value: &Value) -> Result<Self, FlowError> {
        Self::new(FlowNode::from_json(value)?)
    }

    /// Replaces the default [`TemplateEvaluator`].
    pub fn with_evaluator(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn root(&self) -> &FlowNode {
        &self.root
    }

    pub fn evaluator(&self) -> &dyn Evaluator {
        self.evaluator.as_ref()
    }

    /// First input step, starting from an empty environment.
    pub fn initial(&self) -> Result<InputPoint, FlowError> {
        self.initial_with(Environment::new())
    }

    /// First input step, starting from `environment`.
    ///
    /// A flow must begin with an input: reaching a terminal first, or no leaf
    /// at all, is [`FlowError::InvalidFlow`].
    pub fn initial_with(&self, environment: Environment) -> Result<InputPoint, FlowError> {
        match self.seek(Address::root(), environment, Move::Enter)? {
            Stop::Input(point) => Ok(point),
            Stop::Terminal(point) => Err(FlowError::invalid_flow(format!(
                "terminal at {} is reached before any input",
                point.address()
            ))),
        }
    }

    /// Completes `current` with `values` and walks to the next stop.
    ///
    /// Returns the settled current point (its defaults replaced by `values`)
    /// together with the next input or terminal. The walk resumes right after
    /// `current`, with `values` merged into the environment.
    pub fn next(&self, current: &InputPoint, values: &JsonMap<String, Value>) -> Result<(InputPoint, Stop), FlowError> {
        let settled = current.with_submitted_defaults(values);
        let environment = current.with_environment(values).environment().clone();
        let stop = self.seek(current.address().clone(), environment, Move::Advance)?;
        Ok((settled, stop))
    }

    fn seek(&self, mut address: Address, mut environment: Environment, mut step: Move) -> Result<Stop, FlowError> {
        let navigator = Navigator::new(self.evaluator.as_ref());
        loop {
            match step {
                Move::Enter => match Point::create(&self.root, address.clone(), environment.clone(), self.evaluator())? {
                    Point::Input(point) => {
                        debug!(address = %point.address(), "walk stopped at input");
                        return Ok(Stop::Input(point));
                    }
                    Point::Terminal(point) => {
                        debug!(address = %point.address(), "walk stopped at terminal");
                        return Ok(Stop::Terminal(point));
                    }
                    Point::Binding(point) => {
                        debug!(
                            address = %point.address(),
                            names = ?point.value().keys().collect::<Vec<_>>(),
                            "absorbed binding"
                        );
                        environment = point.with_environment(point.value()).environment().clone();
                        step = Move::Advance;
                    }
                    Point::Flow(_) => {
                        let node = self.root.resolve(&address)?;
                        match navigator.descend(node, &address, &environment)? {
                            Some(selector) => address.push(selector),
                            None => step = Move::Advance,
                        }
                    }
                },
                Move::Advance => {
                    let Some(current) = address.pop() else {
                        return Err(FlowError::invalid_flow(
                            "the walk left the root without reaching an input or terminal",
                        ));
                    };
                    let parent = self.root.resolve(&address)?;
                    if let Some(selector) = navigator.advance(parent, current, &address, &environment)? {
                        address.push(selector);
                        step = Move::Enter;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formflow_types::{Branch, Selector};
    use serde_json::json;

    fn form(name: &str) -> Value {
        json!({ "form": { "defaults": {}, "presentation": name } })
    }

    fn values(pairs: &[(&str, Value)]) -> JsonMap<String, Value> {
        pairs.iter().map(|(name, value)| (name.to_string(), value.clone())).collect()
    }

    #[test]
    fn rejects_non_sequence_root() {
        let result = Flow::from_json(&json!({ "form": {} }));
        assert!(matches!(result, Err(FlowError::InvalidFlow(_))));
    }

    #[test]
    fn initial_skips_empty_flow_nodes() {
        let flow = Flow::from_json(&json!([
            [],
            { "cond": { "if": true, "then": [] } },
            { "loop": { "while": false, "do": [form("never")] } },
            [[form("A")]]
        ]))
        .unwrap();
        let point = flow.initial().unwrap();
        assert_eq!(
            point.address(),
            &Address::from(vec![Selector::Index(3), Selector::Index(0), Selector::Index(0)])
        );
        assert_eq!(point.value().presentation, json!("A"));
    }

    #[test]
    fn initial_rejects_flows_without_a_leading_input() {
        let empty = Flow::from_json(&json!([[], { "variables": {} }])).unwrap();
        assert!(matches!(empty.initial(), Err(FlowError::InvalidFlow(_))));

        let terminal_first = Flow::from_json(&json!([{ "return": 1 }, form("A")])).unwrap();
        assert!(matches!(terminal_first.initial(), Err(FlowError::InvalidFlow(_))));
    }

    #[test]
    fn next_climbs_out_of_nested_levels() {
        let flow = Flow::from_json(&json!([
            { "cond": { "if": true, "then": [[form("A")]], "else": [form("skipped")] } },
            { "return": "done" }
        ]))
        .unwrap();
        let first = flow.initial().unwrap();
        assert_eq!(
            first.address(),
            &Address::from(vec![Selector::Index(0), Selector::Branch(Branch::Then, 0), Selector::Index(0)])
        );

        let (_, stop) = flow.next(&first, &JsonMap::new()).unwrap();
        assert_eq!(stop.as_terminal().map(|point| point.value().clone()), Some(json!("done")));
    }

    #[test]
    fn next_fails_when_the_tree_runs_out() {
        let flow = Flow::from_json(&json!([form("A")])).unwrap();
        let first = flow.initial().unwrap();
        assert!(matches!(flow.next(&first, &JsonMap::new()), Err(FlowError::InvalidFlow(_))));
    }

    #[test]
    fn submitted_values_are_visible_to_later_nodes() {
        let flow = Flow::from_json(&json!([
            form("A"),
            { "variables": { "greeting": "Hello ${{ name }}" } },
            { "return": { "message": "${{ greeting }}", "name": "${{ name }}" } }
        ]))
        .unwrap();
        let first = flow.initial().unwrap();
        let (settled, stop) = flow.next(&first, &values(&[("name", json!("Ada"))])).unwrap();

        assert_eq!(settled.value().defaults["name"], json!("Ada"));
        assert!(settled.environment().get("name").is_none());
        let terminal = stop.as_terminal().expect("terminal");
        assert_eq!(terminal.value(), &json!({ "message": "Hello Ada", "name": "Ada" }));
        assert_eq!(terminal.environment().get("greeting"), Some(&json!("Hello Ada")));
    }

    #[test]
    fn expression_errors_leave_the_current_point_usable() {
        let flow = Flow::from_json(&json!([
            form("A"),
            { "variables": { "ratio": "${{ total / count }}" } },
            form("B")
        ]))
        .unwrap();
        let first = flow.initial().unwrap();

        let failing = flow.next(&first, &values(&[("total", json!(1)), ("count", json!(0))]));
        assert!(matches!(failing, Err(FlowError::Expression { .. })));

        let (_, stop) = flow
            .next(&first, &values(&[("total", json!(6)), ("count", json!(3))]))
            .unwrap();
        let next = stop.as_input().expect("input");
        assert_eq!(next.environment().get("ratio"), Some(&json!(2)));
    }

    #[test]
    fn runaway_predicates_fail_instead_of_overflowing() {
        let predicate = format!("{}x", "!".repeat(200_000));
        let flow = Flow::from_json(&json!([
            { "cond": { "if": predicate, "then": [form("A")], "else": [form("B")] } }
        ]))
        .unwrap();
        let failing = flow.initial_with([("x".to_string(), json!(true))].into_iter().collect());
        assert!(matches!(
            failing,
            Err(FlowError::Expression {
                source: crate::expression::EvaluationError::Parse { .. },
                ..
            })
        ));
    }

    #[test]
    fn custom_evaluator_is_used_for_every_expression() {
        struct Constant;
        impl Evaluator for Constant {
            fn evaluate(&self, _: &Value, _: &Environment) -> Result<Value, crate::expression::EvaluationError> {
                Ok(json!({ "defaults": { "fixed": true } }))
            }
        }

        let flow = Flow::from_json(&json!([{ "form": "ignored" }]))
            .unwrap()
            .with_evaluator(Arc::new(Constant));
        let point = flow.initial().unwrap();
        assert_eq!(point.value().defaults["fixed"], json!(true));
    }
}
