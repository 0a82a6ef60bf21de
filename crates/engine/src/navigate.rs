//! Per-kind navigation rules.
//!
//! The navigator answers two questions about a flow node: which child is
//! entered first, and which sibling follows a given child. Only conditions
//! and loops consult the environment; sequences are purely structural.

use formflow_types::{Address, Branch, Environment, Selector};

use crate::{
    error::FlowError,
    expression::Evaluator,
    model::{FlowNode, LoopNode},
};

/// Stateless navigation over [`FlowNode`]s.
#[derive(Clone, Copy)]
pub struct Navigator<'a> {
    evaluator: &'a dyn Evaluator,
}

impl<'a> Navigator<'a> {
    pub fn new(evaluator: &'a dyn Evaluator) -> Self {
        Self { evaluator }
    }

    /// Selector of the first child to visit when entering `node`.
    ///
    /// `address` names `node` and is only used for error reporting.
    pub fn descend(&self, node: &FlowNode, address: &Address, environment: &Environment) -> Result<Option<Selector>, FlowError> {
        match node {
            FlowNode::Sequence(children) => Ok((!children.is_empty()).then_some(Selector::Index(0))),
            FlowNode::Condition(condition) => {
                let branch = if self.test(&condition.predicate, address, environment)? {
                    Branch::Then
                } else {
                    Branch::Else
                };
                Ok((node.len(Some(branch)) > 0).then_some(Selector::Branch(branch, 0)))
            }
            FlowNode::Loop(LoopNode { predicate, body }) => {
                if !self.test(predicate, address, environment)? || body.is_empty() {
                    return Ok(None);
                }
                Ok(Some(Selector::Index(0)))
            }
            leaf => Err(FlowError::invalid_address(address, format!("cannot descend into a {} leaf", leaf.kind()))),
        }
    }

    /// Selector of the sibling after `current` within `node`.
    ///
    /// A condition never crosses from one branch to the other. A loop wraps
    /// back to its first child while its predicate still holds.
    pub fn advance(
        &self,
        node: &FlowNode,
        current: Selector,
        address: &Address,
        environment: &Environment,
    ) -> Result<Option<Selector>, FlowError> {
        match (node, current) {
            (FlowNode::Sequence(children), Selector::Index(index)) => {
                Ok((index + 1 < children.len()).then_some(Selector::Index(index + 1)))
            }
            (FlowNode::Condition(_), Selector::Branch(branch, index)) => {
                Ok((index + 1 < node.len(Some(branch))).then_some(Selector::Branch(branch, index + 1)))
            }
            (FlowNode::Loop(LoopNode { predicate, body }), Selector::Index(index)) => {
                if index + 1 < body.len() {
                    return Ok(Some(Selector::Index(index + 1)));
                }
                if self.test(predicate, address, environment)? {
                    return Ok(Some(Selector::Index(0)));
                }
                Ok(None)
            }
            (other, selector) => Err(FlowError::invalid_address(
                &address.child(selector),
                format!("selector {selector} does not apply to a {}", other.kind()),
            )),
        }
    }

    fn test(&self, predicate: &serde_json::Value, address: &Address, environment: &Environment) -> Result<bool, FlowError> {
        self.evaluator
            .test(predicate, environment)
            .map_err(|source| FlowError::expression(address, source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::TemplateEvaluator;
    use serde_json::json;

    fn node(value: serde_json::Value) -> FlowNode {
        FlowNode::from_json(&value).expect("classify node")
    }

    fn env(pairs: &[(&str, serde_json::Value)]) -> Environment {
        pairs.iter().map(|(name, value)| (name.to_string(), value.clone())).collect()
    }

    #[test]
    fn sequence_walks_indexes_in_order() {
        let navigator = Navigator::new(&TemplateEvaluator);
        let sequence = node(json!([{ "return": 1 }, { "return": 2 }]));
        let root = Address::root();
        let environment = Environment::new();

        assert_eq!(navigator.descend(&sequence, &root, &environment).unwrap(), Some(Selector::Index(0)));
        assert_eq!(
            navigator.advance(&sequence, Selector::Index(0), &root, &environment).unwrap(),
            Some(Selector::Index(1))
        );
        assert_eq!(navigator.advance(&sequence, Selector::Index(1), &root, &environment).unwrap(), None);
        assert_eq!(navigator.descend(&node(json!([])), &root, &environment).unwrap(), None);
    }

    #[test]
    fn condition_picks_branch_once_and_never_crosses() {
        let navigator = Navigator::new(&TemplateEvaluator);
        let condition = node(json!({ "cond": {
            "if": "x > 0",
            "then": [{ "return": "a" }, { "return": "b" }],
            "else": [{ "return": "c" }]
        } }));
        let root = Address::root();

        let positive = env(&[("x", json!(1))]);
        assert_eq!(
            navigator.descend(&condition, &root, &positive).unwrap(),
            Some(Selector::Branch(Branch::Then, 0))
        );
        assert_eq!(
            navigator
                .advance(&condition, Selector::Branch(Branch::Then, 0), &root, &positive)
                .unwrap(),
            Some(Selector::Branch(Branch::Then, 1))
        );
        assert_eq!(
            navigator
                .advance(&condition, Selector::Branch(Branch::Then, 1), &root, &positive)
                .unwrap(),
            None
        );

        let negative = env(&[("x", json!(-1))]);
        assert_eq!(
            navigator.descend(&condition, &root, &negative).unwrap(),
            Some(Selector::Branch(Branch::Else, 0))
        );
        assert_eq!(
            navigator
                .advance(&condition, Selector::Branch(Branch::Else, 0), &root, &negative)
                .unwrap(),
            None
        );
    }

    #[test]
    fn empty_taken_branch_yields_nothing() {
        let navigator = Navigator::new(&TemplateEvaluator);
        let condition = node(json!({ "cond": { "if": false, "then": [{ "return": 1 }] } }));
        assert_eq!(navigator.descend(&condition, &Address::root(), &Environment::new()).unwrap(), None);
    }

    #[test]
    fn loop_rechecks_predicate_at_body_boundary() {
        let navigator = Navigator::new(&TemplateEvaluator);
        let looping = node(json!({ "loop": { "while": "n < 2", "do": [{ "variables": {} }, { "variables": {} }] } }));
        let root = Address::root();

        assert_eq!(navigator.descend(&looping, &root, &env(&[("n", json!(5))])).unwrap(), None);
        assert_eq!(
            navigator.descend(&looping, &root, &env(&[("n", json!(0))])).unwrap(),
            Some(Selector::Index(0))
        );
        // Mid-body advance does not consult the predicate.
        assert_eq!(
            navigator
                .advance(&looping, Selector::Index(0), &root, &env(&[("n", json!(9))]))
                .unwrap(),
            Some(Selector::Index(1))
        );
        assert_eq!(
            navigator
                .advance(&looping, Selector::Index(1), &root, &env(&[("n", json!(1))]))
                .unwrap(),
            Some(Selector::Index(0))
        );
        assert_eq!(
            navigator
                .advance(&looping, Selector::Index(1), &root, &env(&[("n", json!(2))]))
                .unwrap(),
            None
        );
    }

    #[test]
    fn predicate_failures_carry_the_node_address() {
        let navigator = Navigator::new(&TemplateEvaluator);
        let condition = node(json!({ "cond": { "if": "missing > 0", "then": [] } }));
        let address = Address::from(vec![Selector::Index(3)]);
        match navigator.descend(&condition, &address, &Environment::new()) {
            Err(FlowError::Expression { address: at, .. }) => assert_eq!(at, address),
            other => panic!("expected expression error, got {other:?}"),
        }
    }

    #[test]
    fn mismatched_selectors_and_leaves_are_invalid_addresses() {
        let navigator = Navigator::new(&TemplateEvaluator);
        let environment = Environment::new();
        let sequence = node(json!([{ "return": 1 }]));
        assert!(matches!(
            navigator.advance(&sequence, Selector::Branch(Branch::Then, 0), &Address::root(), &environment),
            Err(FlowError::InvalidAddress { .. })
        ));
        assert!(matches!(
            navigator.descend(&node(json!({ "form": {} })), &Address::root(), &environment),
            Err(FlowError::InvalidAddress { .. })
        ));
    }
}
