//! Execution points: where the walk is and what it knows.
//!
//! A point pairs an [`Address`] with the [`Environment`] in effect there.
//! Leaf points additionally hold their node's value, evaluated once when the
//! point is created and never re-evaluated afterwards. Points are immutable;
//! every transition builds a new one.

use formflow_types::{Address, Environment, InputValue};
use serde::Serialize;
use serde_json::{Map as JsonMap, Value};

use crate::{
    error::FlowError,
    expression::{EvaluationError, Evaluator},
    model::{FlowNode, NodeKind},
};

/// Point at a sequence, condition, or loop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowPoint {
    address: Address,
    environment: Environment,
    kind: NodeKind,
}

/// Point at an input step. This is what callers render and submit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputPoint {
    address: Address,
    environment: Environment,
    value: InputValue,
}

/// Point at a terminal node; `value` is the flow's result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TerminalPoint {
    address: Address,
    environment: Environment,
    value: Value,
}

/// Point at a binding node. Never surfaced to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BindingPoint {
    address: Address,
    environment: Environment,
    value: JsonMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "point", rename_all = "lowercase")]
pub enum Point {
    Flow(FlowPoint),
    Input(InputPoint),
    Terminal(TerminalPoint),
    Binding(BindingPoint),
}

/// A point the engine may hand back to its caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "stop", rename_all = "lowercase")]
pub enum Stop {
    Input(InputPoint),
    Terminal(TerminalPoint),
}

impl Point {
    /// Resolves `address` under `root` and materializes leaf values.
    pub fn create(root: &FlowNode, address: Address, environment: Environment, evaluator: &dyn Evaluator) -> Result<Point, FlowError> {
        let node = root.resolve(&address)?;
        let materialize = |expression: &Value| {
            evaluator
                .evaluate(expression, &environment)
                .map_err(|source| FlowError::expression(&address, source))
        };

        let point = match node {
            FlowNode::Input(expression) => {
                let raw = materialize(expression)?;
                let value = serde_json::from_value::<InputValue>(raw).map_err(|error| {
                    FlowError::expression(
                        &address,
                        EvaluationError::UnexpectedShape {
                            expected: "an input object with defaults, validators and presentation".to_string(),
                            found: error.to_string(),
                        },
                    )
                })?;
                Point::Input(InputPoint {
                    address,
                    environment,
                    value,
                })
            }
            FlowNode::Terminal(expression) => {
                let value = materialize(expression)?;
                Point::Terminal(TerminalPoint {
                    address,
                    environment,
                    value,
                })
            }
            FlowNode::Binding(expression) => match materialize(expression)? {
                Value::Object(value) => Point::Binding(BindingPoint {
                    address,
                    environment,
                    value,
                }),
                other => {
                    return Err(FlowError::expression(
                        &address,
                        EvaluationError::UnexpectedShape {
                            expected: "a mapping of names to values".to_string(),
                            found: other.to_string(),
                        },
                    ));
                }
            },
            flow => Point::Flow(FlowPoint {
                address,
                environment,
                kind: flow.kind(),
            }),
        };
        Ok(point)
    }

    pub fn address(&self) -> &Address {
        match self {
            Point::Flow(point) => &point.address,
            Point::Input(point) => &point.address,
            Point::Terminal(point) => &point.address,
            Point::Binding(point) => &point.address,
        }
    }

    pub fn environment(&self) -> &Environment {
        match self {
            Point::Flow(point) => &point.environment,
            Point::Input(point) => &point.environment,
            Point::Terminal(point) => &point.environment,
            Point::Binding(point) => &point.environment,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Point::Flow(point) => point.kind,
            Point::Input(_) => NodeKind::Input,
            Point::Terminal(_) => NodeKind::Terminal,
            Point::Binding(_) => NodeKind::Binding,
        }
    }

    /// Same kind and address, environment extended with `additions`.
    pub fn with_environment(&self, additions: &JsonMap<String, Value>) -> Point {
        match self {
            Point::Flow(point) => Point::Flow(point.with_environment(additions)),
            Point::Input(point) => Point::Input(point.with_environment(additions)),
            Point::Terminal(point) => Point::Terminal(point.with_environment(additions)),
            Point::Binding(point) => Point::Binding(point.with_environment(additions)),
        }
    }
}

fn merge(environment: &Environment, additions: &JsonMap<String, Value>) -> Environment {
    environment.merged(additions.iter().map(|(name, value)| (name.clone(), value.clone())))
}

impl FlowPoint {
    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn with_environment(&self, additions: &JsonMap<String, Value>) -> FlowPoint {
        FlowPoint {
            address: self.address.clone(),
            environment: merge(&self.environment, additions),
            kind: self.kind,
        }
    }
}

impl InputPoint {
    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn value(&self) -> &InputValue {
        &self.value
    }

    pub fn with_environment(&self, additions: &JsonMap<String, Value>) -> InputPoint {
        InputPoint {
            address: self.address.clone(),
            environment: merge(&self.environment, additions),
            value: self.value.clone(),
        }
    }

    /// Snapshots what the user submitted as this step's defaults.
    ///
    /// Address and environment are untouched; going back to this point
    /// shows the submitted values again.
    pub fn with_submitted_defaults(&self, values: &JsonMap<String, Value>) -> InputPoint {
        InputPoint {
            address: self.address.clone(),
            environment: self.environment.clone(),
            value: InputValue {
                defaults: values.clone(),
                ..self.value.clone()
            },
        }
    }
}

impl TerminalPoint {
    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    pub fn with_environment(&self, additions: &JsonMap<String, Value>) -> TerminalPoint {
        TerminalPoint {
            address: self.address.clone(),
            environment: merge(&self.environment, additions),
            value: self.value.clone(),
        }
    }
}

impl BindingPoint {
    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn value(&self) -> &JsonMap<String, Value> {
        &self.value
    }

    pub fn with_environment(&self, additions: &JsonMap<String, Value>) -> BindingPoint {
        BindingPoint {
            address: self.address.clone(),
            environment: merge(&self.environment, additions),
            value: self.value.clone(),
        }
    }
}

impl Stop {
    pub fn address(&self) -> &Address {
        match self {
            Stop::Input(point) => point.address(),
            Stop::Terminal(point) => point.address(),
        }
    }

    pub fn as_input(&self) -> Option<&InputPoint> {
        match self {
            Stop::Input(point) => Some(point),
            Stop::Terminal(_) => None,
        }
    }

    pub fn as_terminal(&self) -> Option<&TerminalPoint> {
        match self {
            Stop::Terminal(point) => Some(point),
            Stop::Input(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::TemplateEvaluator;
    use formflow_types::Selector;
    use serde_json::json;

    fn tree() -> FlowNode {
        FlowNode::from_json(&json!([
            { "form": {
                "defaults": { "name": "${{ who }}" },
                "validators": { "name": [["name != ''", "Required"]] },
                "presentation": { "title": "Hi ${{ who }}" }
            } },
            { "variables": { "double": "${{ n * 2 }}" } },
            { "return": { "total": "${{ n }}" } },
            { "variables": "${{ n }}" },
            { "form": "${{ n }}" },
            { "loop": { "while": false, "do": [] } }
        ]))
        .expect("classify tree")
    }

    fn at(index: usize) -> Address {
        Address::from(vec![Selector::Index(index)])
    }

    fn env() -> Environment {
        [("who".to_string(), json!("Ada")), ("n".to_string(), json!(4))]
            .into_iter()
            .collect()
    }

    #[test]
    fn input_point_materializes_its_value() {
        let point = Point::create(&tree(), at(0), env(), &TemplateEvaluator).unwrap();
        let Point::Input(input) = point else {
            panic!("expected input point");
        };
        assert_eq!(input.value().defaults["name"], json!("Ada"));
        assert_eq!(input.value().presentation, json!({ "title": "Hi Ada" }));
        assert_eq!(input.value().validators["name"][0].predicate, json!("name != ''"));
    }

    #[test]
    fn binding_and_terminal_points_carry_values() {
        let binding = Point::create(&tree(), at(1), env(), &TemplateEvaluator).unwrap();
        let Point::Binding(binding) = binding else {
            panic!("expected binding point");
        };
        assert_eq!(binding.value()["double"], json!(8));

        let terminal = Point::create(&tree(), at(2), env(), &TemplateEvaluator).unwrap();
        assert_eq!(terminal.kind(), NodeKind::Terminal);
        let Point::Terminal(terminal) = terminal else {
            panic!("expected terminal point");
        };
        assert_eq!(terminal.value(), &json!({ "total": 4 }));
    }

    #[test]
    fn flow_nodes_yield_flow_points() {
        let point = Point::create(&tree(), at(5), env(), &TemplateEvaluator).unwrap();
        assert_eq!(point.kind(), NodeKind::Loop);
        let root = Point::create(&tree(), Address::root(), env(), &TemplateEvaluator).unwrap();
        assert_eq!(root.kind(), NodeKind::Sequence);
    }

    #[test]
    fn shape_mismatches_are_expression_errors() {
        for index in [3, 4] {
            match Point::create(&tree(), at(index), env(), &TemplateEvaluator) {
                Err(FlowError::Expression {
                    source: EvaluationError::UnexpectedShape { .. },
                    ..
                }) => {}
                other => panic!("expected shape error at {index}, got {other:?}"),
            }
        }
    }

    #[test]
    fn invalid_address_propagates() {
        assert!(matches!(
            Point::create(&tree(), at(42), env(), &TemplateEvaluator),
            Err(FlowError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn with_environment_does_not_re_evaluate() {
        let point = Point::create(&tree(), at(1), env(), &TemplateEvaluator).unwrap();
        let mut additions = JsonMap::new();
        additions.insert("n".to_string(), json!(100));
        let updated = point.with_environment(&additions);

        assert_eq!(updated.address(), point.address());
        assert_eq!(updated.environment().get("n"), Some(&json!(100)));
        assert_eq!(point.environment().get("n"), Some(&json!(4)));
        let Point::Binding(binding) = updated else {
            panic!("expected binding point");
        };
        assert_eq!(binding.value()["double"], json!(8));
    }

    #[test]
    fn submitted_defaults_replace_only_defaults() {
        let Point::Input(input) = Point::create(&tree(), at(0), env(), &TemplateEvaluator).unwrap() else {
            panic!("expected input point");
        };
        let mut submitted = JsonMap::new();
        submitted.insert("name".to_string(), json!("Grace"));
        let settled = input.with_submitted_defaults(&submitted);

        assert_eq!(settled.value().defaults, submitted);
        assert_eq!(settled.value().presentation, input.value().presentation);
        assert_eq!(settled.environment(), input.environment());
        assert_eq!(settled.address(), input.address());
    }
}
