//! # Flow Tree Model
//!
//! A flow document is a tree of six node kinds. Sequences, conditions, and
//! loops route the walk; inputs, terminals, and bindings are leaves that each
//! carry one expression.
//!
//! ## Document Shape
//!
//! | Kind | Authored as |
//! |---|---|
//! | Sequence | a JSON array of nodes |
//! | Condition | `{ "cond": { "if": <predicate>, "then": [...], "else": [...] } }` |
//! | Loop | `{ "loop": { "while": <predicate>, "do": [...] } }` |
//! | Input | `{ "form": <expression> }` |
//! | Terminal | `{ "return": <expression> }` |
//! | Binding | `{ "variables": <expression> }` |
//!
//! Each object node is classified by exactly one designated key. Objects with
//! none or several of them are rejected when the tree is built; unrelated keys
//! are ignored.

use std::fmt;

use formflow_types::{Address, Branch, Selector};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map as JsonMap, Value};

use crate::error::FlowError;

const CONDITION_KEY: &str = "cond";
const LOOP_KEY: &str = "loop";
const INPUT_KEY: &str = "form";
const TERMINAL_KEY: &str = "return";
const BINDING_KEY: &str = "variables";

/// Node kinds authored as keyed objects. Sequences are plain arrays.
#[derive(Debug, Clone, Copy)]
enum KeyedKind {
    Condition,
    Loop,
    Input,
    Terminal,
    Binding,
}

const DESIGNATED_KEYS: [(&str, KeyedKind); 5] = [
    (CONDITION_KEY, KeyedKind::Condition),
    (LOOP_KEY, KeyedKind::Loop),
    (INPUT_KEY, KeyedKind::Input),
    (TERMINAL_KEY, KeyedKind::Terminal),
    (BINDING_KEY, KeyedKind::Binding),
];

/// Discriminator for [`FlowNode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Sequence,
    Condition,
    Loop,
    Input,
    Terminal,
    Binding,
}

impl NodeKind {
    /// Leaf kinds carry an expression and never have children.
    pub fn is_leaf(self) -> bool {
        matches!(self, NodeKind::Input | NodeKind::Terminal | NodeKind::Binding)
    }

    /// Flow kinds own child lists and only route the walk.
    pub fn is_flow(self) -> bool {
        !self.is_leaf()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Sequence => "sequence",
            NodeKind::Condition => "condition",
            NodeKind::Loop => "loop",
            NodeKind::Input => "input",
            NodeKind::Terminal => "terminal",
            NodeKind::Binding => "binding",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// If/else routing node. The branch is chosen once, on entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionNode {
    pub predicate: Value,
    pub then_branch: Vec<FlowNode>,
    pub else_branch: Vec<FlowNode>,
}

/// While-loop routing node. The predicate is checked on entry and after
/// every full pass over the body.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopNode {
    pub predicate: Value,
    pub body: Vec<FlowNode>,
}

/// One node of an immutable flow tree.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowNode {
    Sequence(Vec<FlowNode>),
    Condition(ConditionNode),
    Loop(LoopNode),
    Input(Value),
    Terminal(Value),
    Binding(Value),
}

impl FlowNode {
    /// Classifies a raw JSON tree, failing on the first malformed node.
    pub fn from_json(value: &Value) -> Result<Self, FlowError> {
        classify(value, "$")
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            FlowNode::Sequence(_) => NodeKind::Sequence,
            FlowNode::Condition(_) => NodeKind::Condition,
            FlowNode::Loop(_) => NodeKind::Loop,
            FlowNode::Input(_) => NodeKind::Input,
            FlowNode::Terminal(_) => NodeKind::Terminal,
            FlowNode::Binding(_) => NodeKind::Binding,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.kind().is_leaf()
    }

    /// Unevaluated payload of a leaf node.
    pub fn expression(&self) -> Option<&Value> {
        match self {
            FlowNode::Input(expression) | FlowNode::Terminal(expression) | FlowNode::Binding(expression) => Some(expression),
            _ => None,
        }
    }

    /// Predicate of a condition or loop.
    pub fn predicate(&self) -> Option<&Value> {
        match self {
            FlowNode::Condition(condition) => Some(&condition.predicate),
            FlowNode::Loop(node) => Some(&node.predicate),
            _ => None,
        }
    }

    /// Child list owned by a flow node. Conditions need a branch; sequences
    /// and loops ignore it.
    pub fn children(&self, branch: Option<Branch>) -> Option<&[FlowNode]> {
        match (self, branch) {
            (FlowNode::Sequence(children), _) => Some(children),
            (FlowNode::Loop(node), _) => Some(&node.body),
            (FlowNode::Condition(condition), Some(Branch::Then)) => Some(&condition.then_branch),
            (FlowNode::Condition(condition), Some(Branch::Else)) => Some(&condition.else_branch),
            _ => None,
        }
    }

    /// Length of a child list, zero for leaves.
    pub fn len(&self, branch: Option<Branch>) -> usize {
        self.children(branch).map_or(0, <[FlowNode]>::len)
    }

    pub fn then_len(&self) -> usize {
        self.len(Some(Branch::Then))
    }

    pub fn else_len(&self) -> usize {
        self.len(Some(Branch::Else))
    }

    /// Children of a sequence or loop body; zero for conditions.
    pub fn body_len(&self) -> usize {
        self.len(None)
    }

    /// Direct child addressed by `selector`, if the selector fits this node.
    pub fn child(&self, selector: &Selector) -> Option<&FlowNode> {
        match (self, selector) {
            (FlowNode::Sequence(_) | FlowNode::Loop(_), Selector::Index(index)) => self.children(None)?.get(*index),
            (FlowNode::Condition(_), Selector::Branch(branch, index)) => self.children(Some(*branch))?.get(*index),
            _ => None,
        }
    }

    /// Walks `address` down from this node.
    pub fn resolve(&self, address: &Address) -> Result<&FlowNode, FlowError> {
        let mut node = self;
        for (depth, selector) in address.selectors().iter().enumerate() {
            node = node.child(selector).ok_or_else(|| {
                let reason = match (node, selector) {
                    (leaf, _) if leaf.is_leaf() => format!("level {depth} selects into a {} leaf", leaf.kind()),
                    (FlowNode::Condition(_), Selector::Index(_)) => {
                        format!("level {depth} needs a branch selector for a condition")
                    }
                    (FlowNode::Sequence(_) | FlowNode::Loop(_), Selector::Branch(..)) => {
                        format!("level {depth} uses a branch selector on a {}", node.kind())
                    }
                    (_, Selector::Branch(branch, index)) => format!(
                        "level {depth} index {index} is out of range for the {branch} branch of length {}",
                        node.len(Some(*branch))
                    ),
                    (_, Selector::Index(index)) => format!(
                        "level {depth} index {index} is out of range for a {} of length {}",
                        node.kind(),
                        node.len(None)
                    ),
                };
                FlowError::invalid_address(address, reason)
            })?;
        }
        Ok(node)
    }
}

impl<'de> Deserialize<'de> for FlowNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        FlowNode::from_json(&value).map_err(serde::de::Error::custom)
    }
}

fn classify(value: &Value, path: &str) -> Result<FlowNode, FlowError> {
    match value {
        Value::Array(items) => classify_list(items, path).map(FlowNode::Sequence),
        Value::Object(map) => {
            let mut present = DESIGNATED_KEYS.iter().filter(|(key, _)| map.contains_key(*key));
            let Some((key, kind)) = present.next() else {
                return Err(FlowError::malformed(
                    path,
                    "object has none of the keys cond, loop, form, return, variables",
                ));
            };
            if let Some((other, _)) = present.next() {
                return Err(FlowError::malformed(path, format!("object has both '{key}' and '{other}' keys")));
            }
            let payload = &map[*key];
            let payload_path = format!("{path}.{key}");
            match kind {
                KeyedKind::Condition => classify_condition(payload, &payload_path).map(FlowNode::Condition),
                KeyedKind::Loop => classify_loop(payload, &payload_path).map(FlowNode::Loop),
                KeyedKind::Input => Ok(FlowNode::Input(payload.clone())),
                KeyedKind::Terminal => Ok(FlowNode::Terminal(payload.clone())),
                KeyedKind::Binding => Ok(FlowNode::Binding(payload.clone())),
            }
        }
        other => Err(FlowError::malformed(path, format!("expected an array or object, found {other}"))),
    }
}

fn classify_list(items: &[Value], path: &str) -> Result<Vec<FlowNode>, FlowError> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| classify(item, &format!("{path}[{index}]")))
        .collect()
}

fn classify_condition(payload: &Value, path: &str) -> Result<ConditionNode, FlowError> {
    let map = expect_object(payload, path)?;
    let predicate = required(map, "if", path)?.clone();
    let then_branch = branch_list(required(map, "then", path)?, &format!("{path}.then"))?;
    let else_branch = match map.get("else") {
        Some(list) => branch_list(list, &format!("{path}.else"))?,
        None => Vec::new(),
    };
    Ok(ConditionNode {
        predicate,
        then_branch,
        else_branch,
    })
}

fn classify_loop(payload: &Value, path: &str) -> Result<LoopNode, FlowError> {
    let map = expect_object(payload, path)?;
    let predicate = required(map, "while", path)?.clone();
    let body = branch_list(required(map, "do", path)?, &format!("{path}.do"))?;
    Ok(LoopNode { predicate, body })
}

fn branch_list(value: &Value, path: &str) -> Result<Vec<FlowNode>, FlowError> {
    match value {
        Value::Array(items) => classify_list(items, path),
        other => Err(FlowError::malformed(path, format!("expected a list of nodes, found {other}"))),
    }
}

fn expect_object<'a>(value: &'a Value, path: &str) -> Result<&'a JsonMap<String, Value>, FlowError> {
    value
        .as_object()
        .ok_or_else(|| FlowError::malformed(path, format!("expected an object, found {value}")))
}

fn required<'a>(map: &'a JsonMap<String, Value>, key: &str, path: &str) -> Result<&'a Value, FlowError> {
    map.get(key)
        .ok_or_else(|| FlowError::malformed(path, format!("missing required key '{key}'")))
}
