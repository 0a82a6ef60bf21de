//! Root-to-node addressing for flow trees.
//!
//! An [`Address`] is an ordered list of per-level [`Selector`]s. Sequences and
//! loop bodies are addressed by index, condition branches by a
//! `(branch, index)` pair. Addresses serialize to the compact positional form
//! used by authored documents: `[0, ["then", 1], 2]`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which branch of a condition a selector points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Branch {
    Then,
    Else,
}

impl Branch {
    pub fn as_str(self) -> &'static str {
        match self {
            Branch::Then => "then",
            Branch::Else => "else",
        }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single step of an [`Address`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Selector {
    /// Index into a sequence or a loop body.
    Index(usize),
    /// Branch tag plus index into a condition.
    Branch(Branch, usize),
}

impl Selector {
    /// Position within the owning child list, regardless of branch.
    pub fn index(&self) -> usize {
        match self {
            Selector::Index(index) | Selector::Branch(_, index) => *index,
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Index(index) => write!(f, "{index}"),
            Selector::Branch(branch, index) => write!(f, "{branch}:{index}"),
        }
    }
}

/// Path of selectors from the root sequence down to one node.
///
/// Two addresses denote the same node exactly when they are equal
/// component-wise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(Vec<Selector>);

impl Address {
    /// The empty address, naming the root itself.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn selectors(&self) -> &[Selector] {
        &self.0
    }

    /// The selector that picked this node out of its parent.
    pub fn last(&self) -> Option<&Selector> {
        self.0.last()
    }

    /// Address of the parent node, or `None` for the root.
    pub fn parent(&self) -> Option<Address> {
        let (_, prefix) = self.0.split_last()?;
        Some(Self(prefix.to_vec()))
    }

    /// Returns a new address one level deeper.
    pub fn child(&self, selector: Selector) -> Address {
        let mut selectors = self.0.clone();
        selectors.push(selector);
        Self(selectors)
    }

    pub fn push(&mut self, selector: Selector) {
        self.0.push(selector);
    }

    pub fn pop(&mut self) -> Option<Selector> {
        self.0.pop()
    }
}

impl From<Vec<Selector>> for Address {
    fn from(selectors: Vec<Selector>) -> Self {
        Self(selectors)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<root>");
        }
        for (position, selector) in self.0.iter().enumerate() {
            if position > 0 {
                f.write_str("/")?;
            }
            write!(f, "{selector}")?;
        }
        Ok(())
    }
}
