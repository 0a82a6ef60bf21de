//! Error taxonomy for the flow engine.
//!
//! None of these are retried. They describe a malformed tree or a malformed
//! expression result, and the walk state held by the caller stays valid when
//! one is returned.

use formflow_types::Address;
use thiserror::Error;

use crate::expression::EvaluationError;

#[derive(Debug, Error)]
pub enum FlowError {
    /// A selector is out of range for its level or selects into a leaf.
    #[error("invalid address {address}: {reason}")]
    InvalidAddress { address: Address, reason: String },

    /// The walk cannot produce a valid stop.
    #[error("invalid flow: {0}")]
    InvalidFlow(String),

    /// Evaluation failed or produced a value the consuming node cannot use.
    #[error("expression error at {address}: {source}")]
    Expression {
        address: Address,
        #[source]
        source: EvaluationError,
    },

    /// A raw node could not be classified into exactly one kind.
    #[error("malformed node at {path}: {reason}")]
    MalformedNode { path: String, reason: String },
}

impl FlowError {
    pub(crate) fn invalid_address(address: &Address, reason: impl Into<String>) -> Self {
        Self::InvalidAddress {
            address: address.clone(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_flow(reason: impl Into<String>) -> Self {
        Self::InvalidFlow(reason.into())
    }

    pub(crate) fn expression(address: &Address, source: EvaluationError) -> Self {
        Self::Expression {
            address: address.clone(),
            source,
        }
    }

    pub(crate) fn malformed(path: &str, reason: impl Into<String>) -> Self {
        Self::MalformedNode {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}
