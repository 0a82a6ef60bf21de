//! # Formflow Engine
//!
//! The Formflow Engine walks declarative, branching, multi-step input flows.
//! A flow is an immutable tree of sequences, conditions, and loops whose leaves
//! ask for input, bind variables, or return a result. Given "the user submitted
//! these values at this step", the engine produces the next step to show or the
//! flow's final result.
//!
//! ## Key Features
//!
//! - **Resumable Walks**: No hidden cursor. The caller holds an [`InputPoint`]
//!   and hands it back with the submitted values.
//! - **Template Expressions**: Leaf values and predicates are evaluated with
//!   `${{ ... }}` templates through a pluggable [`Evaluator`].
//! - **Back Navigation**: [`FlowSession`] keeps the stack of visited inputs so a
//!   caller can step back without re-evaluating anything.
//! - **Field Validation**: Each input declares `[predicate, message]` rules per
//!   field, checked before the walk moves on.
//!
//! ## Usage
//!
//! ```rust
//! use formflow_engine::{parse_flow_str, FlowSession, Submission};
//! use serde_json::{json, Map};
//!
//! let flow = parse_flow_str(r#"
//! - form:
//!     defaults: { name: "" }
//!     validators:
//!       name: [["name != ''", "Name is required"]]
//! - return: "Hello ${{ name }}"
//! "#)?;
//!
//! let mut session = FlowSession::start(&flow)?;
//! let mut values = Map::new();
//! values.insert("name".to_string(), json!("Ada"));
//!
//! assert_eq!(session.submit(values)?, Submission::Finished(json!("Hello Ada")));
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - **`model`**: The flow tree and its classification from JSON/YAML
//! - **`expression`**: The evaluator seam and the template expression language
//! - **`navigate`**: Entry and advance rules for sequences, conditions, and loops
//! - **`point`**: Execution points and leaf materialization
//! - **`flow`**: The walk itself (`initial` and `next`)
//! - **`validate`**: Per-field validation of submitted values
//! - **`session`**: Walk history with submit and back

use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde_json::Value;

pub mod error;
pub mod expression;
pub mod flow;
pub mod model;
pub mod navigate;
pub mod point;
pub mod session;
pub mod validate;

// Re-export commonly used types for convenience
pub use error::FlowError;
pub use expression::{EvaluationError, Evaluator, TemplateEvaluator};
pub use flow::Flow;
pub use model::{ConditionNode, FlowNode, LoopNode, NodeKind};
pub use navigate::Navigator;
pub use point::{BindingPoint, FlowPoint, InputPoint, Point, Stop, TerminalPoint};
pub use session::{FlowSession, Submission};
pub use validate::validate_submission;

pub use formflow_types::{Address, Branch, Environment, FieldError, InputValue, Selector, ValidationRule};

/// Parses a flow document from YAML or JSON text.
///
/// JSON is accepted as YAML, so both formats go through one parser. The
/// document root must be a list of nodes.
pub fn parse_flow_str(content: &str) -> Result<Flow> {
    let document: Value = serde_yaml::from_str(content).context("Failed to parse flow document as YAML or JSON")?;
    let flow = Flow::from_json(&document).context("Flow document is not a valid flow tree")?;
    Ok(flow)
}

/// Loads a flow document from the filesystem.
///
/// # Errors
///
/// This function will return an error if:
/// - The file cannot be read from the filesystem
/// - The file content is not valid YAML or JSON
/// - The document is not a valid flow tree
///
/// # Examples
///
/// ```rust
/// use formflow_engine::parse_flow_file;
///
/// let temp_dir = tempfile::tempdir()?;
/// let flow_path = temp_dir.path().join("greet.yaml");
/// std::fs::write(&flow_path, "- form: { defaults: { name: '' } }\n- return: '${{ name }}'\n")?;
///
/// let flow = parse_flow_file(&flow_path)?;
/// assert_eq!(flow.root().body_len(), 2);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn parse_flow_file(file_path: impl AsRef<Path>) -> Result<Flow> {
    let file_path = file_path.as_ref();
    let file_content = fs::read_to_string(file_path).with_context(|| format!("Failed to read flow file: {}", file_path.display()))?;
    parse_flow_str(&file_content).with_context(|| format!("Failed to load flow file: {}", file_path.display()))
}
