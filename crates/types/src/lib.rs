//! Strongly typed values shared between the flow engine and its consumers.
//!
//! The engine walks a declarative tree and hands out points that carry an
//! [`Address`], an [`Environment`], and for input steps an [`InputValue`].
//! Rendering and validation collaborators only ever see these types, so they
//! live in their own crate and stay free of engine internals.

pub mod address;
pub mod environment;
pub mod input;

pub use address::{Address, Branch, Selector};
pub use environment::Environment;
pub use input::{FieldError, InputValue, ValidationRule};
