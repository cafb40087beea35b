//! Condition expressions
//!
//! This crate provides the boolean expression language used to decide
//! whether a script message is shown. Conditions form a small recursive
//! tree evaluated against the current conversation context.
//!
//! # Condition Types
//!
//! - `equals` / `contains` - value tests against one context variable
//! - `length_at_least` / `length_at_most` / `length_equals` - sequence length tests
//! - `and` / `or` / `not` - combinators (short-circuiting)
//!
//! # Key Types
//!
//! - [`Condition`] - The expression tree
//! - [`evaluate`] - Pure evaluation against a [`Context`](convo_core::Context)

pub mod condition;
pub mod eval;

pub use condition::Condition;
pub use eval::{evaluate, evaluate_all, evaluate_any, ConditionError, ConditionResult, MAX_DEPTH};
