//! Core types for convoscript
//!
//! This crate provides the fundamental types used throughout the convoscript
//! conversation engine: Context, ChatMessage, ChatEvent, and ActionCall.

mod action_call;
mod context;
mod event;
mod message;
pub mod template;

pub use action_call::ActionCall;
pub use context::Context;
pub use event::{ActionFailure, ChatEvent, ChatEventKind, Envelope, FetchPhase};
pub use message::{ChatMessage, Role};
