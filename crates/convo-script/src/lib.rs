//! Script Engine
//!
//! This crate provides the execution engine for scripted conversations.
//! A script is an ordered list of message definitions walked one at a time;
//! each message may be conditionally skipped, may trigger side-effect
//! lookups before or after it is shown, may impose a timed delay, and may
//! pause the run until an external answer arrives.
//!
//! # Architecture
//!
//! ```text
//! SCRIPT → WALKER → EVENT BUS → caller
//!             ↑         ↓
//!             └── send ─┘
//! ```
//!
//! - [`ChatScript`] / [`MessageDef`] - The script definition
//! - [`ScriptWalker`] - Cooperative state machine stepping through the script
//! - [`ChatSession`] - Public facade (`start`/`stop`/`send`/`on`) driving the walker

pub mod script;
pub mod session;
pub mod walker;

pub use script::{ChatScript, FetchSpec, MessageDef, Pacing, SessionOptions};
pub use session::{ChatSession, SessionError, SessionResult};
pub use walker::{ScriptWalker, StepOutcome, WalkerError, WalkerResult};
