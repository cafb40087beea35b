//! Materialized chat messages as announced on the event bus

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ulid::Ulid;

/// Who a message originates from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Script-originated content
    #[default]
    Bot,
    /// Synthesized from an external answer
    User,
}

/// A message materialized for one run
///
/// Script entries are definitions; a ChatMessage is the concrete instance
/// announced on the bus, carrying a fresh id assigned at materialization
/// time. Ids are ULIDs and are never reused within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique identifier, assigned at materialization time
    pub id: String,

    /// Message origin
    pub role: Role,

    /// Display text, unprocessed (templating belongs to the presentation layer)
    pub content: String,

    /// Opaque presentation payload; the engine never inspects it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,

    /// Set when this message awaits an answer stored under the given name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variable: Option<String>,
}

impl ChatMessage {
    /// Materialize a bot message with a fresh id
    pub fn bot(content: impl Into<String>) -> Self {
        Self {
            id: Ulid::new().to_string(),
            role: Role::Bot,
            content: content.into(),
            meta: None,
            variable: None,
        }
    }

    /// Materialize a user message with a fresh id
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: Ulid::new().to_string(),
            role: Role::User,
            content: content.into(),
            meta: None,
            variable: None,
        }
    }

    /// Attach an opaque meta payload
    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Mark this message as awaiting an answer under the given variable
    pub fn with_variable(mut self, variable: impl Into<String>) -> Self {
        self.variable = Some(variable.into());
        self
    }

    /// Whether this message expects an external answer
    pub fn expects_answer(&self) -> bool {
        self.variable.is_some()
    }
}
