//! ActionCall: the argument bundle handed to a side-effect action

use serde::{Deserialize, Serialize};

use crate::{ChatMessage, Context};

/// Arguments for one side-effect action invocation
///
/// Carries a snapshot of the context as it stood when the action was
/// resolved, plus the message the action is tied to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionCall {
    /// Registry key of the invoked action
    pub action_key: String,

    /// Context snapshot at invocation time
    pub context: Context,

    /// The message this action is tied to
    pub message: ChatMessage,
}

impl ActionCall {
    /// Create a new action call
    pub fn new(action_key: impl Into<String>, context: Context, message: ChatMessage) -> Self {
        Self {
            action_key: action_key.into(),
            context,
            message,
        }
    }
}
