//! Script definition
//!
//! A script is an ordered sequence of message definitions, provided
//! wholesale when a session is created and immutable for the run.

use convo_conditions::Condition;
use convo_core::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// How a message paces the run after being announced
///
/// Delay and input are mutually exclusive message shapes; a message that
/// needs neither proceeds immediately.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Pacing {
    /// Wait this many milliseconds before continuing
    Delay { millis: u64 },

    /// Suspend until an external answer arrives, stored under `variable`
    Input {
        variable: String,
        /// Extra wait after the answer has been stored
        #[serde(skip_serializing_if = "Option::is_none")]
        delay_after_answer: Option<u64>,
    },

    /// Proceed at once
    #[default]
    Immediate,
}

/// A named side-effect tied to a message: which action to run and where to
/// store its result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchSpec {
    /// Key into the action registry
    pub action_key: String,

    /// Context key the result is stored under
    pub context_key: String,
}

impl FetchSpec {
    /// Create a new fetch spec
    pub fn new(action_key: impl Into<String>, context_key: impl Into<String>) -> Self {
        Self {
            action_key: action_key.into(),
            context_key: context_key.into(),
        }
    }
}

/// One script entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDef {
    /// Display text, announced raw
    pub content: String,

    /// Message is skipped entirely when this evaluates false
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,

    /// Opaque presentation payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,

    /// Delay/input shape
    #[serde(default)]
    pub pacing: Pacing,

    /// Side effect run before the message is announced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefetch: Option<FetchSpec>,

    /// Side effect run after the answer (if any) has been stored
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postfetch: Option<FetchSpec>,
}

impl MessageDef {
    fn with_pacing(content: impl Into<String>, pacing: Pacing) -> Self {
        Self {
            content: content.into(),
            condition: None,
            meta: None,
            pacing,
            prefetch: None,
            postfetch: None,
        }
    }

    /// A message that waits `millis` after being announced
    pub fn delayed(content: impl Into<String>, millis: u64) -> Self {
        Self::with_pacing(content, Pacing::Delay { millis })
    }

    /// A message that suspends the run for an answer stored under `variable`
    pub fn prompt(content: impl Into<String>, variable: impl Into<String>) -> Self {
        Self::with_pacing(
            content,
            Pacing::Input {
                variable: variable.into(),
                delay_after_answer: None,
            },
        )
    }

    /// A message that proceeds immediately
    pub fn immediate(content: impl Into<String>) -> Self {
        Self::with_pacing(content, Pacing::Immediate)
    }

    /// Guard this message with a condition
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Attach an opaque meta payload
    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Run an action before announcing, storing its result
    pub fn with_prefetch(
        mut self,
        action_key: impl Into<String>,
        context_key: impl Into<String>,
    ) -> Self {
        self.prefetch = Some(FetchSpec::new(action_key, context_key));
        self
    }

    /// Run an action after the answer is stored, storing its result
    pub fn with_postfetch(
        mut self,
        action_key: impl Into<String>,
        context_key: impl Into<String>,
    ) -> Self {
        self.postfetch = Some(FetchSpec::new(action_key, context_key));
        self
    }

    /// Add an extra wait after the answer; only meaningful on input messages
    pub fn with_delay_after_answer(mut self, millis: u64) -> Self {
        if let Pacing::Input {
            delay_after_answer, ..
        } = &mut self.pacing
        {
            *delay_after_answer = Some(millis);
        }
        self
    }

    /// The variable this message stores its answer under, if any
    pub fn variable(&self) -> Option<&str> {
        match &self.pacing {
            Pacing::Input { variable, .. } => Some(variable),
            _ => None,
        }
    }
}

/// A complete conversation script
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatScript {
    /// Optional script name for logging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// The ordered message definitions
    pub messages: Vec<MessageDef>,
}

impl ChatScript {
    /// Create a script from its messages
    pub fn new(messages: Vec<MessageDef>) -> Self {
        Self {
            name: None,
            messages,
        }
    }

    /// Create a named script
    pub fn named(name: impl Into<String>, messages: Vec<MessageDef>) -> Self {
        Self {
            name: Some(name.into()),
            messages,
        }
    }

    /// Number of message definitions
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the script has no messages
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Display name for logging
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }
}

impl From<Vec<MessageDef>> for ChatScript {
    fn from(messages: Vec<MessageDef>) -> Self {
        Self::new(messages)
    }
}

/// Per-session configuration
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Context seed applied at every `start`
    pub initial_context: Context,

    /// Suppress the very first announcement of a run; used when resuming a
    /// conversation whose leading turns were already delivered elsewhere
    pub skip_first_message: bool,
}

impl SessionOptions {
    /// Create default options: empty seed, nothing suppressed
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the context from a map at every `start`
    pub fn with_initial_context(mut self, values: HashMap<String, Value>) -> Self {
        self.initial_context = Context::seeded(values);
        self
    }

    /// Suppress the very first announcement of each run
    pub fn with_skip_first_message(mut self, skip: bool) -> Self {
        self.skip_first_message = skip;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builders() {
        let msg = MessageDef::prompt("What is your name?", "name")
            .with_delay_after_answer(2)
            .with_postfetch("get_is_admin", "is_admin")
            .with_meta(json!({"input": "text"}));

        assert_eq!(msg.variable(), Some("name"));
        assert_eq!(
            msg.pacing,
            Pacing::Input {
                variable: "name".to_string(),
                delay_after_answer: Some(2),
            }
        );
        assert_eq!(msg.postfetch, Some(FetchSpec::new("get_is_admin", "is_admin")));
    }

    #[test]
    fn test_delay_after_answer_ignored_on_delay_shape() {
        let msg = MessageDef::delayed("Greetings!", 10).with_delay_after_answer(5);
        assert_eq!(msg.pacing, Pacing::Delay { millis: 10 });
        assert_eq!(msg.variable(), None);
    }

    #[test]
    fn test_pacing_default_is_immediate() {
        let parsed: MessageDef = serde_json::from_value(json!({"content": "hi"})).unwrap();
        assert_eq!(parsed.pacing, Pacing::Immediate);
    }

    #[test]
    fn test_script_round_trip() {
        let script = ChatScript::named(
            "onboarding",
            vec![
                MessageDef::delayed("Greetings!", 10),
                MessageDef::prompt("What is your name?", "name")
                    .with_condition(Condition::equals("lang", "en")),
            ],
        );

        let text = serde_json::to_string(&script).unwrap();
        let parsed: ChatScript = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, script);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed.display_name(), "onboarding");
    }

    #[test]
    fn test_options() {
        let options = SessionOptions::new()
            .with_initial_context(HashMap::from([("lang".to_string(), json!("en"))]))
            .with_skip_first_message(true);

        assert!(options.skip_first_message);
        assert_eq!(options.initial_context.get("lang"), Some(&json!("en")));
    }
}
