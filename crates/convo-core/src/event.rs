//! Event types for the conversation event bus

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ChatMessage, Context};

/// Which side-effect slot of a message an action ran in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchPhase {
    /// Before the message is announced
    Prefetch,
    /// After the answer (if any) has been stored
    Postfetch,
}

impl std::fmt::Display for FetchPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchPhase::Prefetch => write!(f, "prefetch"),
            FetchPhase::Postfetch => write!(f, "postfetch"),
        }
    }
}

/// A failed side-effect action, as carried by [`ChatEvent::Error`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionFailure {
    /// Registry key of the action that failed
    pub action_key: String,

    /// Context key the result would have been stored under
    pub context_key: String,

    /// Whether the action ran as prefetch or postfetch
    pub phase: FetchPhase,

    /// Failure description from the action
    pub reason: String,
}

impl std::fmt::Display for ActionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} action '{}' failed: {}",
            self.phase, self.action_key, self.reason
        )
    }
}

/// Lifecycle notifications published by the engine
///
/// `Message` and `Finish` carry a context snapshot taken at publish time;
/// subscribers never observe later mutations through it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChatEvent {
    /// A run began
    Start,

    /// A run was stopped externally
    Stop,

    /// An answer was supplied by the caller
    Send { value: Value },

    /// The run is paused, awaiting an answer to this message
    Prompt { message: ChatMessage },

    /// A message was announced
    Message {
        message: ChatMessage,
        context: Context,
    },

    /// A side-effect action failed; the owning message was skipped
    Error { failure: ActionFailure },

    /// The script was exhausted; carries the final context
    Finish { context: Context },
}

impl ChatEvent {
    /// The subscription key for this event
    pub fn kind(&self) -> ChatEventKind {
        match self {
            ChatEvent::Start => ChatEventKind::Start,
            ChatEvent::Stop => ChatEventKind::Stop,
            ChatEvent::Send { .. } => ChatEventKind::Send,
            ChatEvent::Prompt { .. } => ChatEventKind::Prompt,
            ChatEvent::Message { .. } => ChatEventKind::Message,
            ChatEvent::Error { .. } => ChatEventKind::Error,
            ChatEvent::Finish { .. } => ChatEventKind::Finish,
        }
    }
}

/// Event kinds, used as bus subscription keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatEventKind {
    Start,
    Stop,
    Send,
    Prompt,
    Message,
    Error,
    Finish,
}

impl std::fmt::Display for ChatEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ChatEventKind::Start => "start",
            ChatEventKind::Stop => "stop",
            ChatEventKind::Send => "send",
            ChatEventKind::Prompt => "prompt",
            ChatEventKind::Message => "message",
            ChatEventKind::Error => "error",
            ChatEventKind::Finish => "finish",
        };
        write!(f, "{}", name)
    }
}

/// A published event together with its publication metadata
///
/// `seq` increases by one per `fire`, giving subscribers a total order over
/// everything published on one bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Position in the bus's publication order
    pub seq: u64,

    /// When the event was fired
    pub time_fired: DateTime<Utc>,

    /// The event itself
    pub event: ChatEvent,
}

impl Envelope {
    /// Wrap an event with publication metadata
    pub fn new(seq: u64, event: ChatEvent) -> Self {
        Self {
            seq,
            time_fired: Utc::now(),
            event,
        }
    }
}
