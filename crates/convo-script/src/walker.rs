//! Script walker
//!
//! The cooperative state machine at the heart of the engine. The walker
//! steps through the script, evaluating per-message conditions, running
//! prefetch/postfetch actions, sleeping through delays, and yielding back
//! to its driver whenever a message needs an external answer.
//!
//! Suspension is modeled explicitly: [`ScriptWalker::step`] runs until the
//! script either needs input (`StepOutcome::AwaitingInput`) or is exhausted
//! (`StepOutcome::Finished`). The driver resumes an input suspension by
//! calling `step` again with the answer.

use convo_action_registry::SharedActionRegistry;
use convo_conditions::{evaluate, ConditionError};
use convo_core::{ActionFailure, ChatEvent, ChatMessage, Context, FetchPhase};
use convo_event_bus::SharedEventBus;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::script::{ChatScript, FetchSpec, MessageDef, Pacing};

/// Walker errors
///
/// Only structural script errors surface here; action failures are
/// recovered locally (an `error` event plus a skipped message) and never
/// abort the run.
#[derive(Debug, Error)]
pub enum WalkerError {
    #[error("condition evaluation failed: {0}")]
    Condition(#[from] ConditionError),
}

/// Result type for walker operations
pub type WalkerResult<T> = Result<T, WalkerError>;

/// What a call to [`ScriptWalker::step`] ended on
#[derive(Debug, Clone)]
pub enum StepOutcome {
    /// The run is suspended; this message awaits an answer
    AwaitingInput(ChatMessage),

    /// The script is exhausted; carries the final context
    Finished(Context),
}

/// Input suspension bookkeeping carried between steps
struct PendingInput {
    message: ChatMessage,
    variable: String,
    delay_after_answer: Option<u64>,
    postfetch: Option<FetchSpec>,
}

/// The script walker
///
/// Owns the run's context exclusively. Every announcement publishes a
/// context snapshot, so subscribers never observe later mutations.
pub struct ScriptWalker {
    script: Arc<ChatScript>,
    registry: SharedActionRegistry,
    bus: SharedEventBus,
    context: Context,
    position: usize,
    pending: Option<PendingInput>,
    skip_first_message: bool,
    announced_any: bool,
}

impl ScriptWalker {
    /// Create a walker positioned at the start of the script
    pub fn new(
        script: Arc<ChatScript>,
        registry: SharedActionRegistry,
        bus: SharedEventBus,
        context: Context,
        skip_first_message: bool,
    ) -> Self {
        Self {
            script,
            registry,
            bus,
            context,
            position: 0,
            pending: None,
            skip_first_message,
            announced_any: false,
        }
    }

    /// The context as it currently stands
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Whether the walker is suspended waiting for an answer
    pub fn awaiting_input(&self) -> bool {
        self.pending.is_some()
    }

    /// Advance the run until the next suspension point or the end
    ///
    /// Pass the answer value when resuming an input suspension; it is
    /// stored under the pending variable and a user-role message is
    /// announced before the walk continues. An answer passed while nothing
    /// is pending is dropped.
    pub async fn step(&mut self, answer: Option<Value>) -> WalkerResult<StepOutcome> {
        match (self.pending.take(), answer) {
            (Some(pending), Some(value)) => self.resolve_answer(pending, value).await,
            (Some(pending), None) => {
                // Resumed without an answer; stay suspended on the same message.
                trace!("Step without answer while awaiting input");
                let message = pending.message.clone();
                self.pending = Some(pending);
                return Ok(StepOutcome::AwaitingInput(message));
            }
            (None, Some(_)) => trace!("Dropping answer; no message awaiting input"),
            (None, None) => {}
        }

        while self.position < self.script.messages.len() {
            let def = self.script.messages[self.position].clone();
            self.position += 1;

            if let Some(outcome) = self.run_message(def).await? {
                return Ok(outcome);
            }
        }

        debug!(script = %self.script.display_name(), "Script exhausted");
        Ok(StepOutcome::Finished(self.context.snapshot()))
    }

    /// Process one script entry; returns the outcome if the walk suspends
    async fn run_message(&mut self, def: MessageDef) -> WalkerResult<Option<StepOutcome>> {
        // 1. Condition gate: a false condition skips the message entirely,
        //    with no events, no side effects, and no delay.
        if let Some(condition) = &def.condition {
            if !evaluate(condition, &self.context)? {
                trace!(position = self.position, "Condition false, skipping message");
                return Ok(None);
            }
        }

        // 2. Materialize with a fresh id.
        let mut message = ChatMessage::bot(&def.content);
        message.meta = def.meta.clone();
        message.variable = def.variable().map(str::to_string);

        // 3. Prefetch. A failure abandons the message before it is announced.
        if let Some(fetch) = &def.prefetch {
            if !self.run_fetch(fetch, FetchPhase::Prefetch, &message).await {
                return Ok(None);
            }
        }

        // 4. Announce with a context snapshot.
        self.announce(message.clone());

        // 5/6. Pacing.
        match def.pacing {
            Pacing::Delay { millis } => {
                debug!(millis, "Delaying");
                tokio::time::sleep(Duration::from_millis(millis)).await;
            }
            Pacing::Input {
                variable,
                delay_after_answer,
            } => {
                self.pending = Some(PendingInput {
                    message: message.clone(),
                    variable,
                    delay_after_answer,
                    postfetch: def.postfetch,
                });
                return Ok(Some(StepOutcome::AwaitingInput(message)));
            }
            Pacing::Immediate => {}
        }

        // 7. Postfetch for messages that never suspended. A failure has
        //    nothing left to abandon beyond its own result.
        if let Some(fetch) = &def.postfetch {
            self.run_fetch(fetch, FetchPhase::Postfetch, &message).await;
        }

        Ok(None)
    }

    /// Store an answer, announce the synthesized user message, and finish
    /// the suspended message's post-answer work
    async fn resolve_answer(&mut self, pending: PendingInput, value: Value) {
        debug!(variable = %pending.variable, "Answer received");
        self.context.set(&pending.variable, value.clone());

        let user_message = ChatMessage::user(display_value(&value));
        self.announce(user_message.clone());

        if let Some(millis) = pending.delay_after_answer {
            debug!(millis, "Delaying after answer");
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }

        if let Some(fetch) = &pending.postfetch {
            self.run_fetch(fetch, FetchPhase::Postfetch, &user_message)
                .await;
        }
    }

    /// Run one prefetch/postfetch action; returns whether the owning
    /// message should keep going
    ///
    /// An unregistered action key is skipped silently (the presence check
    /// gates the call). A failing action fires an `error` event and fails
    /// closed: the context key is never set.
    async fn run_fetch(
        &mut self,
        fetch: &FetchSpec,
        phase: FetchPhase,
        message: &ChatMessage,
    ) -> bool {
        if !self.registry.has(&fetch.action_key) {
            trace!(action_key = %fetch.action_key, %phase, "Action not registered, skipping");
            return true;
        }

        match self
            .registry
            .call(&fetch.action_key, self.context.snapshot(), message.clone())
            .await
        {
            Ok(value) => {
                self.context.set(&fetch.context_key, value);
                true
            }
            Err(err) => {
                warn!(action_key = %fetch.action_key, %phase, error = %err, "Action failed");
                self.bus.fire(ChatEvent::Error {
                    failure: ActionFailure {
                        action_key: fetch.action_key.clone(),
                        context_key: fetch.context_key.clone(),
                        phase,
                        reason: err.to_string(),
                    },
                });
                false
            }
        }
    }

    /// Publish a `message` event, honoring the skip-first-announcement flag
    fn announce(&mut self, message: ChatMessage) {
        let first = !self.announced_any;
        self.announced_any = true;

        if first && self.skip_first_message {
            debug!(message_id = %message.id, "Suppressing first announcement");
            return;
        }

        self.bus.fire(ChatEvent::Message {
            message,
            context: self.context.snapshot(),
        });
    }
}

/// Render an answer value the way a user would have typed it
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
