//! Chat session facade
//!
//! [`ChatSession`] owns a walker's lifecycle and brokers the half-duplex
//! rendezvous between the script and the caller: it drives the walker to
//! completion, publishing a `prompt` for every input suspension and feeding
//! the next `send` value back in.

use convo_action_registry::{ActionRegistry, SharedActionRegistry};
use convo_core::{ChatEvent, ChatEventKind, Envelope};
use convo_event_bus::{EventBus, SharedEventBus};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tracing::{debug, trace};

use crate::script::{ChatScript, SessionOptions};
use crate::walker::{ScriptWalker, StepOutcome, WalkerError};

/// Session errors
///
/// Only structural script errors abort a run; action failures and protocol
/// misuse (duplicate `start`, stray `send`) never surface here.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Walker(#[from] WalkerError),
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Callback registered through [`ChatSession::on`]
type EventCallback = Box<dyn FnMut(ChatEvent) + Send>;

/// The public facade over one conversation script
///
/// A session can be run any number of times; each `start` begins a fresh
/// run with the context reset to the configured seed. All lifecycle
/// notifications flow over the session's own event bus; there is no global
/// state shared between sessions.
pub struct ChatSession {
    script: Arc<ChatScript>,
    registry: SharedActionRegistry,
    bus: SharedEventBus,
    options: SessionOptions,
    running: AtomicBool,
    stop_tx: Mutex<Option<watch::Sender<bool>>>,
    callbacks: Arc<Mutex<HashMap<ChatEventKind, Vec<EventCallback>>>>,
    dispatcher_started: AtomicBool,
}

impl ChatSession {
    /// Create a session over a script, an action registry, and options
    pub fn new(script: ChatScript, registry: SharedActionRegistry, options: SessionOptions) -> Self {
        Self {
            script: Arc::new(script),
            registry,
            bus: Arc::new(EventBus::new()),
            options,
            running: AtomicBool::new(false),
            stop_tx: Mutex::new(None),
            callbacks: Arc::new(Mutex::new(HashMap::new())),
            dispatcher_started: AtomicBool::new(false),
        }
    }

    /// Create a session for a script that declares no prefetch/postfetch
    pub fn without_actions(script: ChatScript, options: SessionOptions) -> Self {
        Self::new(script, Arc::new(ActionRegistry::new()), options)
    }

    /// The session's event bus
    pub fn bus(&self) -> &SharedEventBus {
        &self.bus
    }

    /// Subscribe to one event kind on the session's bus
    pub fn subscribe(&self, kind: ChatEventKind) -> broadcast::Receiver<Envelope> {
        self.bus.subscribe(kind)
    }

    /// Subscribe to every event on the session's bus
    pub fn subscribe_all(&self) -> broadcast::Receiver<Envelope> {
        self.bus.subscribe_all()
    }

    /// Whether a run is currently in flight
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Register a callback for one event kind
    ///
    /// Multiple callbacks per kind are permitted and run in registration
    /// order. Dispatch happens on a background task owned by the session's
    /// bus lifetime; must be called from within a tokio runtime.
    pub fn on<F>(&self, kind: ChatEventKind, callback: F)
    where
        F: FnMut(ChatEvent) + Send + 'static,
    {
        self.ensure_dispatcher();
        self.callbacks
            .lock()
            .expect("callback registry poisoned")
            .entry(kind)
            .or_default()
            .push(Box::new(callback));
    }

    fn ensure_dispatcher(&self) {
        if self.dispatcher_started.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut rx = self.bus.subscribe_all();
        let callbacks = Arc::clone(&self.callbacks);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(envelope) => {
                        let kind = envelope.event.kind();
                        let mut map = callbacks.lock().expect("callback registry poisoned");
                        if let Some(list) = map.get_mut(&kind) {
                            for callback in list.iter_mut() {
                                callback(envelope.event.clone());
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        trace!(missed, "Event dispatcher lagged");
                    }
                    // Bus dropped with the session; dispatch is over.
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    /// Run the script to completion
    ///
    /// A no-op when a run is already in flight. Otherwise resets the
    /// context to the configured seed, fires `start`, and drives the
    /// walker: every input suspension publishes a `prompt` and waits for
    /// the next `send` (or for `stop`). Natural completion fires `finish`
    /// with the final context.
    ///
    /// Structural script errors (a broken condition tree) abort the run
    /// and surface here; action failures never do.
    pub async fn start(&self) -> SessionResult<()> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Start ignored; session already running");
            return Ok(());
        }

        let (stop_tx, mut stop_rx) = watch::channel(false);
        *self.stop_tx.lock().expect("stop signal poisoned") = Some(stop_tx);

        let mut walker = ScriptWalker::new(
            Arc::clone(&self.script),
            Arc::clone(&self.registry),
            Arc::clone(&self.bus),
            self.options.initial_context.clone(),
            self.options.skip_first_message,
        );

        debug!(script = %self.script.display_name(), "Starting run");
        self.bus.fire(ChatEvent::Start);

        let mut answer: Option<Value> = None;
        let final_context = loop {
            if *stop_rx.borrow() {
                break None;
            }

            match walker.step(answer.take()).await {
                Ok(StepOutcome::AwaitingInput(message)) => {
                    // Subscribe before firing the prompt so an immediate
                    // send cannot slip past the rendezvous.
                    let mut send_rx = self.bus.subscribe(ChatEventKind::Send);
                    self.bus.fire(ChatEvent::Prompt { message });

                    tokio::select! {
                        _ = stop_rx.wait_for(|stopped| *stopped) => break None,
                        value = next_send(&mut send_rx) => match value {
                            Some(value) => answer = Some(value),
                            None => break None,
                        },
                    }
                }
                Ok(StepOutcome::Finished(context)) => break Some(context),
                Err(err) => {
                    self.running.store(false, Ordering::SeqCst);
                    return Err(err.into());
                }
            }
        };

        self.running.store(false, Ordering::SeqCst);
        if let Some(context) = final_context {
            self.bus.fire(ChatEvent::Finish { context });
        }
        Ok(())
    }

    /// Stop the current run
    ///
    /// Advisory and cooperative: an input wait is cancelled immediately,
    /// but an in-flight delay or action call finishes before the stop is
    /// observed between steps. Always fires `stop`, running or not.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(tx) = self.stop_tx.lock().expect("stop signal poisoned").take() {
            let _ = tx.send(true);
        }
        self.bus.fire(ChatEvent::Stop);
    }

    /// Supply an answer to the currently prompted message
    ///
    /// Fires a `send` event when a run is in flight; silently ignored
    /// otherwise. Only one answer is consumed per input suspension; sends
    /// that arrive while no message is awaiting input go nowhere.
    pub fn send(&self, value: impl Into<Value>) {
        if self.is_running() {
            self.bus.fire(ChatEvent::Send {
                value: value.into(),
            });
        } else {
            trace!("Send ignored; no active run");
        }
    }
}

/// Await the next `send` value on a receiver, skipping lag gaps
async fn next_send(rx: &mut broadcast::Receiver<Envelope>) -> Option<Value> {
    loop {
        match rx.recv().await {
            Ok(envelope) => {
                if let ChatEvent::Send { value } = envelope.event {
                    return Some(value);
                }
            }
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}
