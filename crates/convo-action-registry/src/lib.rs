//! Action registry with async handlers
//!
//! This crate provides the ActionRegistry, which holds the named
//! side-effect functions a script can invoke around its messages
//! (prefetch/postfetch). Handlers are async and receive an
//! [`ActionCall`] bundling a context snapshot with the owning message.

use convo_core::{ActionCall, ChatMessage, Context};
use dashmap::DashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Result type for action invocations
pub type ActionResult = Result<serde_json::Value, ActionError>;

/// Future type for async action handlers
pub type ActionFuture = Pin<Box<dyn Future<Output = ActionResult> + Send>>;

/// Action handler function type
pub type ActionHandler = Arc<dyn Fn(ActionCall) -> ActionFuture + Send + Sync>;

/// Errors that can occur when working with actions
#[derive(Debug, Clone, Error)]
pub enum ActionError {
    #[error("action not found: {key}")]
    NotFound { key: String },

    #[error("action failed: {0}")]
    Failed(String),
}

/// Information about a registered action
#[derive(Debug, Clone)]
pub struct ActionDescription {
    /// Registry key
    pub key: String,
    /// Description of what the action does
    pub description: Option<String>,
}

/// Internal representation of a registered action
struct RegisteredAction {
    handler: ActionHandler,
    description: ActionDescription,
}

/// The action registry manages all registered side-effect actions
///
/// The registry is responsible for:
/// - Registering actions with their async handlers
/// - Checking presence of an action key before the engine commits to a call
/// - Invoking actions and routing failures back to the caller
///
/// A registry may be empty; scripts that declare no prefetch/postfetch
/// never consult it.
pub struct ActionRegistry {
    actions: DashMap<String, RegisteredAction>,
}

impl ActionRegistry {
    /// Create a new empty action registry
    pub fn new() -> Self {
        Self {
            actions: DashMap::new(),
        }
    }

    /// Register an action under a key
    ///
    /// The handler receives an [`ActionCall`] carrying a context snapshot
    /// and the message the action is tied to. A later registration under
    /// the same key replaces the earlier one.
    pub fn register<F, Fut>(&self, key: impl Into<String>, handler: F)
    where
        F: Fn(ActionCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ActionResult> + Send + 'static,
    {
        let key = key.into();
        let description = ActionDescription {
            key: key.clone(),
            description: None,
        };
        self.register_inner(key, handler, description);
    }

    /// Register an action with a human-readable description
    pub fn register_with_description<F, Fut>(
        &self,
        key: impl Into<String>,
        description: impl Into<String>,
        handler: F,
    ) where
        F: Fn(ActionCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ActionResult> + Send + 'static,
    {
        let key = key.into();
        let description = ActionDescription {
            key: key.clone(),
            description: Some(description.into()),
        };
        self.register_inner(key, handler, description);
    }

    fn register_inner<F, Fut>(&self, key: String, handler: F, description: ActionDescription)
    where
        F: Fn(ActionCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ActionResult> + Send + 'static,
    {
        debug!(key = %key, "Registering action");

        let handler: ActionHandler = Arc::new(move |call| Box::pin(handler(call)) as ActionFuture);

        self.actions.insert(
            key,
            RegisteredAction {
                handler,
                description,
            },
        );
    }

    /// Check whether an action key is registered
    pub fn has(&self, key: &str) -> bool {
        self.actions.contains_key(key)
    }

    /// Invoke an action
    ///
    /// `context` is expected to be a snapshot taken by the caller; the
    /// handler cannot mutate the run's live context through it. Fails with
    /// [`ActionError::NotFound`] for unregistered keys; any failure from
    /// the handler itself propagates unchanged.
    pub async fn call(
        &self,
        key: &str,
        context: Context,
        message: ChatMessage,
    ) -> ActionResult {
        let registered = self.actions.get(key).ok_or_else(|| {
            warn!(key = %key, "Action not found");
            ActionError::NotFound {
                key: key.to_string(),
            }
        })?;

        debug!(key = %key, message_id = %message.id, "Calling action");

        let handler = registered.handler.clone();
        drop(registered); // Release the lock before calling the handler

        handler(ActionCall::new(key, context, message)).await
    }

    /// Get the description record for a key
    pub fn describe(&self, key: &str) -> Option<ActionDescription> {
        self.actions.get(key).map(|a| a.description.clone())
    }

    /// All registered keys
    pub fn keys(&self) -> Vec<String> {
        self.actions.iter().map(|e| e.key().clone()).collect()
    }

    /// Number of registered actions
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the registry holds no actions
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe wrapper for ActionRegistry
pub type SharedActionRegistry = Arc<ActionRegistry>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_register_and_call() {
        let registry = ActionRegistry::new();
        registry.register("get_is_admin", |call: ActionCall| async move {
            let name = call.context.get("name").cloned().unwrap_or_default();
            Ok(json!(name == json!("John")))
        });

        assert!(registry.has("get_is_admin"));

        let mut ctx = Context::new();
        ctx.set("name", json!("John"));

        let result = registry
            .call("get_is_admin", ctx.snapshot(), ChatMessage::bot("hi"))
            .await
            .unwrap();
        assert_eq!(result, json!(true));
    }

    #[tokio::test]
    async fn test_call_unknown_key() {
        let registry = ActionRegistry::new();
        let err = registry
            .call("missing", Context::new(), ChatMessage::bot("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::NotFound { key } if key == "missing"));
    }

    #[tokio::test]
    async fn test_handler_failure_propagates() {
        let registry = ActionRegistry::new();
        registry.register("flaky", |_call| async {
            Err(ActionError::Failed("backend unavailable".to_string()))
        });

        let err = registry
            .call("flaky", Context::new(), ChatMessage::bot("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Failed(reason) if reason.contains("unavailable")));
    }

    #[tokio::test]
    async fn test_describe_and_keys() {
        let registry = ActionRegistry::new();
        assert!(registry.is_empty());

        registry.register_with_description("get_permissions", "Look up permissions", |_| async {
            Ok(json!("All"))
        });

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.keys(), vec!["get_permissions".to_string()]);
        let desc = registry.describe("get_permissions").unwrap();
        assert_eq!(desc.description.as_deref(), Some("Look up permissions"));
        assert!(registry.describe("other").is_none());
    }

    #[tokio::test]
    async fn test_reregistration_replaces() {
        let registry = ActionRegistry::new();
        registry.register("lookup", |_| async { Ok(json!(1)) });
        registry.register("lookup", |_| async { Ok(json!(2)) });

        let result = registry
            .call("lookup", Context::new(), ChatMessage::bot("hi"))
            .await
            .unwrap();
        assert_eq!(result, json!(2));
        assert_eq!(registry.len(), 1);
    }
}
