//! Handler contracts for module implementations
//!
//! A handler is the executable behavior bound to a module instance. Native
//! handlers are produced by a [`HandlerFactory`] registered for the module
//! type; scripted handlers satisfy the same traits by wrapping a user
//! script.

use async_trait::async_trait;
use rule_core::{ModuleInstance, TriggerEvent};
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by handler invocation or construction
#[derive(Debug, Clone, Error)]
pub enum HandlerError {
    #[error("invalid module configuration: {0}")]
    InvalidConfiguration(String),

    #[error("script execution error: {0}")]
    ScriptExecution(String),

    #[error("handler failed: {0}")]
    Failed(String),
}

/// Result type for handler operations
pub type HandlerResult<T> = Result<T, HandlerError>;

/// Mutable variable bindings for one rule run
///
/// Seeded from the trigger's output; each executed action may merge its
/// result back in for later actions in the same run to consume.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    /// Variables visible to condition and action handlers
    pub variables: Map<String, Value>,
}

impl RunContext {
    /// Create an empty run context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context seeded with the trigger's output
    pub fn from_trigger_output(output: Value) -> Self {
        let mut ctx = Self::new();
        ctx.merge(output);
        ctx
    }

    /// Look up a variable
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.variables.get(key)
    }

    /// Set a variable
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.variables.insert(key.into(), value);
    }

    /// Merge a handler result into the context
    ///
    /// Objects merge key-by-key (later keys win), null contributes
    /// nothing, and any other value lands under the `"result"` key.
    pub fn merge(&mut self, value: Value) {
        match value {
            Value::Object(map) => {
                for (k, v) in map {
                    self.variables.insert(k, v);
                }
            }
            Value::Null => {}
            other => {
                self.variables.insert("result".to_string(), other);
            }
        }
    }
}

/// Handler for a trigger module
#[async_trait]
pub trait TriggerHandler: Send + Sync {
    /// Inspect an incoming event
    ///
    /// Returns `Some(output)` when the event fires this trigger, with the
    /// output seeding the run context, or `None` when it does not match.
    async fn on_event(&self, event: &TriggerEvent) -> HandlerResult<Option<Value>>;
}

/// Handler for a condition module
#[async_trait]
pub trait ConditionHandler: Send + Sync {
    /// Evaluate the condition against the current run context
    async fn is_satisfied(&self, ctx: &RunContext) -> HandlerResult<bool>;
}

/// Handler for an action module
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Execute the action
    ///
    /// A returned value is merged into the run context before the next
    /// action in the rule runs.
    async fn execute(&self, ctx: &RunContext) -> HandlerResult<Option<Value>>;
}

/// A handler produced by a factory, tagged by module kind
pub enum ModuleHandler {
    Trigger(Arc<dyn TriggerHandler>),
    Condition(Arc<dyn ConditionHandler>),
    Action(Arc<dyn ActionHandler>),
}

impl ModuleHandler {
    /// The kind of module this handler serves
    pub fn kind(&self) -> rule_core::ModuleKind {
        match self {
            ModuleHandler::Trigger(_) => rule_core::ModuleKind::Trigger,
            ModuleHandler::Condition(_) => rule_core::ModuleKind::Condition,
            ModuleHandler::Action(_) => rule_core::ModuleKind::Action,
        }
    }
}

/// Produces a handler for a module instance of a registered type
pub trait HandlerFactory: Send + Sync {
    /// Create a handler for the given module instance
    fn create(&self, module: &ModuleInstance) -> HandlerResult<ModuleHandler>;
}
