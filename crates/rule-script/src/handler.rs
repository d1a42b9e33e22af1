//! Scripted handler adapters
//!
//! These adapters let a user script satisfy the trigger/condition/action
//! handler contracts. Each adapter merges the module's static configuration
//! with the current run context into the script's parameter mapping, then
//! coerces the script result to the shape its contract requires.

use async_trait::async_trait;
use rule_core::TriggerEvent;
use rule_registry::{
    ActionHandler, ConditionHandler, HandlerError, HandlerResult, RunContext, TriggerHandler,
};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::trace;

use crate::handle::ScriptHandle;
use crate::script::{ScriptError, ScriptResult};

impl From<ScriptError> for HandlerError {
    fn from(e: ScriptError) -> Self {
        HandlerError::ScriptExecution(e.to_string())
    }
}

/// Shared state of one scripted module binding
struct ScriptedModule {
    handle: Arc<ScriptHandle>,
    configuration: Map<String, Value>,
}

impl ScriptedModule {
    /// Static configuration merged with the run context; context wins
    fn params(&self, ctx: &RunContext) -> Map<String, Value> {
        let mut params = self.configuration.clone();
        for (k, v) in &ctx.variables {
            params.insert(k.clone(), v.clone());
        }
        params
    }

    async fn invoke(&self, params: &Map<String, Value>) -> ScriptResult<Value> {
        trace!(param_count = params.len(), "Invoking script");
        self.handle.invoke(params).await
    }
}

/// Trigger handler backed by a user script
pub struct ScriptedTrigger {
    module: ScriptedModule,
}

impl ScriptedTrigger {
    /// Wrap a script handle as a trigger handler
    pub fn new(handle: Arc<ScriptHandle>, configuration: Map<String, Value>) -> Self {
        Self {
            module: ScriptedModule {
                handle,
                configuration,
            },
        }
    }
}

#[async_trait]
impl TriggerHandler for ScriptedTrigger {
    async fn on_event(&self, event: &TriggerEvent) -> HandlerResult<Option<Value>> {
        let mut params = self.module.configuration.clone();
        params.insert("topic".to_string(), Value::String(event.topic.to_string()));
        params.insert("payload".to_string(), event.payload.clone());

        let result = self.module.invoke(&params).await?;
        Ok(match result {
            // null or false: the event does not fire this trigger
            Value::Null | Value::Bool(false) => None,
            Value::Bool(true) => Some(Value::Object(Map::new())),
            Value::Object(output) => Some(Value::Object(output)),
            other => Some(serde_json::json!({ "result": other })),
        })
    }
}

/// Condition handler backed by a user script
pub struct ScriptedCondition {
    module: ScriptedModule,
}

impl ScriptedCondition {
    /// Wrap a script handle as a condition handler
    pub fn new(handle: Arc<ScriptHandle>, configuration: Map<String, Value>) -> Self {
        Self {
            module: ScriptedModule {
                handle,
                configuration,
            },
        }
    }
}

#[async_trait]
impl ConditionHandler for ScriptedCondition {
    async fn is_satisfied(&self, ctx: &RunContext) -> HandlerResult<bool> {
        let params = self.module.params(ctx);
        let result = self.module.invoke(&params).await?;

        match result {
            Value::Bool(b) => Ok(b),
            other => Err(ScriptError::NotBoolean(other.to_string()).into()),
        }
    }
}

/// Action handler backed by a user script
pub struct ScriptedAction {
    module: ScriptedModule,
}

impl ScriptedAction {
    /// Wrap a script handle as an action handler
    pub fn new(handle: Arc<ScriptHandle>, configuration: Map<String, Value>) -> Self {
        Self {
            module: ScriptedModule {
                handle,
                configuration,
            },
        }
    }
}

#[async_trait]
impl ActionHandler for ScriptedAction {
    async fn execute(&self, ctx: &RunContext) -> HandlerResult<Option<Value>> {
        let params = self.module.params(ctx);
        let result = self.module.invoke(&params).await?;

        Ok(match result {
            Value::Null => None,
            other => Some(other),
        })
    }
}
