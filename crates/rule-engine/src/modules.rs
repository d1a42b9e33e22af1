//! Built-in native module types
//!
//! A small core vocabulary so rules can be written without any scripting:
//! a topic-matching trigger, a comparator-backed condition, and an action
//! that publishes back onto the event bus.

use async_trait::async_trait;
use rule_core::event::Topic;
use rule_core::{ModuleInstance, ModuleKind, ModuleType, TriggerEvent};
use rule_registry::{
    ActionHandler, ConditionHandler, HandlerError, HandlerFactory, HandlerResult, ModuleHandler,
    RunContext, TriggerHandler,
};
use rule_event_bus::SharedEventBus;
use rule_values::{compare, Comparison, TypedValue};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::engine::RuleEngine;
use crate::error::EngineResult;

/// Module type id of the topic trigger
pub const TOPIC_TRIGGER: &str = "core.TopicTrigger";
/// Module type id of the comparator condition
pub const COMPARE_CONDITION: &str = "core.CompareCondition";
/// Module type id of the publish action
pub const PUBLISH_ACTION: &str = "core.PublishAction";

/// Register the core module types and their factories on an engine
pub fn register_core_module_types(engine: &RuleEngine) -> EngineResult<()> {
    engine.register_module_type(
        ModuleType::new(TOPIC_TRIGGER, ModuleKind::Trigger).with_schema(json!({
            "type": "object",
            "required": ["topic"],
            "properties": {"topic": {"type": "string"}}
        })),
    )?;
    engine.register_handler_factory(TOPIC_TRIGGER, Arc::new(TopicTriggerFactory))?;

    engine.register_module_type(
        ModuleType::new(COMPARE_CONDITION, ModuleKind::Condition).with_schema(json!({
            "type": "object",
            "required": ["input", "operator", "value"],
            "properties": {
                "input": {"type": "string"},
                "operator": {"enum": [">", ">=", "<", "<=", "==", "!="]}
            }
        })),
    )?;
    engine.register_handler_factory(COMPARE_CONDITION, Arc::new(CompareConditionFactory))?;

    engine.register_module_type(
        ModuleType::new(PUBLISH_ACTION, ModuleKind::Action).with_schema(json!({
            "type": "object",
            "required": ["topic"],
            "properties": {"topic": {"type": "string"}}
        })),
    )?;
    engine.register_handler_factory(
        PUBLISH_ACTION,
        Arc::new(PublishActionFactory { bus: engine.bus() }),
    )?;

    Ok(())
}

fn config_str(module: &ModuleInstance, key: &str) -> HandlerResult<String> {
    module
        .configuration
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            HandlerError::InvalidConfiguration(format!(
                "module {} is missing string key '{}'",
                module.id, key
            ))
        })
}

// --- Topic trigger ---

/// Fires on events published under an exact topic
struct TopicTriggerHandler {
    topic: Topic,
}

#[async_trait]
impl TriggerHandler for TopicTriggerHandler {
    async fn on_event(&self, event: &TriggerEvent) -> HandlerResult<Option<Value>> {
        if event.topic != self.topic {
            return Ok(None);
        }

        trace!(topic = %event.topic, "Topic trigger fired");
        Ok(Some(json!({
            "topic": event.topic.as_str(),
            "payload": event.payload,
        })))
    }
}

/// Factory for [`TOPIC_TRIGGER`]
pub struct TopicTriggerFactory;

impl HandlerFactory for TopicTriggerFactory {
    fn create(&self, module: &ModuleInstance) -> HandlerResult<ModuleHandler> {
        let topic = Topic::new(config_str(module, "topic")?);
        Ok(ModuleHandler::Trigger(Arc::new(TopicTriggerHandler {
            topic,
        })))
    }
}

// --- Compare condition ---

/// Comparison operator accepted by the compare condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOperator {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

impl CompareOperator {
    fn parse(s: &str) -> Option<Self> {
        match s {
            ">" => Some(Self::Gt),
            ">=" => Some(Self::Ge),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::Le),
            "==" => Some(Self::Eq),
            "!=" => Some(Self::Ne),
            _ => None,
        }
    }

    /// Whether a comparison outcome satisfies this operator
    ///
    /// `Uncomparable` satisfies nothing, `!=` included: a pair with no
    /// defined relation makes the condition unsatisfied, never an error.
    fn matches(&self, comparison: Comparison) -> bool {
        use std::cmp::Ordering::*;
        let Comparison::Ordered(ord) = comparison else {
            return false;
        };

        match self {
            Self::Gt => ord == Greater,
            Self::Ge => ord != Less,
            Self::Lt => ord == Less,
            Self::Le => ord != Greater,
            Self::Eq => ord == Equal,
            Self::Ne => ord != Equal,
        }
    }
}

/// Compares a run-context variable against a configured reference value
struct CompareConditionHandler {
    input: String,
    operator: CompareOperator,
    reference: TypedValue,
}

#[async_trait]
impl ConditionHandler for CompareConditionHandler {
    async fn is_satisfied(&self, ctx: &RunContext) -> HandlerResult<bool> {
        // Missing or category-less input is conservatively unsatisfied
        let Some(raw) = ctx.get(&self.input) else {
            debug!(input = %self.input, "Compare input absent from run context");
            return Ok(false);
        };
        let Some(left) = TypedValue::from_json(raw) else {
            debug!(input = %self.input, "Compare input has no comparison category");
            return Ok(false);
        };

        let outcome = compare(&left, &self.reference);
        trace!(input = %self.input, ?outcome, "Compare condition evaluated");
        Ok(self.operator.matches(outcome))
    }
}

/// Factory for [`COMPARE_CONDITION`]
pub struct CompareConditionFactory;

impl HandlerFactory for CompareConditionFactory {
    fn create(&self, module: &ModuleInstance) -> HandlerResult<ModuleHandler> {
        let input = config_str(module, "input")?;
        let operator_str = config_str(module, "operator")?;
        let operator = CompareOperator::parse(&operator_str).ok_or_else(|| {
            HandlerError::InvalidConfiguration(format!(
                "module {}: unknown operator '{}'",
                module.id, operator_str
            ))
        })?;

        let reference_raw = module.configuration.get("value").ok_or_else(|| {
            HandlerError::InvalidConfiguration(format!("module {} is missing 'value'", module.id))
        })?;
        let reference = TypedValue::from_json(reference_raw).ok_or_else(|| {
            HandlerError::InvalidConfiguration(format!(
                "module {}: 'value' has no comparison category",
                module.id
            ))
        })?;

        Ok(ModuleHandler::Condition(Arc::new(CompareConditionHandler {
            input,
            operator,
            reference,
        })))
    }
}

// --- Publish action ---

/// Publishes an event back onto the bus
struct PublishActionHandler {
    bus: SharedEventBus,
    topic: Topic,
    payload: Value,
}

#[async_trait]
impl ActionHandler for PublishActionHandler {
    async fn execute(&self, _ctx: &RunContext) -> HandlerResult<Option<Value>> {
        debug!(topic = %self.topic, "Publish action firing");
        self.bus
            .publish(TriggerEvent::new(self.topic.clone(), self.payload.clone()));
        Ok(None)
    }
}

/// Factory for [`PUBLISH_ACTION`]
pub struct PublishActionFactory {
    /// Bus the produced handlers publish to
    pub bus: SharedEventBus,
}

impl HandlerFactory for PublishActionFactory {
    fn create(&self, module: &ModuleInstance) -> HandlerResult<ModuleHandler> {
        let topic = Topic::new(config_str(module, "topic")?);
        let payload = module
            .configuration
            .get("payload")
            .cloned()
            .unwrap_or(Value::Null);

        Ok(ModuleHandler::Action(Arc::new(PublishActionHandler {
            bus: self.bus.clone(),
            topic,
            payload,
        })))
    }
}
