//! Handler factory resolution
//!
//! Binds every module instance of a rule to a runnable handler. Native
//! factories registered in the [`ModuleRegistry`] always take precedence;
//! a module with no native factory resolves through the script collaborator
//! when it is script-backed, and fails as unresolved otherwise.
//!
//! Resolution is all-or-nothing per rule: a rule only becomes enabled once
//! every module it references has a handler. Script handles are created
//! lazily here, at first resolution for the (rule, module) pair, not at
//! registration time.

use rule_core::{ModuleInstance, ModuleKind, Rule, TriggerEvent};
use rule_registry::{
    ActionHandler, ConditionHandler, HandlerResult, ModuleHandler, ModuleRegistry, RunContext,
    TriggerHandler,
};
use rule_script::{
    ScriptEngine, ScriptError, ScriptHandle, ScriptedAction, ScriptedCondition, ScriptedTrigger,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::error::{EngineError, EngineResult};

/// A resolved trigger binding: native factory product or scripted adapter
pub enum TriggerBinding {
    Native(Arc<dyn TriggerHandler>),
    Scripted(ScriptedTrigger),
}

impl TriggerBinding {
    /// Forward an event to the bound handler
    pub async fn on_event(&self, event: &TriggerEvent) -> HandlerResult<Option<Value>> {
        match self {
            TriggerBinding::Native(handler) => handler.on_event(event).await,
            TriggerBinding::Scripted(handler) => handler.on_event(event).await,
        }
    }
}

/// A resolved condition binding
pub enum ConditionBinding {
    Native(Arc<dyn ConditionHandler>),
    Scripted(ScriptedCondition),
}

impl ConditionBinding {
    /// Evaluate the bound condition
    pub async fn is_satisfied(&self, ctx: &RunContext) -> HandlerResult<bool> {
        match self {
            ConditionBinding::Native(handler) => handler.is_satisfied(ctx).await,
            ConditionBinding::Scripted(handler) => handler.is_satisfied(ctx).await,
        }
    }
}

/// A resolved action binding
pub enum ActionBinding {
    Native(Arc<dyn ActionHandler>),
    Scripted(ScriptedAction),
}

impl ActionBinding {
    /// Execute the bound action
    pub async fn execute(&self, ctx: &RunContext) -> HandlerResult<Option<Value>> {
        match self {
            ActionBinding::Native(handler) => handler.execute(ctx).await,
            ActionBinding::Scripted(handler) => handler.execute(ctx).await,
        }
    }
}

/// All handler bindings of one enabled rule
///
/// Owns the script handles acquired during resolution so they can be
/// released on every exit path when the rule is disabled or removed.
pub struct RuleBindings {
    pub triggers: Vec<TriggerBinding>,
    pub conditions: Vec<ConditionBinding>,
    pub actions: Vec<ActionBinding>,
    script_handles: Vec<Arc<ScriptHandle>>,
}

impl RuleBindings {
    /// Dispose every script handle owned by these bindings
    ///
    /// Idempotent; dispose failures are logged by the handles themselves
    /// and never block teardown.
    pub async fn dispose(&self) {
        for handle in &self.script_handles {
            handle.dispose().await;
        }
    }

    /// Number of script handles acquired for this rule
    pub fn script_handle_count(&self) -> usize {
        self.script_handles.len()
    }
}

/// Resolves module instances to handlers, native factories first
pub struct HandlerResolver {
    registry: Arc<ModuleRegistry>,
    script_engine: Option<Arc<dyn ScriptEngine>>,
}

impl HandlerResolver {
    /// Create a resolver over the registry and optional script collaborator
    pub fn new(registry: Arc<ModuleRegistry>, script_engine: Option<Arc<dyn ScriptEngine>>) -> Self {
        Self {
            registry,
            script_engine,
        }
    }

    /// Resolve every module of a rule, in declared order
    ///
    /// All-or-nothing: on any failure the script handles acquired so far
    /// are disposed and the error is returned, leaving the rule
    /// uninitialized.
    pub async fn resolve_rule(&self, rule: &Rule) -> EngineResult<RuleBindings> {
        let mut bindings = RuleBindings {
            triggers: Vec::with_capacity(rule.triggers.len()),
            conditions: Vec::with_capacity(rule.conditions.len()),
            actions: Vec::with_capacity(rule.actions.len()),
            script_handles: Vec::new(),
        };

        let result = self.resolve_into(rule, &mut bindings);
        if let Err(e) = result {
            bindings.dispose().await;
            return Err(e);
        }

        debug!(
            rule_id = %rule.id,
            triggers = bindings.triggers.len(),
            conditions = bindings.conditions.len(),
            actions = bindings.actions.len(),
            scripts = bindings.script_handles.len(),
            "Resolved rule bindings"
        );
        Ok(bindings)
    }

    fn resolve_into(&self, rule: &Rule, bindings: &mut RuleBindings) -> EngineResult<()> {
        for module in &rule.triggers {
            let binding = self.resolve_trigger(module, &mut bindings.script_handles)?;
            bindings.triggers.push(binding);
        }
        for module in &rule.conditions {
            let binding = self.resolve_condition(module, &mut bindings.script_handles)?;
            bindings.conditions.push(binding);
        }
        for module in &rule.actions {
            let binding = self.resolve_action(module, &mut bindings.script_handles)?;
            bindings.actions.push(binding);
        }
        Ok(())
    }

    fn resolve_trigger(
        &self,
        module: &ModuleInstance,
        handles: &mut Vec<Arc<ScriptHandle>>,
    ) -> EngineResult<TriggerBinding> {
        if let Some(handler) = self.create_native(module, ModuleKind::Trigger)? {
            let ModuleHandler::Trigger(handler) = handler else {
                return Err(kind_mismatch(module, ModuleKind::Trigger));
            };
            return Ok(TriggerBinding::Native(handler));
        }

        let handle = self.acquire_script(module, handles)?;
        Ok(TriggerBinding::Scripted(ScriptedTrigger::new(
            handle,
            module.configuration.clone(),
        )))
    }

    fn resolve_condition(
        &self,
        module: &ModuleInstance,
        handles: &mut Vec<Arc<ScriptHandle>>,
    ) -> EngineResult<ConditionBinding> {
        if let Some(handler) = self.create_native(module, ModuleKind::Condition)? {
            let ModuleHandler::Condition(handler) = handler else {
                return Err(kind_mismatch(module, ModuleKind::Condition));
            };
            return Ok(ConditionBinding::Native(handler));
        }

        let handle = self.acquire_script(module, handles)?;
        Ok(ConditionBinding::Scripted(ScriptedCondition::new(
            handle,
            module.configuration.clone(),
        )))
    }

    fn resolve_action(
        &self,
        module: &ModuleInstance,
        handles: &mut Vec<Arc<ScriptHandle>>,
    ) -> EngineResult<ActionBinding> {
        if let Some(handler) = self.create_native(module, ModuleKind::Action)? {
            let ModuleHandler::Action(handler) = handler else {
                return Err(kind_mismatch(module, ModuleKind::Action));
            };
            return Ok(ActionBinding::Native(handler));
        }

        let handle = self.acquire_script(module, handles)?;
        Ok(ActionBinding::Scripted(ScriptedAction::new(
            handle,
            module.configuration.clone(),
        )))
    }

    /// Native factory path; `None` means "no native factory, try scripted"
    fn create_native(
        &self,
        module: &ModuleInstance,
        expected: ModuleKind,
    ) -> EngineResult<Option<ModuleHandler>> {
        let Some(factory) = self.registry.lookup_factory(&module.type_id) else {
            return Ok(None);
        };

        trace!(module_id = %module.id, type_id = %module.type_id, kind = %expected, "Resolving via native factory");
        let handler = factory
            .create(module)
            .map_err(|e| EngineError::HandlerConstruction {
                module_id: module.id.clone(),
                message: e.to_string(),
            })?;
        Ok(Some(handler))
    }

    /// Scripted fallback; fails as unresolved when the module carries no
    /// script or no script engine is installed
    fn acquire_script(
        &self,
        module: &ModuleInstance,
        handles: &mut Vec<Arc<ScriptHandle>>,
    ) -> EngineResult<Arc<ScriptHandle>> {
        let Some(spec) = &module.script else {
            return Err(unresolved(module));
        };
        let Some(engine) = &self.script_engine else {
            return Err(unresolved(module));
        };

        if !engine.supports(&spec.language) {
            return Err(EngineError::Script(ScriptError::UnsupportedLanguage(
                spec.language.clone(),
            )));
        }

        trace!(module_id = %module.id, language = %spec.language, "Acquiring script handle");
        let script = engine.create(&spec.language, &spec.source)?;
        let handle = Arc::new(ScriptHandle::new(script));
        handles.push(handle.clone());
        Ok(handle)
    }
}

fn unresolved(module: &ModuleInstance) -> EngineError {
    EngineError::UnresolvedHandler {
        module_id: module.id.clone(),
        type_id: module.type_id.clone(),
    }
}

fn kind_mismatch(module: &ModuleInstance, expected: ModuleKind) -> EngineError {
    EngineError::HandlerKindMismatch {
        module_id: module.id.clone(),
        type_id: module.type_id.clone(),
        expected,
    }
}
