//! Rule execution engine
//!
//! Orchestrates the trigger→condition→action pipeline per rule. Each
//! enabled rule runs on its own task: runs of one rule are serialized,
//! distinct rules run concurrently with no synchronization between them
//! beyond the shared read-mostly module registry. Trigger delivery is
//! asynchronous — publishing an event returns immediately and the
//! pipelines run out-of-band.

use rule_core::{ModuleType, Rule, RuleConfig, RuleStatus, TriggerEvent};
use rule_event_bus::SharedEventBus;
use rule_registry::{HandlerFactory, ModuleRegistry, RunContext};
use rule_script::ScriptEngine;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{EngineError, EngineResult};
use crate::resolver::{HandlerResolver, RuleBindings};

/// Shared, queryable status of one rule
struct StatusCell(Mutex<RuleStatus>);

impl StatusCell {
    fn new(status: RuleStatus) -> Arc<Self> {
        Arc::new(Self(Mutex::new(status)))
    }

    fn set(&self, status: RuleStatus) {
        *self.0.lock().unwrap_or_else(|e| e.into_inner()) = status;
    }

    fn get(&self) -> RuleStatus {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Live resources of an enabled rule
struct RuleRuntime {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
    bindings: Arc<RuleBindings>,
}

/// A rule as tracked by the engine
struct RuleEntry {
    rule: Rule,
    status: Arc<StatusCell>,
    runtime: Option<RuleRuntime>,
}

/// The rule execution engine
pub struct RuleEngine {
    bus: SharedEventBus,
    registry: Arc<ModuleRegistry>,
    script_engine: std::sync::RwLock<Option<Arc<dyn ScriptEngine>>>,
    rules: RwLock<HashMap<String, RuleEntry>>,
}

impl RuleEngine {
    /// Create an engine over the given event bus
    ///
    /// The engine owns its module registry; module types and native
    /// handler factories are registered here at startup and unregistered
    /// at shutdown.
    pub fn new(bus: SharedEventBus) -> Self {
        Self {
            bus,
            registry: Arc::new(ModuleRegistry::new()),
            script_engine: std::sync::RwLock::new(None),
            rules: RwLock::new(HashMap::new()),
        }
    }

    /// The event bus this engine listens on
    pub fn bus(&self) -> SharedEventBus {
        self.bus.clone()
    }

    /// The module registry owned by this engine
    pub fn registry(&self) -> Arc<ModuleRegistry> {
        self.registry.clone()
    }

    /// Install the script-execution collaborator
    pub fn set_script_engine(&self, engine: Arc<dyn ScriptEngine>) {
        let mut slot = self
            .script_engine
            .write()
            .unwrap_or_else(|e| e.into_inner());
        *slot = Some(engine);
    }

    fn script_engine(&self) -> Option<Arc<dyn ScriptEngine>> {
        self.script_engine
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Register a module type definition
    pub fn register_module_type(&self, module_type: ModuleType) -> EngineResult<()> {
        self.registry.register_module_type(module_type)?;
        Ok(())
    }

    /// Register a native handler factory for a module type id
    pub fn register_handler_factory(
        &self,
        module_type_id: impl Into<String>,
        factory: Arc<dyn HandlerFactory>,
    ) -> EngineResult<()> {
        self.registry
            .register_handler_factory(module_type_id, factory)?;
        Ok(())
    }

    /// Add a rule in the `Uninitialized` state
    ///
    /// Returns the rule id. Fails on a duplicate id.
    pub async fn add_rule(&self, config: RuleConfig) -> EngineResult<String> {
        let rule = Rule::from_config(config);
        let id = rule.id.clone();

        let mut rules = self.rules.write().await;
        if rules.contains_key(&id) {
            return Err(EngineError::DuplicateRule(id));
        }

        info!(rule_id = %id, name = rule.display_name(), "Added rule");
        rules.insert(
            id.clone(),
            RuleEntry {
                rule,
                status: StatusCell::new(RuleStatus::Uninitialized),
                runtime: None,
            },
        );
        Ok(id)
    }

    /// Enable a rule: validate, bind handlers, start listening
    ///
    /// Fails synchronously on configuration or resolution errors, in which
    /// case the rule stays `Uninitialized`. Enabling an enabled rule is a
    /// no-op.
    pub async fn enable_rule(&self, id: &str) -> EngineResult<()> {
        let mut rules = self.rules.write().await;
        let entry = rules
            .get_mut(id)
            .ok_or_else(|| EngineError::RuleNotFound(id.to_string()))?;

        if entry.runtime.is_some() {
            debug!(rule_id = %id, "Rule already enabled");
            return Ok(());
        }

        // Configuration must validate before any handler is bound
        for module in entry.rule.modules() {
            self.registry
                .validate_configuration(module)
                .map_err(|e| EngineError::InvalidConfiguration(e.to_string()))?;
        }

        let resolver = HandlerResolver::new(self.registry.clone(), self.script_engine());
        let bindings = Arc::new(resolver.resolve_rule(&entry.rule).await?);

        // Subscribe before spawning so no event published after enable
        // returns can be missed
        let receiver = self.bus.subscribe_all();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_loop(
            entry.rule.id.clone(),
            bindings.clone(),
            entry.status.clone(),
            receiver,
            shutdown_rx,
        ));

        entry.runtime = Some(RuleRuntime {
            shutdown: shutdown_tx,
            task,
            bindings,
        });
        entry.status.set(RuleStatus::Idle);
        info!(rule_id = %id, "Enabled rule");
        Ok(())
    }

    /// Disable a rule
    ///
    /// An in-flight run completes; further runs are prevented and the
    /// rule's script handles are disposed. Disabling a rule that is not
    /// enabled only marks it `Disabled`.
    pub async fn disable_rule(&self, id: &str) -> EngineResult<()> {
        let (status, runtime) = {
            let mut rules = self.rules.write().await;
            let entry = rules
                .get_mut(id)
                .ok_or_else(|| EngineError::RuleNotFound(id.to_string()))?;
            (entry.status.clone(), entry.runtime.take())
        };

        if let Some(runtime) = runtime {
            let _ = runtime.shutdown.send(true);
            if let Err(e) = runtime.task.await {
                warn!(rule_id = %id, error = %e, "Rule task ended abnormally");
            }
            runtime.bindings.dispose().await;
        }

        status.set(RuleStatus::Disabled);
        info!(rule_id = %id, "Disabled rule");
        Ok(())
    }

    /// Remove a rule, disabling it first when necessary
    pub async fn remove_rule(&self, id: &str) -> EngineResult<Rule> {
        self.disable_rule(id).await?;

        let mut rules = self.rules.write().await;
        let entry = rules
            .remove(id)
            .ok_or_else(|| EngineError::RuleNotFound(id.to_string()))?;

        info!(rule_id = %id, "Removed rule");
        Ok(entry.rule)
    }

    /// Query a rule's status
    pub async fn rule_status(&self, id: &str) -> Option<RuleStatus> {
        let rules = self.rules.read().await;
        rules.get(id).map(|entry| entry.status.get())
    }

    /// Number of rules known to the engine
    pub async fn rule_count(&self) -> usize {
        self.rules.read().await.len()
    }
}

/// Per-rule listen loop
///
/// Shutdown is only observed between runs, so an in-flight pipeline always
/// completes before the task exits.
async fn run_loop(
    rule_id: String,
    bindings: Arc<RuleBindings>,
    status: Arc<StatusCell>,
    mut receiver: broadcast::Receiver<TriggerEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!(rule_id = %rule_id, "Rule listening");

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            event = receiver.recv() => match event {
                Ok(event) => {
                    if let Some(seed) = match_triggers(&rule_id, &bindings, &event).await {
                        run_pipeline(&rule_id, &bindings, &status, seed).await;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(rule_id = %rule_id, missed = n, "Rule lagged behind event bus");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    debug!(rule_id = %rule_id, "Rule stopped listening");
}

/// Ask the rule's triggers, in declared order, whether the event fires
///
/// The first match wins and its output seeds the run context. A trigger
/// handler error is logged and treated as "no match" for that trigger.
async fn match_triggers(
    rule_id: &str,
    bindings: &RuleBindings,
    event: &TriggerEvent,
) -> Option<Value> {
    for trigger in &bindings.triggers {
        match trigger.on_event(event).await {
            Ok(Some(output)) => {
                debug!(rule_id = %rule_id, topic = %event.topic, "Trigger matched");
                return Some(output);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(rule_id = %rule_id, error = %e, "Error evaluating trigger");
            }
        }
    }
    None
}

/// One rule run: conditions gate actions, actions feed each other
async fn run_pipeline(
    rule_id: &str,
    bindings: &RuleBindings,
    status: &StatusCell,
    seed: Value,
) {
    status.set(RuleStatus::Running);
    let mut ctx = RunContext::from_trigger_output(seed);

    // AND semantics with short-circuit: the first unsatisfied condition
    // ends the run and no actions execute
    for (index, condition) in bindings.conditions.iter().enumerate() {
        match condition.is_satisfied(&ctx).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(rule_id = %rule_id, condition = index, "Condition not satisfied");
                status.set(RuleStatus::Idle);
                return;
            }
            Err(e) => {
                error!(rule_id = %rule_id, condition = index, error = %e, "Condition evaluation failed");
                status.set(RuleStatus::Failed {
                    last_error: e.to_string(),
                });
                return;
            }
        }
    }

    // Strictly sequential: each action's result is visible to the next
    for (index, action) in bindings.actions.iter().enumerate() {
        match action.execute(&ctx).await {
            Ok(Some(result)) => ctx.merge(result),
            Ok(None) => {}
            Err(e) => {
                error!(rule_id = %rule_id, action = index, error = %e, "Action execution failed");
                status.set(RuleStatus::Failed {
                    last_error: e.to_string(),
                });
                return;
            }
        }
    }

    debug!(rule_id = %rule_id, "Run completed");
    status.set(RuleStatus::Idle);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rule_core::{ModuleInstance, RuleStatus};
    use rule_event_bus::EventBus;

    fn engine() -> RuleEngine {
        RuleEngine::new(Arc::new(EventBus::new()))
    }

    fn rule_with_unknown_module() -> RuleConfig {
        RuleConfig {
            id: Some("r1".into()),
            name: None,
            description: None,
            triggers: vec![ModuleInstance::new("t1", "nobody.Registered")],
            conditions: vec![],
            actions: vec![],
        }
    }

    #[tokio::test]
    async fn test_add_and_status() {
        let engine = engine();
        let id = engine.add_rule(rule_with_unknown_module()).await.unwrap();

        assert_eq!(id, "r1");
        assert_eq!(
            engine.rule_status("r1").await,
            Some(RuleStatus::Uninitialized)
        );
        assert_eq!(engine.rule_status("missing").await, None);
    }

    #[tokio::test]
    async fn test_duplicate_rule_fails() {
        let engine = engine();
        engine.add_rule(rule_with_unknown_module()).await.unwrap();

        let err = engine.add_rule(rule_with_unknown_module()).await.unwrap_err();
        assert!(matches!(err, EngineError::DuplicateRule(_)));
    }

    #[tokio::test]
    async fn test_enable_unresolved_stays_uninitialized() {
        let engine = engine();
        engine.add_rule(rule_with_unknown_module()).await.unwrap();

        let err = engine.enable_rule("r1").await.unwrap_err();
        assert!(matches!(err, EngineError::UnresolvedHandler { .. }));
        assert_eq!(
            engine.rule_status("r1").await,
            Some(RuleStatus::Uninitialized)
        );
    }

    #[tokio::test]
    async fn test_remove_missing_rule() {
        let engine = engine();
        let err = engine.remove_rule("ghost").await.unwrap_err();
        assert!(matches!(err, EngineError::RuleNotFound(_)));
    }

    #[tokio::test]
    async fn test_disable_without_enable() {
        let engine = engine();
        engine.add_rule(rule_with_unknown_module()).await.unwrap();

        engine.disable_rule("r1").await.unwrap();
        assert_eq!(engine.rule_status("r1").await, Some(RuleStatus::Disabled));
    }
}
