//! End-to-end engine tests
//!
//! Drives the engine through the public API: rules are added from JSON
//! definitions, enabled, and fired via the event bus, with a mock script
//! collaborator standing in for a real script runtime.

use rule_core::{RuleConfig, RuleStatus, TriggerEvent};
use rule_engine::{register_core_module_types, RuleEngine};
use rule_event_bus::EventBus;
use rule_registry::{HandlerError, HandlerFactory, HandlerResult, ModuleHandler, RunContext};
use rule_script::{Script, ScriptEngine, ScriptError, ScriptResult};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// --- Mock script collaborator ---

type Behavior = Arc<dyn Fn(&Map<String, Value>) -> ScriptResult<Value> + Send + Sync>;

/// Script engine whose scripts are keyed by their source text
struct MockScriptEngine {
    behaviors: Mutex<HashMap<String, Behavior>>,
    creates: AtomicUsize,
    disposals: Arc<AtomicUsize>,
}

impl MockScriptEngine {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            behaviors: Mutex::new(HashMap::new()),
            creates: AtomicUsize::new(0),
            disposals: Arc::new(AtomicUsize::new(0)),
        })
    }

    fn behavior<F>(&self, source: &str, f: F)
    where
        F: Fn(&Map<String, Value>) -> ScriptResult<Value> + Send + Sync + 'static,
    {
        self.behaviors
            .lock()
            .unwrap()
            .insert(source.to_string(), Arc::new(f));
    }

    fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    fn disposals(&self) -> usize {
        self.disposals.load(Ordering::SeqCst)
    }
}

impl ScriptEngine for MockScriptEngine {
    fn supports(&self, language: &str) -> bool {
        language == "mock"
    }

    fn create(&self, _language: &str, source: &str) -> ScriptResult<Box<dyn Script>> {
        let behavior = self
            .behaviors
            .lock()
            .unwrap()
            .get(source)
            .cloned()
            .ok_or_else(|| ScriptError::Compilation(format!("unknown script: {source}")))?;

        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockScript {
            behavior,
            disposals: self.disposals.clone(),
        }))
    }
}

struct MockScript {
    behavior: Behavior,
    disposals: Arc<AtomicUsize>,
}

impl Script for MockScript {
    fn execute(&mut self, params: &Map<String, Value>) -> ScriptResult<Value> {
        (self.behavior)(params)
    }

    fn dispose(&mut self) -> ScriptResult<()> {
        self.disposals.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// --- Counting / failing native test actions ---

struct CountActionHandler {
    counters: Arc<Vec<AtomicUsize>>,
    slot: usize,
}

#[async_trait::async_trait]
impl rule_registry::ActionHandler for CountActionHandler {
    async fn execute(&self, _ctx: &RunContext) -> HandlerResult<Option<Value>> {
        self.counters[self.slot].fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }
}

/// Native action that increments the counter named by its "slot" config
struct CountActionFactory {
    counters: Arc<Vec<AtomicUsize>>,
}

impl HandlerFactory for CountActionFactory {
    fn create(&self, module: &rule_core::ModuleInstance) -> HandlerResult<ModuleHandler> {
        let slot = module
            .configuration
            .get("slot")
            .and_then(Value::as_u64)
            .ok_or_else(|| HandlerError::InvalidConfiguration("missing 'slot'".into()))?;
        Ok(ModuleHandler::Action(Arc::new(CountActionHandler {
            counters: self.counters.clone(),
            slot: slot as usize,
        })))
    }
}

struct FailActionHandler;

#[async_trait::async_trait]
impl rule_registry::ActionHandler for FailActionHandler {
    async fn execute(&self, _ctx: &RunContext) -> HandlerResult<Option<Value>> {
        Err(HandlerError::Failed("intentional failure".into()))
    }
}

struct FailActionFactory;

impl HandlerFactory for FailActionFactory {
    fn create(&self, _module: &rule_core::ModuleInstance) -> HandlerResult<ModuleHandler> {
        Ok(ModuleHandler::Action(Arc::new(FailActionHandler)))
    }
}

// --- Helpers ---

fn counters(n: usize) -> Arc<Vec<AtomicUsize>> {
    Arc::new((0..n).map(|_| AtomicUsize::new(0)).collect())
}

fn engine_with_core_modules() -> RuleEngine {
    let engine = RuleEngine::new(Arc::new(EventBus::new()));
    register_core_module_types(&engine).unwrap();
    engine
}

async fn wait_until(what: &str, cond: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !cond() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn wait_for_status(engine: &RuleEngine, id: &str, pred: impl Fn(&RuleStatus) -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        if let Some(status) = engine.rule_status(id).await {
            if pred(&status) {
                return;
            }
        }
        if tokio::time::Instant::now() > deadline {
            panic!(
                "timed out waiting for status of {id}, last: {:?}",
                engine.rule_status(id).await
            );
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn rule_json(json_text: &str) -> RuleConfig {
    serde_json::from_str(json_text).unwrap()
}

// --- Scenario 1: temperature > 20°C turns on the fan ---

#[tokio::test]
async fn fan_turns_on_above_threshold() {
    let engine = engine_with_core_modules();
    let bus = engine.bus();

    engine
        .add_rule(rule_json(
            r#"{
                "id": "fan_rule",
                "triggers": [
                    {"id": "t1", "type": "core.TopicTrigger",
                     "configuration": {"topic": "sensor/temperature"}}
                ],
                "conditions": [
                    {"id": "c1", "type": "core.CompareCondition",
                     "configuration": {"input": "payload", "operator": ">", "value": "20 °C"}}
                ],
                "actions": [
                    {"id": "a1", "type": "core.PublishAction",
                     "configuration": {"topic": "fan/set", "payload": "ON"}}
                ]
            }"#,
        ))
        .await
        .unwrap();
    engine.enable_rule("fan_rule").await.unwrap();

    let mut fan = bus.subscribe("fan/set");

    // 25 °C satisfies the condition: the fan command must arrive
    bus.publish(TriggerEvent::new("sensor/temperature", json!("25 °C")));
    let command = tokio::time::timeout(Duration::from_secs(2), fan.recv())
        .await
        .expect("fan command not published")
        .unwrap();
    assert_eq!(command.payload, json!("ON"));

    // 15 °C does not: no further fan command may ever arrive
    bus.publish(TriggerEvent::new("sensor/temperature", json!("15 °C")));
    let silent = tokio::time::timeout(Duration::from_millis(200), fan.recv()).await;
    assert!(silent.is_err(), "action executed despite cold reading");

    wait_for_status(&engine, "fan_rule", |s| *s == RuleStatus::Idle).await;
}

// --- Scenario 2: failing action, unrelated rule unaffected ---

#[tokio::test]
async fn failing_action_aborts_run_but_not_other_rules() {
    let engine = engine_with_core_modules();
    let bus = engine.bus();
    let counters = counters(3);

    engine
        .register_handler_factory(
            "test.CountAction",
            Arc::new(CountActionFactory {
                counters: counters.clone(),
            }),
        )
        .unwrap();
    engine
        .register_handler_factory("test.FailAction", Arc::new(FailActionFactory))
        .unwrap();

    engine
        .add_rule(rule_json(
            r#"{
                "id": "failing",
                "triggers": [{"id": "t", "type": "core.TopicTrigger", "configuration": {"topic": "go/a"}}],
                "actions": [
                    {"id": "a1", "type": "test.CountAction", "configuration": {"slot": 0}},
                    {"id": "a2", "type": "test.FailAction"},
                    {"id": "a3", "type": "test.CountAction", "configuration": {"slot": 1}}
                ]
            }"#,
        ))
        .await
        .unwrap();
    engine
        .add_rule(rule_json(
            r#"{
                "id": "healthy",
                "triggers": [{"id": "t", "type": "core.TopicTrigger", "configuration": {"topic": "go/b"}}],
                "actions": [{"id": "a1", "type": "test.CountAction", "configuration": {"slot": 2}}]
            }"#,
        ))
        .await
        .unwrap();
    engine.enable_rule("failing").await.unwrap();
    engine.enable_rule("healthy").await.unwrap();

    // Fire both rules concurrently
    bus.publish(TriggerEvent::new("go/a", json!(null)));
    bus.publish(TriggerEvent::new("go/b", json!(null)));

    wait_for_status(&engine, "failing", |s| matches!(s, RuleStatus::Failed { .. })).await;
    wait_for_status(&engine, "healthy", |s| *s == RuleStatus::Idle).await;

    let c = counters.clone();
    wait_until("healthy counter", move || c[2].load(Ordering::SeqCst) == 1).await;

    // The action before the failure ran, the action after it did not
    assert_eq!(counters[0].load(Ordering::SeqCst), 1);
    assert_eq!(counters[1].load(Ordering::SeqCst), 0);

    let Some(RuleStatus::Failed { last_error }) = engine.rule_status("failing").await else {
        panic!("expected failed status");
    };
    assert!(last_error.contains("intentional failure"));
}

// --- Conditions: ordered AND with short-circuit ---

#[tokio::test]
async fn false_condition_short_circuits_and_skips_actions() {
    let engine = engine_with_core_modules();
    let bus = engine.bus();
    let counters = counters(1);
    let scripts = MockScriptEngine::new();

    let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    let log_a = log.clone();
    scripts.behavior("cond_false", move |_| {
        log_a.lock().unwrap().push("cond_false");
        Ok(json!(false))
    });
    let log_b = log.clone();
    scripts.behavior("cond_after", move |_| {
        log_b.lock().unwrap().push("cond_after");
        Ok(json!(true))
    });
    engine.set_script_engine(scripts.clone());

    engine
        .register_handler_factory(
            "test.CountAction",
            Arc::new(CountActionFactory {
                counters: counters.clone(),
            }),
        )
        .unwrap();

    engine
        .add_rule(rule_json(
            r#"{
                "id": "gated",
                "triggers": [{"id": "t", "type": "core.TopicTrigger", "configuration": {"topic": "go"}}],
                "conditions": [
                    {"id": "c1", "type": "script.cond", "script": {"language": "mock", "source": "cond_false"}},
                    {"id": "c2", "type": "script.cond", "script": {"language": "mock", "source": "cond_after"}}
                ],
                "actions": [{"id": "a1", "type": "test.CountAction", "configuration": {"slot": 0}}]
            }"#,
        ))
        .await
        .unwrap();
    engine.enable_rule("gated").await.unwrap();

    bus.publish(TriggerEvent::new("go", json!(null)));

    let l = log.clone();
    wait_until("first condition evaluated", move || {
        !l.lock().unwrap().is_empty()
    })
    .await;
    wait_for_status(&engine, "gated", |s| *s == RuleStatus::Idle).await;

    // The first false condition ended the run: no later condition, no action
    assert_eq!(*log.lock().unwrap(), vec!["cond_false"]);
    assert_eq!(counters[0].load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn uncomparable_condition_is_unsatisfied_not_failed() {
    let engine = engine_with_core_modules();
    let bus = engine.bus();
    let mut out = bus.subscribe("out");

    engine
        .add_rule(rule_json(
            r#"{
                "id": "uncomparable",
                "triggers": [{"id": "t", "type": "core.TopicTrigger", "configuration": {"topic": "go"}}],
                "conditions": [
                    {"id": "c1", "type": "core.CompareCondition",
                     "configuration": {"input": "payload", "operator": ">", "value": "20 °C"}}
                ],
                "actions": [{"id": "a1", "type": "core.PublishAction", "configuration": {"topic": "out"}}]
            }"#,
        ))
        .await
        .unwrap();
    engine.enable_rule("uncomparable").await.unwrap();

    // A text payload has no ordering against a temperature quantity
    bus.publish(TriggerEvent::new("go", json!("rather warm")));

    let silent = tokio::time::timeout(Duration::from_millis(200), out.recv()).await;
    assert!(silent.is_err());
    wait_for_status(&engine, "uncomparable", |s| *s == RuleStatus::Idle).await;
}

// --- Actions consume prior actions' outputs ---

#[tokio::test]
async fn action_results_merge_into_context_in_order() {
    let engine = engine_with_core_modules();
    let bus = engine.bus();
    let scripts = MockScriptEngine::new();

    let seen: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
    scripts.behavior("produce", |_| Ok(json!({"brightness": 128})));
    let seen_w = seen.clone();
    scripts.behavior("consume", move |params| {
        *seen_w.lock().unwrap() = params.get("brightness").cloned();
        Ok(Value::Null)
    });
    engine.set_script_engine(scripts.clone());

    engine
        .add_rule(rule_json(
            r#"{
                "id": "chained",
                "triggers": [{"id": "t", "type": "core.TopicTrigger", "configuration": {"topic": "go"}}],
                "actions": [
                    {"id": "a1", "type": "script.action", "script": {"language": "mock", "source": "produce"}},
                    {"id": "a2", "type": "script.action", "script": {"language": "mock", "source": "consume"}}
                ]
            }"#,
        ))
        .await
        .unwrap();
    engine.enable_rule("chained").await.unwrap();

    bus.publish(TriggerEvent::new("go", json!(null)));

    let s = seen.clone();
    wait_until("second action saw first action's output", move || {
        s.lock().unwrap().is_some()
    })
    .await;
    assert_eq!(*seen.lock().unwrap(), Some(json!(128)));
}

// --- Resolution precedence: native beats scripted ---

#[tokio::test]
async fn native_factory_wins_over_script_backing() {
    let engine = engine_with_core_modules();
    let bus = engine.bus();
    let counters = counters(1);
    let scripts = MockScriptEngine::new();
    scripts.behavior("shadowed", |_| Ok(json!({"from": "script"})));
    engine.set_script_engine(scripts.clone());

    // The module is script-backed AND a native factory is registered for
    // its type id: the native handler must be chosen
    engine
        .register_handler_factory(
            "dual.Action",
            Arc::new(CountActionFactory {
                counters: counters.clone(),
            }),
        )
        .unwrap();

    engine
        .add_rule(rule_json(
            r#"{
                "id": "dual",
                "triggers": [{"id": "t", "type": "core.TopicTrigger", "configuration": {"topic": "go"}}],
                "actions": [
                    {"id": "a1", "type": "dual.Action",
                     "configuration": {"slot": 0},
                     "script": {"language": "mock", "source": "shadowed"}}
                ]
            }"#,
        ))
        .await
        .unwrap();
    engine.enable_rule("dual").await.unwrap();

    bus.publish(TriggerEvent::new("go", json!(null)));

    let c = counters.clone();
    wait_until("native action ran", move || c[0].load(Ordering::SeqCst) == 1).await;
    assert_eq!(scripts.creates(), 0, "script path must not be exercised");
}

// --- Script lifecycle: dispose exactly once ---

#[tokio::test]
async fn disable_disposes_scripts_exactly_once() {
    let engine = engine_with_core_modules();
    let scripts = MockScriptEngine::new();
    scripts.behavior("noop", |_| Ok(Value::Null));
    engine.set_script_engine(scripts.clone());

    engine
        .add_rule(rule_json(
            r#"{
                "id": "scripted",
                "triggers": [{"id": "t", "type": "core.TopicTrigger", "configuration": {"topic": "go"}}],
                "actions": [{"id": "a1", "type": "script.action", "script": {"language": "mock", "source": "noop"}}]
            }"#,
        ))
        .await
        .unwrap();

    // Lazy acquisition: nothing is created until the rule is enabled
    assert_eq!(scripts.creates(), 0);

    engine.enable_rule("scripted").await.unwrap();
    assert_eq!(scripts.creates(), 1);

    engine.disable_rule("scripted").await.unwrap();
    engine.disable_rule("scripted").await.unwrap();
    engine.remove_rule("scripted").await.unwrap();

    // Redundant disable/remove paths released the context exactly once
    assert_eq!(scripts.disposals(), 1);
}

#[tokio::test]
async fn reenabling_acquires_a_fresh_script() {
    let engine = engine_with_core_modules();
    let scripts = MockScriptEngine::new();
    scripts.behavior("noop", |_| Ok(Value::Null));
    engine.set_script_engine(scripts.clone());

    engine
        .add_rule(rule_json(
            r#"{
                "id": "scripted",
                "triggers": [{"id": "t", "type": "core.TopicTrigger", "configuration": {"topic": "go"}}],
                "conditions": [{"id": "c1", "type": "script.cond", "script": {"language": "mock", "source": "noop"}}]
            }"#,
        ))
        .await
        .unwrap();

    engine.enable_rule("scripted").await.unwrap();
    engine.disable_rule("scripted").await.unwrap();
    engine.enable_rule("scripted").await.unwrap();
    engine.disable_rule("scripted").await.unwrap();

    assert_eq!(scripts.creates(), 2);
    assert_eq!(scripts.disposals(), 2);
}

// --- Rule isolation under concurrency ---

#[tokio::test]
async fn concurrent_rules_do_not_interfere() {
    const RULES: usize = 5;
    const FIRES: usize = 8;

    let engine = engine_with_core_modules();
    let bus = engine.bus();
    let counters = counters(RULES);

    engine
        .register_handler_factory(
            "test.CountAction",
            Arc::new(CountActionFactory {
                counters: counters.clone(),
            }),
        )
        .unwrap();

    for i in 0..RULES {
        let config = rule_json(&format!(
            r#"{{
                "id": "rule_{i}",
                "triggers": [{{"id": "t", "type": "core.TopicTrigger", "configuration": {{"topic": "counter/{i}"}}}}],
                "actions": [{{"id": "a", "type": "test.CountAction", "configuration": {{"slot": {i}}}}}]
            }}"#
        ));
        engine.add_rule(config).await.unwrap();
        engine.enable_rule(&format!("rule_{i}")).await.unwrap();
    }

    for _ in 0..FIRES {
        for i in 0..RULES {
            bus.publish(TriggerEvent::new(format!("counter/{i}"), json!(null)));
        }
    }

    let c = counters.clone();
    wait_until("all counters reached the fire count", move || {
        (0..RULES).all(|i| c[i].load(Ordering::SeqCst) == FIRES)
    })
    .await;

    // Exactly one increment per trigger, no cross-rule interference
    for i in 0..RULES {
        assert_eq!(counters[i].load(Ordering::SeqCst), FIRES);
    }
}

// --- Configuration validation gates enabling ---

#[tokio::test]
async fn invalid_configuration_blocks_enable() {
    let engine = engine_with_core_modules();

    engine
        .add_rule(rule_json(
            r#"{
                "id": "misconfigured",
                "triggers": [{"id": "t", "type": "core.TopicTrigger", "configuration": {"topic": 42}}]
            }"#,
        ))
        .await
        .unwrap();

    let err = engine.enable_rule("misconfigured").await.unwrap_err();
    assert!(matches!(
        err,
        rule_engine::EngineError::InvalidConfiguration(_)
    ));
    assert_eq!(
        engine.rule_status("misconfigured").await,
        Some(RuleStatus::Uninitialized)
    );
}
