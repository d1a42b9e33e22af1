//! Rule execution engine
//!
//! This crate orchestrates automation rules: it resolves each rule's
//! trigger/condition/action modules to handlers (native factories first,
//! user scripts as fallback) and runs the per-rule pipeline when triggers
//! fire.
//!
//! # Architecture
//!
//! ```text
//! RULE = TRIGGERS → CONDITIONS (AND, short-circuit) → ACTIONS (sequential)
//! ```
//!
//! Each enabled rule listens on its own task; independent rules run
//! concurrently while runs of a single rule are serialized.
//!
//! # Key Types
//!
//! - [`RuleEngine`] - Lifecycle API: add/enable/disable/remove/status
//! - [`HandlerResolver`] - Native-first module-to-handler binding
//! - [`EngineError`] - Synchronous resolution-time errors

pub mod engine;
pub mod error;
pub mod modules;
pub mod resolver;

pub use engine::RuleEngine;
pub use error::{EngineError, EngineResult};
pub use modules::{register_core_module_types, COMPARE_CONDITION, PUBLISH_ACTION, TOPIC_TRIGGER};
pub use resolver::{
    ActionBinding, ConditionBinding, HandlerResolver, RuleBindings, TriggerBinding,
};
