//! Core types for the rule engine
//!
//! This crate defines the shared data model: module types and instances,
//! rules with their ordered trigger/condition/action lists, rule status,
//! and the trigger events delivered by the event bus.
//!
//! # Key Types
//!
//! - [`ModuleType`] - Registered definition/schema for a kind of module
//! - [`ModuleInstance`] - A trigger, condition, or action within a rule
//! - [`Rule`] - Complete rule definition
//! - [`RuleStatus`] - Lifecycle/run status of a rule
//! - [`TriggerEvent`] - Topic + payload event that starts rule evaluation

pub mod event;
pub mod module;
pub mod rule;

pub use event::TriggerEvent;
pub use module::{ModuleInstance, ModuleKind, ModuleType, ScriptSpec};
pub use rule::{Rule, RuleConfig, RuleStatus};
