//! Scripted handler support
//!
//! This crate wraps user scripts so they satisfy the trigger, condition,
//! and action handler contracts of the rule engine.
//!
//! # Key Types
//!
//! - [`Script`] / [`ScriptEngine`] - External script-execution collaborator
//! - [`ScriptHandle`] - One script context: exclusive invocation, one-shot
//!   disposal
//! - [`ScriptedTrigger`] / [`ScriptedCondition`] / [`ScriptedAction`] -
//!   Adapters satisfying the handler traits

pub mod handle;
pub mod handler;
pub mod script;

pub use handle::ScriptHandle;
pub use handler::{ScriptedAction, ScriptedCondition, ScriptedTrigger};
pub use script::{Script, ScriptEngine, ScriptError, ScriptResult};
