//! Script collaborator contract
//!
//! The engine does not interpret scripts itself. An external collaborator
//! implementing [`ScriptEngine`] supplies [`Script`] instances keyed by
//! scripting language; the adapters in this crate make those instances
//! satisfy the trigger/condition/action handler contracts.

use serde_json::{Map, Value};
use thiserror::Error;

/// Errors from script creation, invocation, or disposal
#[derive(Debug, Clone, Error)]
pub enum ScriptError {
    #[error("script raised an error: {0}")]
    Execution(String),

    #[error("script returned a non-boolean result: {0}")]
    NotBoolean(String),

    #[error("script has been disposed")]
    Disposed,

    #[error("no script engine available for language: {0}")]
    UnsupportedLanguage(String),

    #[error("script failed to compile: {0}")]
    Compilation(String),
}

/// Result type for script operations
pub type ScriptResult<T> = Result<T, ScriptError>;

/// A user script executed via a parameter mapping
///
/// Scripts are not assumed re-entrant or thread-safe; the owning
/// [`ScriptHandle`](crate::ScriptHandle) serializes invocations.
pub trait Script: Send {
    /// Execute the script with the given parameters
    fn execute(&mut self, params: &Map<String, Value>) -> ScriptResult<Value>;

    /// Release the script's execution context
    ///
    /// Called exactly once; the handle guards against repeats.
    fn dispose(&mut self) -> ScriptResult<()>;
}

/// External collaborator providing script instances keyed by language
pub trait ScriptEngine: Send + Sync {
    /// Whether this engine can execute scripts in the given language
    fn supports(&self, language: &str) -> bool;

    /// Create a script instance from source text
    fn create(&self, language: &str, source: &str) -> ScriptResult<Box<dyn Script>>;
}
