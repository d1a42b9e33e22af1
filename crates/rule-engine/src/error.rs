//! Engine errors

use rule_core::ModuleKind;
use rule_registry::RegistrationError;
use rule_script::ScriptError;
use thiserror::Error;

/// Errors surfaced by the rule engine's lifecycle API
///
/// These are the synchronous, resolution-time errors: they are returned to
/// the caller of `add_rule`/`enable_rule` and prevent the rule from
/// becoming active. Per-run handler failures are never surfaced here; they
/// are captured in the rule's `Failed` status instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("rule not found: {0}")]
    RuleNotFound(String),

    #[error("rule already exists: {0}")]
    DuplicateRule(String),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error("no handler available for module {module_id} (type {type_id})")]
    UnresolvedHandler { module_id: String, type_id: String },

    #[error("module {module_id} (type {type_id}) resolved to a handler of the wrong kind, expected {expected}")]
    HandlerKindMismatch {
        module_id: String,
        type_id: String,
        expected: ModuleKind,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("handler construction failed for module {module_id}: {message}")]
    HandlerConstruction { module_id: String, message: String },

    #[error(transparent)]
    Script(#[from] ScriptError),
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
