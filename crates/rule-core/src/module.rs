//! Module types and module instances
//!
//! A ModuleType is the registered definition for a kind of trigger,
//! condition, or action. A ModuleInstance references a type by id and
//! carries the concrete configuration values declared in a rule.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The kind of behavior a module provides within a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKind {
    /// Starts rule evaluation on an external event
    Trigger,

    /// Evaluated to boolean, gates action execution
    Condition,

    /// Side-effecting step executed after conditions pass
    Action,
}

impl std::fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModuleKind::Trigger => write!(f, "trigger"),
            ModuleKind::Condition => write!(f, "condition"),
            ModuleKind::Action => write!(f, "action"),
        }
    }
}

/// Registered definition of a module kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleType {
    /// Unique type identifier (e.g., "core.TopicTrigger")
    pub id: String,

    /// What kind of module this type produces
    pub kind: ModuleKind,

    /// Human-readable label
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// JSON Schema for the module configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_schema: Option<Value>,
}

impl ModuleType {
    /// Create a module type without label/description/schema
    pub fn new(id: impl Into<String>, kind: ModuleKind) -> Self {
        Self {
            id: id.into(),
            kind,
            label: None,
            description: None,
            config_schema: None,
        }
    }

    /// Attach a JSON Schema for configuration validation
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.config_schema = Some(schema);
        self
    }
}

/// Reference to a user script backing a module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptSpec {
    /// Scripting language identifier (e.g., "js", "lua")
    pub language: String,

    /// Script source text
    pub source: String,
}

/// A trigger, condition, or action instance within a rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleInstance {
    /// Instance id, unique within the owning rule
    pub id: String,

    /// Referenced module type id
    #[serde(rename = "type")]
    pub type_id: String,

    /// Configuration values for this instance
    #[serde(default)]
    pub configuration: Map<String, Value>,

    /// Script backing this module, if it is script-backed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<ScriptSpec>,
}

impl ModuleInstance {
    /// Create a module instance with empty configuration
    pub fn new(id: impl Into<String>, type_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            type_id: type_id.into(),
            configuration: Map::new(),
            script: None,
        }
    }

    /// Set a configuration value
    pub fn with_config(mut self, key: impl Into<String>, value: Value) -> Self {
        self.configuration.insert(key.into(), value);
        self
    }

    /// Mark the instance as script-backed
    pub fn with_script(mut self, language: impl Into<String>, source: impl Into<String>) -> Self {
        self.script = Some(ScriptSpec {
            language: language.into(),
            source: source.into(),
        });
        self
    }

    /// Whether this instance carries a script reference
    pub fn is_script_backed(&self) -> bool {
        self.script.is_some()
    }
}
