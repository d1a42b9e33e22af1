//! Rule definition and status
//!
//! A rule ties together ordered lists of trigger, condition, and action
//! module instances. List order is significant: it is preserved exactly as
//! declared and determines evaluation and execution order.

use serde::{Deserialize, Serialize};

use crate::module::ModuleInstance;

/// Rule configuration handed over by an external definition loader
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Unique ID (optional, auto-generated if not provided)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Human-readable name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Triggers that start the rule, in declared order
    #[serde(default, alias = "trigger")]
    pub triggers: Vec<ModuleInstance>,

    /// Conditions that must all hold, in declared order
    #[serde(default, alias = "condition")]
    pub conditions: Vec<ModuleInstance>,

    /// Actions to execute, in declared order
    #[serde(default, alias = "action")]
    pub actions: Vec<ModuleInstance>,
}

/// A rule as held by the engine
#[derive(Debug, Clone)]
pub struct Rule {
    /// Unique identifier
    pub id: String,

    /// Human-readable name
    pub name: Option<String>,

    /// Description
    pub description: Option<String>,

    /// Trigger module instances, in declared order
    pub triggers: Vec<ModuleInstance>,

    /// Condition module instances, in declared order
    pub conditions: Vec<ModuleInstance>,

    /// Action module instances, in declared order
    pub actions: Vec<ModuleInstance>,
}

impl Rule {
    /// Create from config, generating a ULID id when none is provided
    pub fn from_config(config: RuleConfig) -> Self {
        let id = config.id.unwrap_or_else(|| ulid::Ulid::new().to_string());

        Self {
            id,
            name: config.name,
            description: config.description,
            triggers: config.triggers,
            conditions: config.conditions,
            actions: config.actions,
        }
    }

    /// Get display name (name or ID)
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Iterate all module instances in trigger, condition, action order
    pub fn modules(&self) -> impl Iterator<Item = &ModuleInstance> {
        self.triggers
            .iter()
            .chain(self.conditions.iter())
            .chain(self.actions.iter())
    }
}

/// Lifecycle and run status of a rule
///
/// `Failed` is a resting status: the run that produced it is over and the
/// rule keeps listening for the next trigger, which overwrites the status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RuleStatus {
    /// Added but not enabled, or enabling failed to resolve its handlers
    Uninitialized,

    /// Enabled and waiting for a trigger
    Idle,

    /// A trigger fired and the pipeline is executing
    Running,

    /// Explicitly disabled; handlers and scripts are disposed
    Disabled,

    /// The last run failed; the rule is still listening
    Failed {
        /// Error captured from the failed run
        last_error: String,
    },
}

impl RuleStatus {
    /// Whether the rule currently accepts trigger events
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            RuleStatus::Idle | RuleStatus::Running | RuleStatus::Failed { .. }
        )
    }
}
