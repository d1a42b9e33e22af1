//! Module registry
//!
//! Holds the registered [`ModuleType`] definitions and the native
//! [`HandlerFactory`] implementations, both keyed by module-type id.
//! The registry is explicit process-wide state owned by the engine:
//! constructed at engine start, torn down by unregistration.
//!
//! Lookups are frequent and must not block each other; registration and
//! unregistration are rare and serialized. Both tables therefore sit
//! behind a reader/writer lock.

pub mod handler;

pub use handler::{
    ActionHandler, ConditionHandler, HandlerError, HandlerFactory, HandlerResult, ModuleHandler,
    RunContext, TriggerHandler,
};

use rule_core::{ModuleInstance, ModuleType};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from registering or unregistering types and factories
#[derive(Debug, Clone, Error)]
pub enum RegistrationError {
    #[error("module type already registered: {0}")]
    DuplicateModuleType(String),

    #[error("handler factory already registered for module type: {0}")]
    DuplicateFactory(String),

    #[error("module type not registered: {0}")]
    UnknownModuleType(String),

    #[error("no handler factory registered for module type: {0}")]
    UnknownFactory(String),
}

/// Result type for registration operations
pub type RegistrationResult<T> = Result<T, RegistrationError>;

/// Registry of module types and native handler factories
pub struct ModuleRegistry {
    types: RwLock<HashMap<String, ModuleType>>,
    factories: RwLock<HashMap<String, Arc<dyn HandlerFactory>>>,
}

impl ModuleRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            types: RwLock::new(HashMap::new()),
            factories: RwLock::new(HashMap::new()),
        }
    }

    /// Register a module type
    ///
    /// Fails when a type with the same id is already registered.
    pub fn register_module_type(&self, module_type: ModuleType) -> RegistrationResult<()> {
        let mut types = self.types.write().unwrap_or_else(|e| e.into_inner());

        if types.contains_key(&module_type.id) {
            return Err(RegistrationError::DuplicateModuleType(module_type.id));
        }

        debug!(type_id = %module_type.id, kind = %module_type.kind, "Registering module type");
        types.insert(module_type.id.clone(), module_type);
        Ok(())
    }

    /// Unregister a module type, returning its definition
    pub fn unregister_module_type(&self, id: &str) -> RegistrationResult<ModuleType> {
        let mut types = self.types.write().unwrap_or_else(|e| e.into_inner());

        debug!(type_id = %id, "Unregistering module type");
        types
            .remove(id)
            .ok_or_else(|| RegistrationError::UnknownModuleType(id.to_string()))
    }

    /// Look up a module type definition
    pub fn module_type(&self, id: &str) -> Option<ModuleType> {
        let types = self.types.read().unwrap_or_else(|e| e.into_inner());
        types.get(id).cloned()
    }

    /// Register a native handler factory for a module type id
    ///
    /// Fails when a factory is already registered for the id. The registry
    /// never holds two factories for the same module-type identifier.
    pub fn register_handler_factory(
        &self,
        module_type_id: impl Into<String>,
        factory: Arc<dyn HandlerFactory>,
    ) -> RegistrationResult<()> {
        let module_type_id = module_type_id.into();
        let mut factories = self.factories.write().unwrap_or_else(|e| e.into_inner());

        if factories.contains_key(&module_type_id) {
            return Err(RegistrationError::DuplicateFactory(module_type_id));
        }

        debug!(type_id = %module_type_id, "Registering handler factory");
        factories.insert(module_type_id, factory);
        Ok(())
    }

    /// Unregister a handler factory
    pub fn unregister_handler_factory(&self, module_type_id: &str) -> RegistrationResult<()> {
        let mut factories = self.factories.write().unwrap_or_else(|e| e.into_inner());

        debug!(type_id = %module_type_id, "Unregistering handler factory");
        factories
            .remove(module_type_id)
            .map(|_| ())
            .ok_or_else(|| RegistrationError::UnknownFactory(module_type_id.to_string()))
    }

    /// Look up the native factory for a module type id
    ///
    /// An unknown id is `None`, not an error, so the caller can fall back
    /// to scripted resolution.
    pub fn lookup_factory(&self, module_type_id: &str) -> Option<Arc<dyn HandlerFactory>> {
        let factories = self.factories.read().unwrap_or_else(|e| e.into_inner());
        factories.get(module_type_id).cloned()
    }

    /// Validate a module instance's configuration against its type schema
    ///
    /// A module whose type is not registered (the scripted-only case) and a
    /// type without a schema both validate trivially.
    pub fn validate_configuration(&self, module: &ModuleInstance) -> HandlerResult<()> {
        let Some(module_type) = self.module_type(&module.type_id) else {
            return Ok(());
        };
        let Some(schema) = module_type.config_schema else {
            return Ok(());
        };

        let compiled = jsonschema::JSONSchema::compile(&schema).map_err(|e| {
            warn!(type_id = %module.type_id, error = %e, "Invalid module type schema");
            HandlerError::InvalidConfiguration(format!(
                "schema for {} does not compile: {}",
                module.type_id, e
            ))
        })?;

        let instance = serde_json::Value::Object(module.configuration.clone());
        if let Err(errors) = compiled.validate(&instance) {
            let details: Vec<String> = errors.map(|e| e.to_string()).collect();
            return Err(HandlerError::InvalidConfiguration(format!(
                "module {} ({}): {}",
                module.id,
                module.type_id,
                details.join("; ")
            )));
        }

        Ok(())
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
