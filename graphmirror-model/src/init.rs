//! Class-specific initialization.
//!
//! Behavior attached to a class lives in a registry keyed by type id.
//! After `load` resolves an entity's declared types, the store invokes
//! the registered initializer for each of them against the entity.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::entity::Entity;

type InitHandler = Arc<dyn Fn(&Entity) + Send + Sync>;

/// Type-id → initializer lookup.
#[derive(Default)]
pub struct TypeInitRegistry {
    handlers: RwLock<HashMap<String, InitHandler>>,
}

impl TypeInitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an initializer for a class, replacing any previous one.
    pub fn register(&self, type_id: impl Into<String>, handler: impl Fn(&Entity) + Send + Sync + 'static) {
        self.handlers
            .write()
            .unwrap()
            .insert(type_id.into(), Arc::new(handler));
    }

    /// Invokes the initializer registered for `type_id`, if any.
    /// Returns whether one was found.
    pub fn apply(&self, type_id: &str, entity: &Entity) -> bool {
        let handler = self.handlers.read().unwrap().get(type_id).cloned();
        match handler {
            Some(handler) => {
                handler(entity);
                true
            }
            None => false,
        }
    }
}
