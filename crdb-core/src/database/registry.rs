/*
    registry.rs - Insertion-unique plugin table

    Three of these back the database: datatypes, storages and crypto
    methods. Registration happens once during startup; duplicate type
    ids fail and nothing is ever removed at runtime. Concurrent readers
    are admitted, writers exclude readers.
*/

use std::collections::HashMap;
use std::sync::RwLock;

use super::errors::{DatabaseError, DbResult};

/// Thread-safe, append-only mapping of type id to plugin.
pub struct Registry<P> {
    entries: RwLock<HashMap<String, P>>,
}

impl<P: Clone> Registry<P> {
    pub fn new() -> Self {
        Registry {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Register a plugin under its type id. Fails when the id is taken.
    pub fn register(&self, type_id: &str, plugin: P) -> DbResult<()> {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if entries.contains_key(type_id) {
            return Err(DatabaseError::DuplicatePlugin(type_id.to_string()));
        }
        entries.insert(type_id.to_string(), plugin);
        Ok(())
    }

    pub fn get(&self, type_id: &str) -> Option<P> {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(type_id)
            .cloned()
    }

    pub fn contains(&self, type_id: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(type_id)
    }

    /// Registered type ids, sorted for stable enumeration.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }
}

impl<P: Clone> Default for Registry<P> {
    fn default() -> Self {
        Self::new()
    }
}
