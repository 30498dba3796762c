//! Attribute translation: short integer IDs standing in for frequently used object keys.
//!
//! A translator is handed explicitly to the [`Builder`](crate::Builder) (which writes known keys
//! as their ID) and to a [`Slice`](crate::Slice) (which turns IDs back into key names). Nothing
//! here is global.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

/// Two-way mapping between object key names and integer IDs.
pub trait AttributeTranslator: Send + Sync {
    /// The ID registered for `key`, if any.
    fn string_to_id(&self, key: &str) -> Option<u64>;
    /// The key name registered for `id`, if any.
    fn id_to_string(&self, id: u64) -> Option<Arc<str>>;
}

#[derive(Default)]
struct Maps {
    id_to_string: HashMap<u64, Arc<str>>,
    string_to_id: HashMap<Arc<str>, u64>,
}

/// Map-based [`AttributeTranslator`] that may be shared between threads and added to at any
/// time.
#[derive(Default)]
pub struct AttributeIdTranslator {
    maps: RwLock<Maps>,
}

impl AttributeIdTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `key` under `id`. Re-registering a key or an ID replaces the old mapping.
    pub fn add(&self, key: &str, id: u64) {
        let name: Arc<str> = Arc::from(key);
        let mut maps = self.maps.write();
        if let Some(old) = maps.id_to_string.insert(id, name.clone()) {
            maps.string_to_id.remove(&old);
        }
        if let Some(old_id) = maps.string_to_id.insert(name, id) {
            if old_id != id {
                maps.id_to_string.remove(&old_id);
            }
        }
        debug!(key, id, "registered attribute translation");
    }

    pub fn len(&self) -> usize {
        self.maps.read().id_to_string.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AttributeTranslator for AttributeIdTranslator {
    fn string_to_id(&self, key: &str) -> Option<u64> {
        self.maps.read().string_to_id.get(key).copied()
    }

    fn id_to_string(&self, id: u64) -> Option<Arc<str>> {
        self.maps.read().id_to_string.get(&id).cloned()
    }
}

impl std::fmt::Debug for AttributeIdTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("AttributeIdTranslator")
            .field("entries", &self.len())
            .finish()
    }
}
