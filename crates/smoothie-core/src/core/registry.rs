//! Explicit controller registry.
//!
//! spec.md §9 notes the source keeps a process-wide controller registry
//! keyed by connection identity and asks a reimplementation to model that
//! as an explicit registry owned by the engine and passed in, not a
//! singleton. `ControllerRegistry` is that registry: an embedder creates
//! one, inserts controllers as it opens connections, and removes them on
//! disconnect — nothing in `smoothie-core`/`smoothie-comm` reaches for a
//! `static`/`OnceLock` instance of it.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex as AsyncMutex;

use super::ControllerTrait;

/// A live controller, shared so callers can hold a handle while another
/// task drives it through `ControllerTrait`'s `&mut self` methods.
pub type SharedController = Arc<AsyncMutex<dyn ControllerTrait>>;

/// Registry of live controllers keyed by connection identity (serial port
/// path, `host:port`, or any other identifier the embedder assigns).
///
/// Append-only in the sense spec.md §5 describes for its session
/// registry: a slot is inserted, then later removed outright on
/// disconnect — there is no "undefined" tombstone state to model here
/// since `HashMap::remove` already drops the entry atomically under the
/// write lock.
#[derive(Default)]
pub struct ControllerRegistry {
    controllers: RwLock<HashMap<String, SharedController>>,
}

impl ControllerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a controller under `id`, replacing any prior controller
    /// registered under the same identity.
    pub fn insert(&self, id: impl Into<String>, controller: SharedController) {
        self.controllers.write().insert(id.into(), controller);
    }

    /// Look up a controller by identity.
    pub fn get(&self, id: &str) -> Option<SharedController> {
        self.controllers.read().get(id).cloned()
    }

    /// Remove and return a controller by identity, e.g. on disconnect or
    /// transport failure.
    pub fn remove(&self, id: &str) -> Option<SharedController> {
        self.controllers.write().remove(id)
    }

    /// Identities of all currently registered controllers.
    pub fn ids(&self) -> Vec<String> {
        self.controllers.read().keys().cloned().collect()
    }

    /// Number of currently registered controllers.
    pub fn len(&self) -> usize {
        self.controllers.read().len()
    }

    /// Whether the registry currently holds no controllers.
    pub fn is_empty(&self) -> bool {
        self.controllers.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SimpleController;

    #[tokio::test]
    async fn insert_get_remove_roundtrip() {
        let registry = ControllerRegistry::new();
        let controller: SharedController = Arc::new(AsyncMutex::new(SimpleController::new("a")));
        registry.insert("/dev/ttyUSB0", controller);

        assert_eq!(registry.len(), 1);
        assert!(registry.get("/dev/ttyUSB0").is_some());
        assert!(registry.get("/dev/ttyUSB1").is_none());

        let removed = registry.remove("/dev/ttyUSB0");
        assert!(removed.is_some());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn insert_replaces_existing_identity() {
        let registry = ControllerRegistry::new();
        registry.insert(
            "host:23",
            Arc::new(AsyncMutex::new(SimpleController::new("first"))),
        );
        registry.insert(
            "host:23",
            Arc::new(AsyncMutex::new(SimpleController::new("second"))),
        );
        assert_eq!(registry.len(), 1);
        let controller = registry.get("host:23").unwrap();
        assert_eq!(controller.lock().await.name(), "second");
    }
}
