use std::sync::Arc;

use dashmap::DashMap;

use crate::traits::ResourceHandler;

// ---------------------------------------------------------------------------
// HandlerRegistry
// ---------------------------------------------------------------------------

/// Terminal handlers keyed by route operation id (e.g. `"nodes.create"`).
///
/// The route table is declarative; a route is only mounted when its
/// operation has a handler here. Cloning shares the underlying map.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: Arc<DashMap<&'static str, Arc<dyn ResourceHandler>>>,
}

impl HandlerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `operation`, replacing any previous one.
    pub fn register(&self, operation: &'static str, handler: Arc<dyn ResourceHandler>) {
        self.handlers.insert(operation, handler);
    }

    /// Builder-style [`register`](Self::register).
    #[must_use]
    pub fn with(self, operation: &'static str, handler: Arc<dyn ResourceHandler>) -> Self {
        self.register(operation, handler);
        self
    }

    #[must_use]
    pub fn get(&self, operation: &str) -> Option<Arc<dyn ResourceHandler>> {
        self.handlers.get(operation).map(|h| Arc::clone(h.value()))
    }

    #[must_use]
    pub fn contains(&self, operation: &str) -> bool {
        self.handlers.contains_key(operation)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
