use std::sync::{Arc, RwLock};

/// Shared handle to an immutable list that a single writer replaces wholesale.
///
/// Readers take an `Arc` to the current list and keep it for as long as they
/// need; a concurrent `replace` never mutates a list someone is iterating.
pub struct Snapshot<T> {
    current: Arc<RwLock<Arc<[T]>>>,
}

impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Self {
            current: Arc::clone(&self.current),
        }
    }
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<T> Snapshot<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            current: Arc::new(RwLock::new(items.into())),
        }
    }

    pub fn load(&self) -> Arc<[T]> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    pub fn replace(&self, items: Vec<T>) {
        let next: Arc<[T]> = items.into();
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = next;
    }
}
