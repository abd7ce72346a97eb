//! Explicit change notification for presentation layers.

use crate::ViewState;

/// Handle returned by [`Observers::add`], used to unregister.
pub type ObserverId = u64;

/// A view-change callback.
pub type Callback = Box<dyn FnMut(&ViewState) + Send>;

/// Registry of view-change callbacks.
#[derive(Default)]
pub struct Observers {
    next_id: ObserverId,
    callbacks: Vec<(ObserverId, Callback)>,
}

impl Observers {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback.
    pub fn add(&mut self, callback: Callback) -> ObserverId {
        let id = self.next_id;
        self.next_id += 1;
        self.callbacks.push((id, callback));
        id
    }

    /// Unregister a callback. Returns false if it was not registered.
    pub fn remove(&mut self, id: ObserverId) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|(cid, _)| *cid != id);
        self.callbacks.len() != before
    }

    /// Call every callback in registration order.
    pub fn notify(&mut self, state: &ViewState) {
        for (_, callback) in &mut self.callbacks {
            callback(state);
        }
    }

    /// Drop every callback.
    pub fn clear(&mut self) {
        self.callbacks.clear();
    }

    /// Number of registered callbacks.
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    /// Check if nobody is listening.
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

impl std::fmt::Debug for Observers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers")
            .field("count", &self.callbacks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ResourceQuery;
    use std::sync::{Arc, Mutex};

    #[test]
    fn add_notify_remove() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut observers = Observers::new();

        let sink = Arc::clone(&seen);
        let id = observers.add(Box::new(move |state: &ViewState| {
            sink.lock().unwrap().push(state.revision);
        }));
        assert_eq!(observers.len(), 1);

        let mut state = ViewState::loading(&ResourceQuery::companies());
        state.revision = 3;
        observers.notify(&state);
        assert_eq!(*seen.lock().unwrap(), vec![3]);

        assert!(observers.remove(id));
        assert!(!observers.remove(id));
        assert!(observers.is_empty());

        observers.notify(&state);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn ids_are_not_reused() {
        let mut observers = Observers::new();
        let a = observers.add(Box::new(|_: &ViewState| {}));
        observers.remove(a);
        let b = observers.add(Box::new(|_: &ViewState| {}));
        assert_ne!(a, b);
    }
}
