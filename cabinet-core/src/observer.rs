// SPDX-License-Identifier: LGPL-3.0-only
//! Synchronous observer lists for change notification.
//!
//! Observers are dispatched in registration order, on the caller's context.
//! There is no queueing: `emit` returns after every callback has run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Handle returned by [`ObserverList::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// A list of callbacks observing events of type `E`.
pub struct ObserverList<E> {
    observers: Mutex<Vec<(ObserverId, Callback<E>)>>,
    next_id: AtomicU64,
}

impl<E> ObserverList<E> {
    pub fn new() -> Self {
        Self {
            observers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a callback. Callbacks run in registration order.
    pub fn subscribe<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers
            .lock()
            .unwrap()
            .push((id, Arc::new(callback)));
        id
    }

    /// Remove a previously registered callback.
    ///
    /// Returns `false` if the id was not (or no longer) registered.
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.lock().unwrap();
        let before = observers.len();
        observers.retain(|(oid, _)| *oid != id);
        observers.len() != before
    }

    /// Dispatch `event` to every observer, in registration order.
    ///
    /// The internal lock is released before callbacks run, so observers may
    /// subscribe or unsubscribe from within a callback.
    pub fn emit(&self, event: &E) {
        let snapshot: Vec<Callback<E>> = self
            .observers
            .lock()
            .unwrap()
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for callback in snapshot {
            callback(event);
        }
    }

    pub fn len(&self) -> usize {
        self.observers.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E> Default for ObserverList<E> {
    fn default() -> Self {
        Self::new()
    }
}
