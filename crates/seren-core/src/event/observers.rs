// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Owned observer lists replacing ambient language events.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Identifies a listener registered on an [`Observers`] list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// A list of listeners owned by the component that emits `E`.
///
/// Listeners are invoked synchronously in registration order. A listener that
/// panics is logged and skipped; the remaining listeners still run.
pub struct Observers<E> {
    listeners: RwLock<Vec<(ObserverId, Listener<E>)>>,
    next_id: AtomicU64,
}

impl<E> Observers<E> {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Appends a listener and returns the id used to remove it later.
    pub fn subscribe(&self, listener: impl Fn(&E) + Send + Sync + 'static) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));
        id
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Returns the number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true if nobody listens.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invokes every listener with `event`.
    ///
    /// The list is snapshotted first, so listeners may subscribe or unsubscribe
    /// from inside the callback. Returns the number of listeners that panicked.
    pub fn notify(&self, event: &E) -> usize {
        let snapshot: Vec<Listener<E>> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        let mut failures = 0;
        for listener in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                failures += 1;
                log::error!("An observer panicked while handling a notification; skipping it.");
            }
        }
        failures
    }
}

impl<E> Default for Observers<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Observers<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("listeners", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn listeners_run_in_registration_order() {
        let observers = Observers::<u32>::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let log = Arc::clone(&log);
            observers.subscribe(move |value: &u32| log.lock().unwrap().push((tag, *value)));
        }

        observers.notify(&7);

        assert_eq!(
            *log.lock().unwrap(),
            vec![("first", 7), ("second", 7), ("third", 7)]
        );
    }

    #[test]
    fn panicking_listener_does_not_stop_the_others() {
        let observers = Observers::<()>::new();
        let hits = Arc::new(Mutex::new(0));
        observers.subscribe(|_| panic!("listener failure"));
        let counter = Arc::clone(&hits);
        observers.subscribe(move |_| *counter.lock().unwrap() += 1);

        assert_eq!(observers.notify(&()), 1);
        assert_eq!(*hits.lock().unwrap(), 1);
    }

    #[test]
    fn unsubscribe_removes_only_that_listener() {
        let observers = Observers::<()>::new();
        let a = observers.subscribe(|_| {});
        let _b = observers.subscribe(|_| {});

        assert!(observers.unsubscribe(a));
        assert!(!observers.unsubscribe(a));
        assert_eq!(observers.len(), 1);
    }
}
