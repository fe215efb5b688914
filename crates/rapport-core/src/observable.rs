//! Minimal reactive value capability.
//!
//! The trust layer only depends on [`Observable`]; the concrete push mechanism
//! (database live queries, relay subscriptions, ...) is supplied by the
//! embedding application. [`ObservableValue`] is the in-process implementation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A value that can be read and watched for changes.
pub trait Observable<T>: Send + Sync {
    /// Current value.
    fn get_value(&self) -> T;

    /// Register a callback invoked with every new value.
    fn subscribe(&self, callback: Box<dyn Fn(&T) + Send + Sync>) -> Subscription;
}

/// Handle returned by [`Observable::subscribe`].
///
/// Dropping the handle keeps the callback registered; call
/// [`Subscription::unsubscribe`] to remove it.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A subscription with nothing to cancel.
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

struct Inner<T> {
    value: RwLock<T>,
    subscribers: Mutex<Vec<(u64, Callback<T>)>>,
    next_id: AtomicU64,
}

/// Shared, clonable observable cell.
pub struct ObservableValue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for ObservableValue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> ObservableValue<T> {
    pub fn new(initial: T) -> Self {
        Self {
            inner: Arc::new(Inner {
                value: RwLock::new(initial),
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Replace the value and notify subscribers.
    pub fn set(&self, value: T) {
        {
            let mut guard = self.inner.value.write().unwrap_or_else(|e| e.into_inner());
            *guard = value.clone();
        }
        self.notify(&value);
    }

    /// Modify the value in place and notify subscribers.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let snapshot = {
            let mut guard = self.inner.value.write().unwrap_or_else(|e| e.into_inner());
            f(&mut guard);
            guard.clone()
        };
        self.notify(&snapshot);
    }

    /// Number of registered callbacks.
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    fn notify(&self, value: &T) {
        // Callbacks run outside the lock so they may subscribe or unsubscribe.
        let callbacks: Vec<Callback<T>> = self
            .inner
            .subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for callback in callbacks {
            callback(value);
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Observable<T> for ObservableValue<T> {
    fn get_value(&self) -> T {
        self.inner
            .value
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn subscribe(&self, callback: Box<dyn Fn(&T) + Send + Sync>) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, Arc::from(callback)));

        let weak = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner
                    .subscribers
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .retain(|(sub_id, _)| *sub_id != id);
            }
        })
    }
}

impl<T: Clone + Send + Sync + Default + 'static> Default for ObservableValue<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
