//! Observer registration and in-order notification.
//!
//! Real-time consumers (host-application entities) subscribe a callback per
//! device and are notified synchronously, in registration order, whenever a
//! push delta has been merged. Notification happens while the device's
//! exclusion scope is held: callbacks must be cheap, non-blocking signals
//! and must never call back into the device synchronously (that would
//! deadlock).

use std::sync::{Arc, Mutex};

/// What triggered a state mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateSource {
    /// Scheduled snapshot poll.
    Poll,
    /// Push delta from the message channel.
    Push,
}

/// Notification payload handed to observers.
///
/// Deliberately small: observers read derived accessors on demand instead
/// of receiving a state snapshot.
#[derive(Debug, Clone)]
pub struct DeviceUpdate {
    /// The mutated device.
    pub device_id: String,
    /// Which channel produced the mutation.
    pub source: UpdateSource,
}

/// Callback invoked on device updates.
pub type ObserverFn = Box<dyn Fn(&DeviceUpdate) + Send + Sync>;

/// Handle returned by [`ObserverList::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionHandle(u64);

/// Ordered list of observers for one device.
///
/// `notify` iterates a snapshot of the current subscribers, so a callback
/// may subscribe or unsubscribe without deadlocking; the change takes
/// effect from the next notification.
#[derive(Default)]
pub struct ObserverList {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    observers: Vec<(u64, Arc<ObserverFn>)>,
}

impl ObserverList {
    /// Create an empty observer list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback; callbacks fire in registration order.
    pub fn subscribe(&self, callback: impl Fn(&DeviceUpdate) + Send + Sync + 'static) -> SubscriptionHandle {
        let mut inner = self.inner.lock().expect("observer lock poisoned");
        let id = inner.next_id;
        inner.next_id += 1;
        inner.observers.push((id, Arc::new(Box::new(callback))));
        SubscriptionHandle(id)
    }

    /// Remove a previously registered callback.
    ///
    /// Unknown handles are ignored, so double-unsubscribe is harmless.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) {
        let mut inner = self.inner.lock().expect("observer lock poisoned");
        inner.observers.retain(|(id, _)| *id != handle.0);
    }

    /// Number of registered observers.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("observer lock poisoned").observers.len()
    }

    /// True if nothing is subscribed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every observer with `update`, in registration order.
    pub fn notify(&self, update: &DeviceUpdate) {
        let snapshot: Vec<Arc<ObserverFn>> = {
            let inner = self.inner.lock().expect("observer lock poisoned");
            inner.observers.iter().map(|(_, cb)| Arc::clone(cb)).collect()
        };
        for callback in snapshot {
            callback(update);
        }
    }
}

impl std::fmt::Debug for ObserverList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverList")
            .field("observers", &self.len())
            .finish()
    }
}
