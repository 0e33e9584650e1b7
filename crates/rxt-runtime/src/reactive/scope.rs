#![forbid(unsafe_code)]

//! Lifecycle owner for a group of subscriptions.
//!
//! An anchor collects every subscription it opens (source, strategy sources,
//! render callbacks) in one [`SubscriptionScope`]. Clearing or dropping the
//! scope disconnects all of them.
//!
//! # Invariants
//!
//! 1. Subscriptions are released in reverse registration order.
//! 2. After `clear()` or drop, no callback held by this scope fires.
//! 3. `clear()` leaves the scope empty but reusable.

use std::fmt;

use super::observable::Observable;
use super::subject::{Event, Subject};
use super::subscription::Subscription;

/// Collects subscriptions for one logical owner.
#[derive(Default)]
pub struct SubscriptionScope {
    subscriptions: Vec<Subscription>,
}

impl SubscriptionScope {
    /// Create an empty scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `sub` alive until the scope is cleared or dropped.
    pub fn hold(&mut self, sub: Subscription) {
        self.subscriptions.push(sub);
    }

    /// Subscribe to an observable within this scope.
    pub fn watch<T: Clone + PartialEq + 'static>(
        &mut self,
        source: &Observable<T>,
        callback: impl Fn(&T) + 'static,
    ) -> &mut Self {
        let sub = source.subscribe(callback);
        self.subscriptions.push(sub);
        self
    }

    /// Subscribe to a stream within this scope.
    pub fn listen<T: Clone + 'static, E: Clone + 'static>(
        &mut self,
        source: &Subject<T, E>,
        observer: impl Fn(&Event<T, E>) + 'static,
    ) -> &mut Self {
        let sub = source.subscribe(observer);
        self.subscriptions.push(sub);
        self
    }

    /// Number of held subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether nothing is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Release everything now, newest first.
    pub fn clear(&mut self) {
        while let Some(mut sub) = self.subscriptions.pop() {
            sub.unsubscribe();
        }
    }
}

impl Drop for SubscriptionScope {
    fn drop(&mut self) {
        self.clear();
    }
}

impl fmt::Debug for SubscriptionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionScope")
            .field("subscription_count", &self.subscriptions.len())
            .finish()
    }
}
