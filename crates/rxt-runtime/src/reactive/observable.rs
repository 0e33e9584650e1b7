#![forbid(unsafe_code)]

//! Version-tracked value cell with change notification.
//!
//! `Observable<T>` is the "current value" cell behind strategy selection:
//! writers `set` a value, readers `get` it, and subscribers that ask for
//! replay receive the current value immediately and every change after.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use super::subscription::Subscription;

type Callback<T> = Box<dyn Fn(&T)>;

struct Inner<T> {
    value: T,
    version: u64,
    subscribers: Vec<Weak<Callback<T>>>,
}

/// A shared value with change notification.
///
/// Clones share the same cell.
pub struct Observable<T> {
    inner: Rc<RefCell<Inner<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    /// Create a cell holding `value` at version 0.
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                value,
                version: 0,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Clone out the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.borrow().value.clone()
    }

    /// Replace the value and notify subscribers if it changed.
    ///
    /// Returns whether the value changed.
    pub fn set(&self, value: T) -> bool {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.value == value {
                return false;
            }
            inner.value = value;
            inner.version += 1;
        }
        self.notify();
        true
    }

    /// Number of changes since creation.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Subscribe to future changes.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let strong: Rc<Callback<T>> = Rc::new(Box::new(callback));
        self.inner
            .borrow_mut()
            .subscribers
            .push(Rc::downgrade(&strong));
        Subscription::hold(strong)
    }

    /// Subscribe and immediately receive the current value.
    pub fn subscribe_replay(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let current = self.get();
        callback(&current);
        self.subscribe(callback)
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .borrow()
            .subscribers
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    fn notify(&self) {
        let (value, live) = {
            let mut inner = self.inner.borrow_mut();
            inner.subscribers.retain(|w| w.strong_count() > 0);
            let live: Vec<Rc<Callback<T>>> =
                inner.subscribers.iter().filter_map(Weak::upgrade).collect();
            (inner.value.clone(), live)
        };
        for callback in live {
            callback(&value);
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Observable")
            .field("value", &inner.value)
            .field("version", &inner.version)
            .finish()
    }
}
