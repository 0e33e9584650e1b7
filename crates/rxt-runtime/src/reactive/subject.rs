#![forbid(unsafe_code)]

//! Multicast push stream with terminal semantics.
//!
//! A [`Subject`] delivers [`Event`]s to every live observer in subscription
//! order. The first `error` or `complete` closes it: observers receive that
//! terminal event, later pushes are dropped, and observers that subscribe
//! afterwards receive the terminal event immediately.

use std::cell::RefCell;
use std::convert::Infallible;
use std::fmt;
use std::rc::{Rc, Weak};

use super::subscription::Subscription;

/// One event of a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event<T, E> {
    /// A value.
    Next(T),
    /// The stream failed; terminal.
    Error(E),
    /// The stream finished; terminal.
    Complete,
}

impl<T, E> Event<T, E> {
    /// Whether this event closes the stream.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Next(_))
    }
}

type Observer<T, E> = Box<dyn Fn(&Event<T, E>)>;

struct Inner<T, E> {
    observers: Vec<Weak<Observer<T, E>>>,
    terminal: Option<Event<T, E>>,
}

/// A hot, multicast event stream.
///
/// Clones share the same stream.
pub struct Subject<T, E = Infallible> {
    inner: Rc<RefCell<Inner<T, E>>>,
}

impl<T, E> Clone for Subject<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Default for Subject<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Subject<T, E> {
    /// Create an open stream with no observers.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                observers: Vec::new(),
                terminal: None,
            })),
        }
    }

    /// Push a value.
    pub fn next(&self, value: T) {
        self.emit(Event::Next(value));
    }

    /// Fail the stream.
    pub fn error(&self, error: E) {
        self.emit(Event::Error(error));
    }

    /// Complete the stream.
    pub fn complete(&self) {
        self.emit(Event::Complete);
    }

    /// Whether the stream has terminated.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.borrow().terminal.is_some()
    }

    /// Number of live observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.inner
            .borrow()
            .observers
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// Observe all events.
    ///
    /// If the stream already terminated, `observer` receives the terminal
    /// event before this returns and the subscription is closed.
    pub fn subscribe(&self, observer: impl Fn(&Event<T, E>) + 'static) -> Subscription {
        let terminal = self.inner.borrow().terminal.clone();
        if let Some(event) = terminal {
            observer(&event);
            return Subscription::closed();
        }
        let strong: Rc<Observer<T, E>> = Rc::new(Box::new(observer));
        self.inner
            .borrow_mut()
            .observers
            .push(Rc::downgrade(&strong));
        Subscription::hold(strong)
    }

    /// Observe values only.
    pub fn subscribe_next(&self, on_next: impl Fn(&T) + 'static) -> Subscription {
        self.subscribe(move |event| {
            if let Event::Next(value) = event {
                on_next(value);
            }
        })
    }

    fn emit(&self, event: Event<T, E>) {
        let live = {
            let mut inner = self.inner.borrow_mut();
            if inner.terminal.is_some() {
                return;
            }
            if event.is_terminal() {
                inner.terminal = Some(event.clone());
            }
            inner.observers.retain(|w| w.strong_count() > 0);
            if event.is_terminal() {
                std::mem::take(&mut inner.observers)
            } else {
                inner.observers.clone()
            }
        };
        // Upgrade late so an observer released mid-emission is skipped.
        for observer in live.iter().filter_map(Weak::upgrade) {
            observer(&event);
        }
    }
}

impl<T, E> fmt::Debug for Subject<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Subject")
            .field("observers", &inner.observers.len())
            .field("closed", &inner.terminal.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (
        Rc<RefCell<Vec<Event<i32, String>>>>,
        impl Fn(&Event<i32, String>) + 'static,
    ) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = Rc::clone(&log);
        (log, move |e: &Event<i32, String>| l.borrow_mut().push(e.clone()))
    }

    #[test]
    fn delivers_in_order_until_complete() {
        let subject: Subject<i32, String> = Subject::new();
        let (log, observer) = recorder();
        let _sub = subject.subscribe(observer);

        subject.next(1);
        subject.next(2);
        subject.complete();
        subject.next(3);
        subject.error("late".into());

        assert_eq!(
            *log.borrow(),
            [Event::Next(1), Event::Next(2), Event::Complete]
        );
        assert!(subject.is_closed());
    }

    #[test]
    fn late_subscriber_gets_terminal_event() {
        let subject: Subject<i32, String> = Subject::new();
        subject.error("boom".into());
        let (log, observer) = recorder();
        let sub = subject.subscribe(observer);
        assert!(sub.is_closed());
        assert_eq!(*log.borrow(), [Event::Error("boom".into())]);
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let subject: Subject<i32, String> = Subject::new();
        let (log, observer) = recorder();
        let mut sub = subject.subscribe(observer);
        subject.next(1);
        sub.unsubscribe();
        sub.unsubscribe();
        subject.next(2);
        assert_eq!(*log.borrow(), [Event::Next(1)]);
        assert_eq!(subject.observer_count(), 0);
    }

    #[test]
    fn observer_may_push_reentrantly() {
        let subject: Subject<i32> = Subject::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let inner = subject.clone();
        let _sub = subject.subscribe_next(move |v| {
            s.borrow_mut().push(*v);
            if *v == 1 {
                inner.next(2);
            }
        });
        subject.next(1);
        assert_eq!(*seen.borrow(), [1, 2]);
    }
}
