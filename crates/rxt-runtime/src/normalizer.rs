#![forbid(unsafe_code)]

//! Turns a bound source into an ordered sequence of [`Notification`]s.
//!
//! # Invariants
//!
//! 1. Exactly one `Suspense` is delivered, synchronously, before anything else.
//! 2. Every source event maps to exactly one notification, in arrival order.
//! 3. After `Error` or `Complete` nothing more is delivered for that source.

use std::cell::Cell;
use std::rc::Rc;

use rxt_core::Notification;

use crate::reactive::{Event, Subject, Subscription};

/// What a directive can be bound to.
pub enum Input<T, E> {
    /// A plain value; behaves like a source that emits it once.
    Value(T),
    /// An event stream.
    Stream(Subject<T, E>),
}

impl<T, E> From<Subject<T, E>> for Input<T, E> {
    fn from(source: Subject<T, E>) -> Self {
        Self::Stream(source)
    }
}

/// Map one stream event onto its notification.
pub fn notification_of<T: Clone, E: Clone>(event: &Event<T, E>) -> Notification<T, E> {
    match event {
        Event::Next(value) => Notification::next(value.clone()),
        Event::Error(err) => Notification::error(err.clone()),
        Event::Complete => Notification::complete(),
    }
}

/// Subscribe to `source`, delivering normalized notifications to `sink`.
///
/// Dropping the returned subscription stops delivery.
pub fn materialize<T, E>(
    source: &Subject<T, E>,
    sink: impl Fn(Notification<T, E>) + 'static,
) -> Subscription
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    sink(Notification::suspense());
    let finished = Rc::new(Cell::new(false));
    source.subscribe(move |event| {
        if finished.get() {
            return;
        }
        if event.is_terminal() {
            finished.set(true);
        }
        sink(notification_of(event));
    })
}

/// Normalize any [`Input`].
///
/// A plain value yields `Suspense` then `Next(value)`; the source stays open.
pub fn materialize_input<T, E>(
    input: Input<T, E>,
    sink: impl Fn(Notification<T, E>) + 'static,
) -> Subscription
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    match input {
        Input::Stream(source) => materialize(&source, sink),
        Input::Value(value) => {
            sink(Notification::suspense());
            sink(Notification::next(value));
            Subscription::closed()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rxt_core::NotificationKind;
    use std::cell::RefCell;

    type Log = Rc<RefCell<Vec<Notification<i32, String>>>>;

    fn sink() -> (Log, impl Fn(Notification<i32, String>) + 'static) {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let l = Rc::clone(&log);
        (log, move |n| l.borrow_mut().push(n))
    }

    fn kinds(log: &Log) -> Vec<NotificationKind> {
        log.borrow().iter().map(Notification::kind).collect()
    }

    #[test]
    fn suspense_comes_first_and_synchronously() {
        let source: Subject<i32, String> = Subject::new();
        let (log, sink) = sink();
        let _sub = materialize(&source, sink);
        assert_eq!(kinds(&log), [NotificationKind::Suspense]);

        source.next(1);
        source.next(2);
        assert_eq!(
            kinds(&log),
            [
                NotificationKind::Suspense,
                NotificationKind::Next,
                NotificationKind::Next
            ]
        );
        assert_eq!(log.borrow()[2].value(), Some(&2));
    }

    #[test]
    fn empty_then_complete() {
        let source: Subject<i32, String> = Subject::new();
        let (log, sink) = sink();
        let _sub = materialize(&source, sink);
        source.complete();
        assert_eq!(
            kinds(&log),
            [NotificationKind::Suspense, NotificationKind::Complete]
        );
    }

    #[test]
    fn error_is_last() {
        let source: Subject<i32, String> = Subject::new();
        let (log, sink) = sink();
        let _sub = materialize(&source, sink);
        source.next(1);
        source.error("down".into());
        source.next(2);
        source.complete();
        assert_eq!(
            kinds(&log),
            [
                NotificationKind::Suspense,
                NotificationKind::Next,
                NotificationKind::Error
            ]
        );
        assert_eq!(
            log.borrow()[2].error_value().map(String::as_str),
            Some("down")
        );
    }

    #[test]
    fn already_closed_source_still_gets_suspense_first() {
        let source: Subject<i32, String> = Subject::new();
        source.complete();
        let (log, sink) = sink();
        let _sub = materialize(&source, sink);
        assert_eq!(
            kinds(&log),
            [NotificationKind::Suspense, NotificationKind::Complete]
        );
    }

    #[test]
    fn plain_value_is_suspense_then_next() {
        let (log, sink) = sink();
        let sub = materialize_input(Input::Value(5), sink);
        assert!(sub.is_closed());
        assert_eq!(
            kinds(&log),
            [NotificationKind::Suspense, NotificationKind::Next]
        );
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let source: Subject<i32, String> = Subject::new();
        let (log, sink) = sink();
        let mut sub = materialize(&source, sink);
        sub.unsubscribe();
        source.next(1);
        assert_eq!(kinds(&log), [NotificationKind::Suspense]);
    }
}
