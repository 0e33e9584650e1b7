#![forbid(unsafe_code)]

//! The "current strategy name" of an anchor.
//!
//! A [`StrategySelection`] starts from a static name and can merge any
//! number of dynamic name streams. Whichever input produced a name most
//! recently wins. New subscribers receive the current name immediately, then
//! every change.
//!
//! # Invariants
//!
//! 1. `current()` is always the most recently supplied name.
//! 2. Subscribers see each change once, in order; re-supplying the current
//!    name is not a change.
//! 3. Dropping the selection (or calling `clear_sources`) stops listening to
//!    every merged stream.

use std::fmt;

use crate::reactive::{Event, Observable, Subject, Subscription, SubscriptionScope};

/// Latest-wins cell over static and dynamic strategy names.
pub struct StrategySelection {
    current: Observable<String>,
    sources: SubscriptionScope,
}

impl StrategySelection {
    /// Start with `initial` as the current name.
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            current: Observable::new(initial.into()),
            sources: SubscriptionScope::new(),
        }
    }

    /// The current strategy name.
    #[must_use]
    pub fn current(&self) -> String {
        self.current.get()
    }

    /// Replace the current name with a static one.
    pub fn set(&self, name: impl Into<String>) {
        let name = name.into();
        if self.current.set(name.clone()) {
            tracing::debug!(strategy = %name, "strategy selected");
        }
    }

    /// Merge a dynamic source; each name it emits becomes current.
    ///
    /// Errors and completion of the source end its contribution without
    /// touching the current name.
    pub fn merge(&mut self, source: &Subject<String>) {
        let cell = self.current.clone();
        self.sources.listen(source, move |event| {
            if let Event::Next(name) = event
                && cell.set(name.clone())
            {
                tracing::debug!(strategy = %name, "strategy selected");
            }
        });
    }

    /// Observe the current name (replayed on subscribe) and its changes.
    pub fn subscribe(&self, callback: impl Fn(&str) + 'static) -> Subscription {
        self.current.subscribe_replay(move |name: &String| callback(name))
    }

    /// Number of changes so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.current.version()
    }

    /// Number of merged dynamic sources still held.
    #[must_use]
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Stop listening to all merged sources; the current name stays.
    pub fn clear_sources(&mut self) {
        self.sources.clear();
    }
}

impl fmt::Debug for StrategySelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategySelection")
            .field("current", &self.current())
            .field("sources", &self.sources.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn collect(selection: &StrategySelection) -> (Rc<RefCell<Vec<String>>>, Subscription) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let sub = selection.subscribe(move |name| s.borrow_mut().push(name.to_string()));
        (seen, sub)
    }

    #[test]
    fn late_subscriber_gets_current() {
        let selection = StrategySelection::new("normal");
        selection.set("local");
        let (seen, _sub) = collect(&selection);
        assert_eq!(*seen.borrow(), ["local"]);
    }

    #[test]
    fn latest_source_wins() {
        let mut selection = StrategySelection::new("normal");
        let a: Subject<String> = Subject::new();
        let b: Subject<String> = Subject::new();
        selection.merge(&a);
        selection.merge(&b);
        let (seen, _sub) = collect(&selection);

        a.next("low".into());
        b.next("idle".into());
        a.next("immediate".into());
        assert_eq!(selection.current(), "immediate");

        selection.set("local");
        assert_eq!(*seen.borrow(), ["normal", "low", "idle", "immediate", "local"]);
    }

    #[test]
    fn repeated_name_is_not_a_change() {
        let selection = StrategySelection::new("normal");
        let (seen, _sub) = collect(&selection);
        selection.set("normal");
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(selection.version(), 0);
    }

    #[test]
    fn completed_source_keeps_current() {
        let mut selection = StrategySelection::new("normal");
        let source: Subject<String> = Subject::new();
        selection.merge(&source);
        source.next("low".into());
        source.complete();
        assert_eq!(selection.current(), "low");
    }

    #[test]
    fn clear_sources_stops_merging() {
        let mut selection = StrategySelection::new("normal");
        let source: Subject<String> = Subject::new();
        selection.merge(&source);
        assert_eq!(selection.source_count(), 1);
        selection.clear_sources();
        source.next("low".into());
        assert_eq!(selection.current(), "normal");
    }
}
