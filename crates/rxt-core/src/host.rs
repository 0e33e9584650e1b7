#![forbid(unsafe_code)]

//! Contracts consumed from the host UI framework.
//!
//! The host owns the view tree and the change-detection primitive. rxt only
//! asks it to insert and remove embedded views, to commit a view, and
//! (optionally) to run work inside its patched execution zone.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for unique anchor IDs.
static ANCHOR_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identity of one anchor point in the view hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnchorId(u64);

impl AnchorId {
    /// Allocate a new process-unique anchor ID.
    pub fn next() -> Self {
        Self(ANCHOR_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    #[inline]
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AnchorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "anchor#{}", self.0)
    }
}

/// The change-detection commit primitive for one view or component.
///
/// Both calls may happen any number of times.
pub trait ChangeDetector {
    /// Process pending UI updates for this target now.
    fn detect_changes(&self);

    /// Mark this target dirty so the host's next pass picks it up.
    fn mark_for_check(&self);
}

impl<D: ChangeDetector + ?Sized> ChangeDetector for Rc<D> {
    fn detect_changes(&self) {
        (**self).detect_changes();
    }

    fn mark_for_check(&self) {
        (**self).mark_for_check();
    }
}

/// View insertion primitive of the host.
///
/// Both operations are synchronous and only touch the view tree.
pub trait ViewContainer {
    /// Renderable fragment definition.
    type Template;
    /// Context record the view's bindings read from.
    type Context;
    /// Handle to an inserted view. Cloning yields another handle to the
    /// same view.
    type View: ChangeDetector + Clone;

    /// Insert a view of `template` bound to `context`.
    fn create_embedded_view(
        &mut self,
        template: &Self::Template,
        context: Rc<RefCell<Self::Context>>,
    ) -> Self::View;

    /// Detach and release `view`.
    fn destroy_view(&mut self, view: Self::View);
}

/// A host execution zone that framework-level change detection observes.
pub trait ExecutionZone {
    /// Run `work` inside the zone.
    fn run(&self, work: &mut dyn FnMut());
}

/// The ambient execution context: runs work directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct AmbientZone;

impl ExecutionZone for AmbientZone {
    fn run(&self, work: &mut dyn FnMut()) {
        work();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn anchor_ids_are_unique_and_increasing() {
        let a = AnchorId::next();
        let b = AnchorId::next();
        assert_ne!(a, b);
        assert!(b.id() > a.id());
        assert!(a.to_string().starts_with("anchor#"));
    }

    #[test]
    fn ambient_zone_runs_inline() {
        let ran = Cell::new(false);
        AmbientZone.run(&mut || ran.set(true));
        assert!(ran.get());
    }

    struct Counter(Cell<u32>, Cell<u32>);

    impl ChangeDetector for Counter {
        fn detect_changes(&self) {
            self.0.set(self.0.get() + 1);
        }

        fn mark_for_check(&self) {
            self.1.set(self.1.get() + 1);
        }
    }

    #[test]
    fn rc_forwards_change_detection() {
        let target = Rc::new(Counter(Cell::new(0), Cell::new(0)));
        let handle: Rc<Counter> = Rc::clone(&target);
        handle.detect_changes();
        handle.mark_for_check();
        handle.mark_for_check();
        assert_eq!(target.0.get(), 1);
        assert_eq!(target.1.get(), 2);
    }
}
