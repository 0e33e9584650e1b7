#![forbid(unsafe_code)]

//! Per-anchor commit scheduling with coalescing.
//!
//! A [`RenderCoordinator`] owns one commit slot for its anchor. Asking for a
//! commit stores the work in the slot and, unless a run is already queued,
//! schedules one through the selected strategy. A request that arrives
//! before the queued run fires replaces the stored work; the queued run then
//! executes only the latest request.
//!
//! # Invariants
//!
//! 1. At most one queued run per anchor.
//! 2. Exactly one `rendered` event per executed commit, none for a request
//!    that was replaced before it ran.
//! 3. Commits execute in request order; replaced requests are skipped, never
//!    reordered.
//! 4. Nothing executes after [`RenderCoordinator::teardown`].
//!
//! # Failure Modes
//!
//! | Condition | Behavior |
//! |-----------|----------|
//! | Unknown strategy name | Reported once via the error handler; primary strategy used |
//! | Strategy timing changes while a run is queued | Queued run cancelled, new one scheduled |
//! | Commit requested after teardown | Ignored, returns `false` |

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use rxt_core::{AnchorId, ErrorHandler, ExecutionZone, RenderError};

use crate::reactive::Subject;
use crate::scheduler::{Scheduler, TaskHandle, Timing};
use crate::strategy::{StrategyDescriptor, StrategyRegistry};

/// Deferred commit work; returns the payload for the `rendered` event.
type CommitWork<P> = Box<dyn FnOnce(&StrategyDescriptor) -> Option<P>>;

/// Commit counters for one anchor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitStats {
    /// Commit requests accepted.
    pub scheduled: u64,
    /// Requests replaced by a later one before running.
    pub coalesced: u64,
    /// Commits that actually ran.
    pub executed: u64,
}

struct CommitSlot<P> {
    pending: Option<(Arc<StrategyDescriptor>, CommitWork<P>)>,
    task: Option<(Timing, TaskHandle)>,
    closed: bool,
    stats: CommitStats,
}

impl<P> Default for CommitSlot<P> {
    fn default() -> Self {
        Self {
            pending: None,
            task: None,
            closed: false,
            stats: CommitStats::default(),
        }
    }
}

struct Inner<P> {
    anchor: AnchorId,
    slot: RefCell<CommitSlot<P>>,
    zone: Option<Rc<dyn ExecutionZone>>,
    rendered: Subject<P>,
}

impl<P: Clone + 'static> Inner<P> {
    fn run_pending(&self) {
        let taken = {
            let mut slot = self.slot.borrow_mut();
            slot.task = None;
            if slot.closed {
                None
            } else {
                slot.pending.take()
            }
        };
        let Some((descriptor, work)) = taken else {
            return;
        };

        let mut work = Some(work);
        let mut output = None;
        let mut run = || {
            if let Some(work) = work.take() {
                output = work(&descriptor);
            }
        };
        match &self.zone {
            Some(zone) => zone.run(&mut run),
            None => run(),
        }

        self.slot.borrow_mut().stats.executed += 1;
        tracing::trace!(anchor = %self.anchor, strategy = descriptor.name(), "commit executed");
        if let Some(payload) = output {
            self.rendered.next(payload);
        }
    }
}

/// Commit scheduler for one anchor.
pub struct RenderCoordinator<P: Clone + 'static> {
    inner: Rc<Inner<P>>,
    scheduler: Scheduler,
    registry: StrategyRegistry,
    errors: Rc<dyn ErrorHandler>,
    reported_unknown: RefCell<Option<String>>,
}

impl<P: Clone + 'static> RenderCoordinator<P> {
    /// Create a coordinator for `anchor`.
    ///
    /// With a `zone`, every commit runs inside it.
    pub fn new(
        anchor: AnchorId,
        scheduler: Scheduler,
        registry: StrategyRegistry,
        errors: Rc<dyn ErrorHandler>,
        zone: Option<Rc<dyn ExecutionZone>>,
    ) -> Self {
        Self {
            inner: Rc::new(Inner {
                anchor,
                slot: RefCell::new(CommitSlot::default()),
                zone,
                rendered: Subject::new(),
            }),
            scheduler,
            registry,
            errors,
            reported_unknown: RefCell::new(None),
        }
    }

    /// The anchor this coordinator commits for.
    pub fn anchor(&self) -> AnchorId {
        self.inner.anchor
    }

    /// Emits one payload per executed commit; completes on teardown.
    pub fn rendered(&self) -> Subject<P> {
        self.inner.rendered.clone()
    }

    /// Request a commit under `strategy` (`None` means the primary).
    ///
    /// Returns `false` once torn down.
    pub fn schedule_commit(
        &self,
        strategy: Option<&str>,
        work: impl FnOnce(&StrategyDescriptor) -> Option<P> + 'static,
    ) -> bool {
        let resolution = self.registry.resolve(strategy);
        if let Some(err) = resolution.error {
            self.report_unknown(err);
        }
        let descriptor = resolution.descriptor;

        let stale = {
            let mut slot = self.inner.slot.borrow_mut();
            if slot.closed {
                return false;
            }
            slot.stats.scheduled += 1;
            if slot
                .pending
                .replace((Arc::clone(&descriptor), Box::new(work)))
                .is_some()
            {
                slot.stats.coalesced += 1;
                tracing::trace!(anchor = %self.inner.anchor, "commit coalesced");
            }

            let queued = slot
                .task
                .as_ref()
                .is_some_and(|(timing, handle)| handle.is_pending() && *timing == descriptor.timing());
            if queued {
                return true;
            }
            slot.task.take()
        };
        if let Some((_, handle)) = stale {
            handle.cancel();
        }

        if descriptor.is_sync() {
            self.inner.run_pending();
            return true;
        }

        let weak: Weak<Inner<P>> = Rc::downgrade(&self.inner);
        let handle = descriptor.schedule(&self.scheduler, move || {
            if let Some(inner) = weak.upgrade() {
                inner.run_pending();
            }
        });
        tracing::trace!(
            anchor = %self.inner.anchor,
            strategy = descriptor.name(),
            "commit scheduled"
        );
        let mut slot = self.inner.slot.borrow_mut();
        if !slot.closed && handle.is_pending() {
            slot.task = Some((descriptor.timing(), handle));
        }
        true
    }

    /// Whether a commit is waiting to run.
    pub fn has_pending(&self) -> bool {
        self.inner.slot.borrow().pending.is_some()
    }

    /// Drop the waiting commit, if any, without closing the coordinator.
    pub fn cancel_pending(&self) {
        let task = {
            let mut slot = self.inner.slot.borrow_mut();
            slot.pending = None;
            slot.task.take()
        };
        if let Some((_, handle)) = task {
            handle.cancel();
        }
    }

    /// Commit counters so far.
    pub fn stats(&self) -> CommitStats {
        self.inner.slot.borrow().stats
    }

    /// Whether [`teardown`](Self::teardown) has run.
    pub fn is_closed(&self) -> bool {
        self.inner.slot.borrow().closed
    }

    /// Cancel pending work and complete `rendered`. Idempotent.
    pub fn teardown(&self) {
        let task = {
            let mut slot = self.inner.slot.borrow_mut();
            if slot.closed {
                return;
            }
            slot.closed = true;
            slot.pending = None;
            slot.task.take()
        };
        if let Some((_, handle)) = task {
            handle.cancel();
        }
        tracing::debug!(anchor = %self.inner.anchor, "coordinator torn down");
        self.inner.rendered.complete();
    }

    fn report_unknown(&self, err: RenderError) {
        let RenderError::UnknownStrategy { requested, .. } = &err else {
            self.errors.handle_error(&err);
            return;
        };
        let mut last = self.reported_unknown.borrow_mut();
        if last.as_deref() == Some(requested.as_str()) {
            return;
        }
        *last = Some(requested.clone());
        drop(last);
        self.errors.handle_error(&err);
    }
}

impl<P: Clone + 'static> Drop for RenderCoordinator<P> {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl<P: Clone + 'static> fmt::Debug for RenderCoordinator<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.inner.slot.borrow();
        f.debug_struct("RenderCoordinator")
            .field("anchor", &self.inner.anchor)
            .field("pending", &slot.pending.is_some())
            .field("closed", &slot.closed)
            .field("stats", &slot.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Subscription;
    use std::cell::Cell;

    struct Fixture {
        scheduler: Scheduler,
        registry: StrategyRegistry,
        errors: Rc<RefCell<Vec<RenderError>>>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                scheduler: Scheduler::new(Default::default()),
                registry: StrategyRegistry::with_builtins(),
                errors: Rc::new(RefCell::new(Vec::new())),
            }
        }

        fn coordinator(&self) -> RenderCoordinator<i32> {
            self.coordinator_in(None)
        }

        fn coordinator_in(&self, zone: Option<Rc<dyn ExecutionZone>>) -> RenderCoordinator<i32> {
            let sink = Rc::clone(&self.errors);
            let errors: Rc<dyn ErrorHandler> =
                Rc::new(move |err: &RenderError| sink.borrow_mut().push(err.clone()));
            RenderCoordinator::new(
                AnchorId::next(),
                self.scheduler.clone(),
                self.registry.clone(),
                errors,
                zone,
            )
        }
    }

    fn record(c: &RenderCoordinator<i32>) -> (Rc<RefCell<Vec<i32>>>, Subscription) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let sub = c.rendered().subscribe_next(move |v| s.borrow_mut().push(*v));
        (seen, sub)
    }

    #[test]
    fn sync_strategy_commits_inline() {
        let fx = Fixture::new();
        let c = fx.coordinator();
        let (seen, _sub) = record(&c);
        assert!(c.schedule_commit(Some("sync"), |_| Some(1)));
        assert_eq!(*seen.borrow(), [1]);
        assert!(!c.has_pending());
    }

    #[test]
    fn deferred_commits_coalesce_to_latest() {
        let fx = Fixture::new();
        let c = fx.coordinator();
        let (seen, _sub) = record(&c);
        for v in 1..=5 {
            c.schedule_commit(Some("microtask"), move |_| Some(v));
        }
        assert!(seen.borrow().is_empty());
        fx.scheduler.run_microtasks();
        assert_eq!(*seen.borrow(), [5]);
        assert_eq!(
            c.stats(),
            CommitStats {
                scheduled: 5,
                coalesced: 4,
                executed: 1
            }
        );
    }

    #[test]
    fn commit_receives_resolved_descriptor() {
        let fx = Fixture::new();
        let c = fx.coordinator();
        let name = Rc::new(RefCell::new(String::new()));
        let n = Rc::clone(&name);
        c.schedule_commit(Some("local"), move |d| {
            *n.borrow_mut() = d.name().to_string();
            None
        });
        fx.scheduler.run_frame();
        assert_eq!(*name.borrow(), "local");
    }

    #[test]
    fn unknown_strategy_reported_once_and_primary_used() {
        let fx = Fixture::new();
        let c = fx.coordinator();
        let (seen, _sub) = record(&c);
        c.schedule_commit(Some("warp"), |_| Some(1));
        c.schedule_commit(Some("warp"), |_| Some(2));
        assert_eq!(fx.errors.borrow().len(), 1);
        assert!(seen.borrow().is_empty());
        fx.scheduler.run_until_idle();
        assert_eq!(*seen.borrow(), [2]);
    }

    #[test]
    fn switching_to_sync_flushes_and_cancels_queued_run() {
        let fx = Fixture::new();
        let c = fx.coordinator();
        let (seen, _sub) = record(&c);
        c.schedule_commit(Some("low"), |_| Some(1));
        c.schedule_commit(Some("sync"), |_| Some(2));
        assert_eq!(*seen.borrow(), [2]);
        fx.scheduler.run_until_idle();
        assert_eq!(*seen.borrow(), [2]);
        assert_eq!(c.stats().executed, 1);
    }

    #[test]
    fn timing_change_reschedules() {
        let fx = Fixture::new();
        let c = fx.coordinator();
        let (seen, _sub) = record(&c);
        c.schedule_commit(Some("idle"), |_| Some(1));
        c.schedule_commit(Some("microtask"), |_| Some(2));
        fx.scheduler.run_microtasks();
        assert_eq!(*seen.borrow(), [2]);
        fx.scheduler.run_until_idle();
        assert_eq!(*seen.borrow(), [2]);
    }

    #[test]
    fn teardown_cancels_and_is_idempotent() {
        let fx = Fixture::new();
        let c = fx.coordinator();
        let (seen, _sub) = record(&c);
        let completed = Rc::new(Cell::new(0));
        let done = Rc::clone(&completed);
        let _end = c.rendered().subscribe(move |event| {
            if event.is_terminal() {
                done.set(done.get() + 1);
            }
        });
        c.schedule_commit(Some("microtask"), |_| Some(1));
        c.teardown();
        c.teardown();
        fx.scheduler.run_until_idle();
        assert!(seen.borrow().is_empty());
        assert_eq!(completed.get(), 1);
        assert!(!c.schedule_commit(Some("sync"), |_| Some(2)));
    }

    #[test]
    fn cancel_pending_keeps_coordinator_open() {
        let fx = Fixture::new();
        let c = fx.coordinator();
        let (seen, _sub) = record(&c);
        c.schedule_commit(Some("microtask"), |_| Some(1));
        c.cancel_pending();
        fx.scheduler.run_microtasks();
        assert!(seen.borrow().is_empty());
        c.schedule_commit(Some("microtask"), |_| Some(2));
        fx.scheduler.run_microtasks();
        assert_eq!(*seen.borrow(), [2]);
    }

    #[test]
    fn dropped_coordinator_never_commits() {
        let fx = Fixture::new();
        let ran = Rc::new(Cell::new(false));
        let r = Rc::clone(&ran);
        {
            let c = fx.coordinator();
            c.schedule_commit(Some("microtask"), move |_| {
                r.set(true);
                None
            });
        }
        fx.scheduler.run_until_idle();
        assert!(!ran.get());
    }

    struct CountingZone(Cell<u32>);

    impl ExecutionZone for CountingZone {
        fn run(&self, work: &mut dyn FnMut()) {
            self.0.set(self.0.get() + 1);
            work();
        }
    }

    #[test]
    fn zone_wraps_each_commit() {
        let fx = Fixture::new();
        let zone = Rc::new(CountingZone(Cell::new(0)));
        let c = fx.coordinator_in(Some(zone.clone() as Rc<dyn ExecutionZone>));
        c.schedule_commit(Some("sync"), |_| Some(1));
        c.schedule_commit(Some("microtask"), |_| Some(2));
        c.schedule_commit(Some("microtask"), |_| Some(3));
        fx.scheduler.run_microtasks();
        assert_eq!(zone.0.get(), 2);
    }

    #[test]
    fn commit_may_request_another_commit() {
        let fx = Fixture::new();
        let c = Rc::new(fx.coordinator());
        let (seen, _sub) = record(&c);
        let again = Rc::downgrade(&c);
        c.schedule_commit(Some("microtask"), move |_| {
            if let Some(c) = again.upgrade() {
                c.schedule_commit(Some("microtask"), |_| Some(2));
            }
            Some(1)
        });
        fx.scheduler.run_microtasks();
        assert_eq!(*seen.borrow(), [1, 2]);
    }
}
