#![forbid(unsafe_code)]

//! Test doubles for rxt host contracts.
//!
//! # Role in rxt
//! `rxt-harness` stands in for the host UI framework in tests. The
//! [`RecordingContainer`] inserts [`RecordingView`]s and records every
//! create, destroy and commit into a shared [`HostLog`], so scenario tests
//! can assert exactly what reached the screen.
//!
//! # How it fits in the system
//! Tests build a [`Harness`] (private scheduler, private strategy table,
//! collecting error handler) and drive the scheduler by hand, so deferred
//! strategies are deterministic.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::Once;

use rxt_core::{
    ChangeDetector, ErrorClass, ErrorHandler, ExecutionZone, RenderError, ViewContainer,
    ViewContext,
};
use rxt_runtime::{LetDirective, RenderOptions, Scheduler, SchedulerConfig, StrategyRegistry};

// ============================================================================
// Logging
// ============================================================================

static LOGGING: Once = Once::new();

/// Install a `tracing` subscriber for tests. Honors `RUST_LOG`; idempotent.
pub fn init_test_logging() {
    LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// Host log
// ============================================================================

/// One executed `detect_changes` on a view.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitRecord<T, E> {
    /// View that was committed.
    pub view: u64,
    /// Its template.
    pub template: &'static str,
    /// Context as seen by the commit.
    pub context: ViewContext<T, E>,
}

struct LogState<T, E> {
    next_view: u64,
    live: Vec<u64>,
    created: Vec<&'static str>,
    destroyed: Vec<&'static str>,
    commits: Vec<CommitRecord<T, E>>,
    marks: usize,
}

/// Shared record of everything the host was asked to do.
pub struct HostLog<T, E> {
    state: Rc<RefCell<LogState<T, E>>>,
}

impl<T, E> Clone for HostLog<T, E> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<T, E> Default for HostLog<T, E> {
    fn default() -> Self {
        Self {
            state: Rc::new(RefCell::new(LogState {
                next_view: 0,
                live: Vec::new(),
                created: Vec::new(),
                destroyed: Vec::new(),
                commits: Vec::new(),
                marks: 0,
            })),
        }
    }
}

impl<T: Clone, E: Clone> HostLog<T, E> {
    /// Templates of every created view, in order.
    pub fn created(&self) -> Vec<&'static str> {
        self.state.borrow().created.clone()
    }

    /// Templates of every destroyed view, in order.
    pub fn destroyed(&self) -> Vec<&'static str> {
        self.state.borrow().destroyed.clone()
    }

    /// Views currently inserted.
    pub fn live(&self) -> usize {
        self.state.borrow().live.len()
    }

    /// Every `detect_changes`, in order.
    pub fn commits(&self) -> Vec<CommitRecord<T, E>> {
        self.state.borrow().commits.clone()
    }

    /// Number of `detect_changes` calls.
    pub fn commit_count(&self) -> usize {
        self.state.borrow().commits.len()
    }

    /// Most recent commit.
    pub fn last_commit(&self) -> Option<CommitRecord<T, E>> {
        self.state.borrow().commits.last().cloned()
    }

    /// Number of `mark_for_check` calls.
    pub fn marks(&self) -> usize {
        self.state.borrow().marks
    }
}

impl<T, E> fmt::Debug for HostLog<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("HostLog")
            .field("live", &state.live.len())
            .field("created", &state.created)
            .field("destroyed", &state.destroyed)
            .field("commits", &state.commits.len())
            .field("marks", &state.marks)
            .finish()
    }
}

// ============================================================================
// View container
// ============================================================================

/// A view inserted by [`RecordingContainer`].
pub struct RecordingView<T, E> {
    id: u64,
    template: &'static str,
    context: Rc<RefCell<ViewContext<T, E>>>,
    log: HostLog<T, E>,
}

impl<T, E> Clone for RecordingView<T, E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            template: self.template,
            context: Rc::clone(&self.context),
            log: self.log.clone(),
        }
    }
}

impl<T, E> RecordingView<T, E> {
    /// View identity.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Template it was created from.
    pub fn template(&self) -> &'static str {
        self.template
    }
}

impl<T: Clone, E: Clone> ChangeDetector for RecordingView<T, E> {
    fn detect_changes(&self) {
        let snapshot = self.context.borrow().clone();
        self.log.state.borrow_mut().commits.push(CommitRecord {
            view: self.id,
            template: self.template,
            context: snapshot,
        });
    }

    fn mark_for_check(&self) {
        self.log.state.borrow_mut().marks += 1;
    }
}

/// Host container whose templates are plain names.
pub struct RecordingContainer<T, E> {
    log: HostLog<T, E>,
}

impl<T, E> RecordingContainer<T, E> {
    /// A container writing into `log`.
    pub fn new(log: HostLog<T, E>) -> Self {
        Self { log }
    }
}

impl<T: Clone, E: Clone> ViewContainer for RecordingContainer<T, E> {
    type Template = &'static str;
    type Context = ViewContext<T, E>;
    type View = RecordingView<T, E>;

    fn create_embedded_view(
        &mut self,
        template: &&'static str,
        context: Rc<RefCell<ViewContext<T, E>>>,
    ) -> RecordingView<T, E> {
        let mut state = self.log.state.borrow_mut();
        state.next_view += 1;
        let id = state.next_view;
        state.live.push(id);
        state.created.push(*template);
        RecordingView {
            id,
            template: *template,
            context,
            log: self.log.clone(),
        }
    }

    fn destroy_view(&mut self, view: RecordingView<T, E>) {
        let mut state = self.log.state.borrow_mut();
        state.live.retain(|id| *id != view.id);
        state.destroyed.push(view.template);
    }
}

// ============================================================================
// Collaborators
// ============================================================================

/// Parent change detector that counts calls.
#[derive(Debug, Clone, Default)]
pub struct RecordingDetector {
    detected: Rc<Cell<usize>>,
    marked: Rc<Cell<usize>>,
}

impl RecordingDetector {
    /// `detect_changes` calls so far.
    pub fn detected(&self) -> usize {
        self.detected.get()
    }

    /// `mark_for_check` calls so far.
    pub fn marked(&self) -> usize {
        self.marked.get()
    }
}

impl ChangeDetector for RecordingDetector {
    fn detect_changes(&self) {
        self.detected.set(self.detected.get() + 1);
    }

    fn mark_for_check(&self) {
        self.marked.set(self.marked.get() + 1);
    }
}

/// Error handler that keeps every report.
#[derive(Debug, Clone, Default)]
pub struct CollectingErrorHandler {
    errors: Rc<RefCell<Vec<RenderError>>>,
}

impl CollectingErrorHandler {
    /// All reports, in order.
    pub fn errors(&self) -> Vec<RenderError> {
        self.errors.borrow().clone()
    }

    /// Number of reports.
    pub fn count(&self) -> usize {
        self.errors.borrow().len()
    }

    /// Number of reports of `class`.
    pub fn count_of(&self, class: ErrorClass) -> usize {
        self.errors
            .borrow()
            .iter()
            .filter(|err| err.class() == class)
            .count()
    }
}

impl ErrorHandler for CollectingErrorHandler {
    fn handle_error(&self, err: &RenderError) {
        tracing::debug!(error = %err, "collected render error");
        self.errors.borrow_mut().push(err.clone());
    }
}

/// Execution zone that counts entries.
#[derive(Debug, Clone, Default)]
pub struct CountingZone {
    runs: Rc<Cell<usize>>,
}

impl CountingZone {
    /// Times work entered the zone.
    pub fn runs(&self) -> usize {
        self.runs.get()
    }
}

impl ExecutionZone for CountingZone {
    fn run(&self, work: &mut dyn FnMut()) {
        self.runs.set(self.runs.get() + 1);
        work();
    }
}

// ============================================================================
// Harness
// ============================================================================

/// Isolated test bed: private scheduler, private strategy table, collecting
/// error handler and a shared host log.
pub struct Harness<T, E> {
    /// Scheduler driven by the test.
    pub scheduler: Scheduler,
    /// Strategy table not shared with other tests.
    pub registry: StrategyRegistry,
    /// Reported configuration errors.
    pub errors: CollectingErrorHandler,
    /// Host activity.
    pub log: HostLog<T, E>,
}

impl<T: Clone + 'static, E: Clone + 'static> Harness<T, E> {
    /// A fresh test bed; also installs test logging.
    pub fn new() -> Self {
        init_test_logging();
        Self {
            scheduler: Scheduler::new(SchedulerConfig::default()),
            registry: StrategyRegistry::with_builtins(),
            errors: CollectingErrorHandler::default(),
            log: HostLog::default(),
        }
    }

    /// Options wired to this harness, with `strategy` as the initial name.
    pub fn options(&self, strategy: &str) -> RenderOptions {
        RenderOptions::new()
            .scheduler(self.scheduler.clone())
            .registry(self.registry.clone())
            .error_handler(self.errors.clone())
            .strategy(strategy)
    }

    /// A container writing into this harness's log.
    pub fn container(&self) -> RecordingContainer<T, E> {
        RecordingContainer::new(self.log.clone())
    }

    /// A directive under `strategy` with default options otherwise.
    pub fn directive(&self, strategy: &str) -> LetDirective<RecordingContainer<T, E>, T, E> {
        LetDirective::new(self.container(), self.options(strategy))
    }

    /// A directive with custom options.
    pub fn directive_with(
        &self,
        options: RenderOptions,
    ) -> LetDirective<RecordingContainer<T, E>, T, E> {
        LetDirective::new(self.container(), options)
    }

    /// Run every queued task, whatever its timing.
    pub fn settle(&self) -> usize {
        self.scheduler.run_until_idle()
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Default for Harness<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_tracks_live_views() {
        let log: HostLog<i32, String> = HostLog::default();
        let mut container = RecordingContainer::new(log.clone());
        let ctx = Rc::new(RefCell::new(ViewContext::default()));
        let a = container.create_embedded_view(&"main", Rc::clone(&ctx));
        let b = container.create_embedded_view(&"error", ctx);
        assert_eq!(log.live(), 2);
        container.destroy_view(a);
        assert_eq!(log.live(), 1);
        assert_eq!(log.destroyed(), ["main"]);
        b.detect_changes();
        b.mark_for_check();
        assert_eq!(log.commit_count(), 1);
        assert_eq!(log.marks(), 1);
        assert_eq!(log.last_commit().map(|c| c.template), Some("error"));
    }

    #[test]
    fn collecting_handler_classifies() {
        let handler = CollectingErrorHandler::default();
        handler.handle_error(&RenderError::UnknownStrategy {
            requested: "x".into(),
            fallback: "normal".into(),
        });
        assert_eq!(handler.count_of(ErrorClass::Configuration), 1);
        assert_eq!(handler.count_of(ErrorClass::TemplateNotFound), 0);
    }

    #[test]
    fn init_test_logging_is_idempotent() {
        init_test_logging();
        init_test_logging();
    }
}
