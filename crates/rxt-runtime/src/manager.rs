#![forbid(unsafe_code)]

//! View and context management for one anchor.
//!
//! The [`TemplateManager`] owns the registered templates, the single active
//! view and its context. Each notification is resolved to a template name;
//! a matching active view gets its context patched in place, otherwise the
//! old view is destroyed and a new one created. The commit is then handed
//! to the anchor's [`RenderCoordinator`].
//!
//! # State machine
//!
//! ```text
//!   Uninitialized ──Suspense──▶ Suspense ──Next──▶ Next ◀─┐
//!                                  │                │ └─Next┘
//!                                  └──Error/Complete┴──▶ Error | Complete (terminal)
//! ```
//!
//! The phase follows the source only. Terminal phases ignore further source
//! notifications until teardown or a source switch
//! ([`TemplateManager::reset_phase`]). Forced notifications still render in
//! any phase but never move it.
//!
//! # Invariants
//!
//! 1. At most one live view per anchor; the old view is destroyed before the
//!    new one is created.
//! 2. The active view's template is the one resolved from the most recent
//!    notification.
//! 3. A context keeps its identity for the lifetime of its view.
//! 4. After [`TemplateManager::teardown`] no view is live and no commit runs.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use rxt_core::{
    AmbientZone, AnchorId, ChangeDetector, ErrorHandler, ExecutionZone, Notification,
    NotificationKind, RenderError, ResolvePolicy, TemplateName, TemplateSet, ViewContainer,
    ViewContext, resolve_template,
};

use crate::coordinator::{CommitStats, RenderCoordinator};
use crate::reactive::{Subject, Subscription};
use crate::report::TracingErrorHandler;
use crate::scheduler::Scheduler;
use crate::strategy::{StrategyRegistry, StrategySelection};

// =============================================================================
// Options
// =============================================================================

/// Collaborators and flags for one anchor.
///
/// Unset collaborators fall back to the thread's [`Scheduler::current`], the
/// process-wide [`StrategyRegistry::global`] and [`TracingErrorHandler`].
#[derive(Clone, Default)]
pub struct RenderOptions {
    scheduler: Option<Scheduler>,
    registry: Option<StrategyRegistry>,
    errors: Option<Rc<dyn ErrorHandler>>,
    zone: Option<Rc<dyn ExecutionZone>>,
    patch_zone: bool,
    strategy: Option<String>,
    parent: Option<Rc<dyn ChangeDetector>>,
    policy: ResolvePolicy,
}

impl RenderOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scheduler that runs deferred commits.
    #[must_use]
    pub fn scheduler(mut self, scheduler: Scheduler) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Strategy table to resolve names against.
    #[must_use]
    pub fn registry(mut self, registry: StrategyRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Where configuration problems are reported.
    #[must_use]
    pub fn error_handler(mut self, handler: impl ErrorHandler + 'static) -> Self {
        self.errors = Some(Rc::new(handler));
        self
    }

    /// The host's execution zone. Only used with [`patch_zone`](Self::patch_zone).
    #[must_use]
    pub fn zone(mut self, zone: impl ExecutionZone + 'static) -> Self {
        self.zone = Some(Rc::new(zone));
        self
    }

    /// Run commits inside the execution zone.
    #[must_use]
    pub fn patch_zone(mut self, patch: bool) -> Self {
        self.patch_zone = patch;
        self
    }

    /// Initial strategy name. Defaults to the registry's primary.
    #[must_use]
    pub fn strategy(mut self, name: impl Into<String>) -> Self {
        self.strategy = Some(name.into());
        self
    }

    /// Also commit `parent` after every view commit.
    #[must_use]
    pub fn render_parent(mut self, parent: impl ChangeDetector + 'static) -> Self {
        self.parent = Some(Rc::new(parent));
        self
    }

    /// Template resolution policy.
    #[must_use]
    pub fn policy(mut self, policy: ResolvePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Whether commits run inside the execution zone.
    pub fn patches_zone(&self) -> bool {
        self.patch_zone
    }
}

impl fmt::Debug for RenderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderOptions")
            .field("patch_zone", &self.patch_zone)
            .field("strategy", &self.strategy)
            .field("render_parent", &self.parent.is_some())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Phase and output
// =============================================================================

/// Where an anchor is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnchorPhase {
    /// No notification yet.
    #[default]
    Uninitialized,
    /// Waiting for the first value.
    Suspense,
    /// Showing a value.
    Next,
    /// Source failed.
    Error,
    /// Source finished.
    Complete,
}

impl AnchorPhase {
    /// Phase entered by a notification of `kind`.
    pub const fn for_kind(kind: NotificationKind) -> Self {
        match kind {
            NotificationKind::Suspense => Self::Suspense,
            NotificationKind::Next => Self::Next,
            NotificationKind::Error => Self::Error,
            NotificationKind::Complete => Self::Complete,
        }
    }

    /// Error and Complete only exit through teardown or a source switch.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Error | Self::Complete)
    }
}

/// Emitted once per executed commit.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered<T> {
    /// Anchor that committed.
    pub anchor: AnchorId,
    /// Kind of the notification that was committed.
    pub kind: NotificationKind,
    /// Template of the committed view.
    pub template: TemplateName,
    /// Last value at the time of the notification.
    pub value: Option<T>,
}

// =============================================================================
// Manager
// =============================================================================

type ContextFactory<C, T, E> = Box<dyn Fn(&Notification<T, E>) -> C>;
type ContextUpdate<C, T, E> = Box<dyn Fn(&mut C, &Notification<T, E>)>;

struct ActiveView<H: ViewContainer> {
    name: TemplateName,
    context: Rc<RefCell<H::Context>>,
    view: H::View,
}

struct State<H: ViewContainer, T> {
    host: H,
    templates: [Option<H::Template>; 4],
    registered: TemplateSet,
    active: Option<ActiveView<H>>,
    phase: AnchorPhase,
    last_value: Option<T>,
    views_created: u64,
    views_destroyed: u64,
    torn_down: bool,
}

impl<H: ViewContainer, T> State<H, T> {
    fn dispose_active(&mut self, anchor: AnchorId) {
        if let Some(old) = self.active.take() {
            self.host.destroy_view(old.view);
            self.views_destroyed += 1;
            tracing::debug!(%anchor, template = %old.name, "view disposed");
        }
    }
}

enum Outcome<V, T> {
    Commit { view: V, rendered: Rendered<T> },
    Missing(TemplateName),
}

struct Inner<H: ViewContainer, T: Clone + 'static, E> {
    anchor: AnchorId,
    state: RefCell<State<H, T>>,
    create_context: ContextFactory<H::Context, T, E>,
    update_context: ContextUpdate<H::Context, T, E>,
    policy: ResolvePolicy,
    strategy: RefCell<StrategySelection>,
    coordinator: RenderCoordinator<Rendered<T>>,
    errors: Rc<dyn ErrorHandler>,
    parent: Option<Rc<dyn ChangeDetector>>,
}

impl<H: ViewContainer, T: Clone + 'static, E> Drop for Inner<H, T, E> {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if let Some(active) = state.active.take() {
            state.host.destroy_view(active.view);
        }
    }
}

/// Template registry, active view and context for one anchor.
///
/// Clones are handles to the same anchor.
pub struct TemplateManager<H: ViewContainer, T: Clone + 'static, E> {
    inner: Rc<Inner<H, T, E>>,
}

impl<H: ViewContainer, T: Clone + 'static, E> Clone for TemplateManager<H, T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<H, T, E> TemplateManager<H, T, E>
where
    H: ViewContainer + 'static,
    H::Template: 'static,
    H::Context: 'static,
    H::View: 'static,
    T: Clone + 'static,
    E: Clone + 'static,
{
    /// Create a manager over `host`.
    ///
    /// `create_context` builds the context of a new view; `update_context`
    /// patches the context of a reused one.
    pub fn new(
        host: H,
        options: RenderOptions,
        create_context: impl Fn(&Notification<T, E>) -> H::Context + 'static,
        update_context: impl Fn(&mut H::Context, &Notification<T, E>) + 'static,
    ) -> Self {
        let RenderOptions {
            scheduler,
            registry,
            errors,
            zone,
            patch_zone,
            strategy,
            parent,
            policy,
        } = options;
        let anchor = AnchorId::next();
        let scheduler = scheduler.unwrap_or_else(Scheduler::current);
        let registry = registry.unwrap_or_else(StrategyRegistry::global);
        let errors = errors.unwrap_or_else(|| Rc::new(TracingErrorHandler) as Rc<dyn ErrorHandler>);
        let zone = if patch_zone {
            Some(zone.unwrap_or_else(|| Rc::new(AmbientZone) as Rc<dyn ExecutionZone>))
        } else {
            None
        };
        let initial = strategy.unwrap_or_else(|| registry.primary_name());
        tracing::debug!(%anchor, strategy = %initial, patch_zone, "anchor created");

        let coordinator =
            RenderCoordinator::new(anchor, scheduler, registry, Rc::clone(&errors), zone);
        Self {
            inner: Rc::new(Inner {
                anchor,
                state: RefCell::new(State {
                    host,
                    templates: [None, None, None, None],
                    registered: TemplateSet::empty(),
                    active: None,
                    phase: AnchorPhase::Uninitialized,
                    last_value: None,
                    views_created: 0,
                    views_destroyed: 0,
                    torn_down: false,
                }),
                create_context: Box::new(create_context),
                update_context: Box::new(update_context),
                policy,
                strategy: RefCell::new(StrategySelection::new(initial)),
                coordinator,
                errors,
                parent,
            }),
        }
    }

    /// Register `template` for `name`.
    ///
    /// Replacing a template whose view is currently active is a
    /// configuration error; the existing template is kept.
    pub fn register_template(
        &self,
        name: TemplateName,
        template: H::Template,
    ) -> Result<(), RenderError> {
        let conflict = {
            let mut state = self.inner.state.borrow_mut();
            if state.active.as_ref().is_some_and(|a| a.name == name) {
                true
            } else {
                state.templates[name.index()] = Some(template);
                state.registered |= name.flag();
                false
            }
        };
        if conflict {
            let err = RenderError::TemplateConflict { name };
            self.inner.errors.handle_error(&err);
            return Err(err);
        }
        tracing::debug!(anchor = %self.inner.anchor, template = %name, "template registered");
        Ok(())
    }

    /// Process one source notification.
    pub fn handle(&self, notification: Notification<T, E>) {
        self.inner.process(notification, false);
    }

    /// Process a synthetic notification, even in a terminal phase.
    ///
    /// The phase is left as the source set it.
    pub fn force(&self, notification: Notification<T, E>) {
        self.inner.process(notification, true);
    }

    /// Feed every notification of `notifications` through [`handle`](Self::handle).
    ///
    /// Returns the subscription to the input and the rendered stream.
    pub fn render(
        &self,
        notifications: &Subject<Notification<T, E>>,
    ) -> (Subscription, Subject<Rendered<T>>) {
        let weak: Weak<Inner<H, T, E>> = Rc::downgrade(&self.inner);
        let sub = notifications.subscribe_next(move |notification| {
            if let Some(inner) = weak.upgrade() {
                inner.process(notification.clone(), false);
            }
        });
        (sub, self.rendered())
    }

    /// One event per executed commit; completes on teardown.
    pub fn rendered(&self) -> Subject<Rendered<T>> {
        self.inner.coordinator.rendered()
    }

    /// Restart the state machine for a new source. The active view stays.
    pub fn reset_phase(&self) {
        self.inner.state.borrow_mut().phase = AnchorPhase::Uninitialized;
    }

    /// Set a static strategy name.
    pub fn set_strategy(&self, name: impl Into<String>) {
        self.inner.strategy.borrow().set(name);
    }

    /// Merge a dynamic strategy name source.
    pub fn merge_strategy(&self, source: &Subject<String>) {
        self.inner.strategy.borrow_mut().merge(source);
    }

    /// The current strategy name.
    pub fn strategy(&self) -> String {
        self.inner.strategy.borrow().current()
    }

    /// Anchor identity.
    pub fn anchor(&self) -> AnchorId {
        self.inner.anchor
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> AnchorPhase {
        self.inner.state.borrow().phase
    }

    /// Template of the live view.
    pub fn active_template(&self) -> Option<TemplateName> {
        self.inner.state.borrow().active.as_ref().map(|a| a.name)
    }

    /// Context of the live view.
    pub fn context(&self) -> Option<Rc<RefCell<H::Context>>> {
        self.inner
            .state
            .borrow()
            .active
            .as_ref()
            .map(|a| Rc::clone(&a.context))
    }

    /// Registered template slots.
    pub fn registered(&self) -> TemplateSet {
        self.inner.state.borrow().registered
    }

    /// Last value received.
    pub fn last_value(&self) -> Option<T> {
        self.inner.state.borrow().last_value.clone()
    }

    /// Views created so far.
    pub fn views_created(&self) -> u64 {
        self.inner.state.borrow().views_created
    }

    /// Views destroyed so far.
    pub fn views_destroyed(&self) -> u64 {
        self.inner.state.borrow().views_destroyed
    }

    /// Commit counters of the anchor.
    pub fn commit_stats(&self) -> CommitStats {
        self.inner.coordinator.stats()
    }

    /// Whether [`teardown`](Self::teardown) has run.
    pub fn is_torn_down(&self) -> bool {
        self.inner.state.borrow().torn_down
    }
}

impl<H: ViewContainer, T: Clone + 'static, E> TemplateManager<H, T, E> {
    /// Destroy the active view, cancel pending commits, stop strategy
    /// sources. Idempotent.
    pub fn teardown(&self) {
        {
            let mut state = self.inner.state.borrow_mut();
            if state.torn_down {
                return;
            }
            state.torn_down = true;
        }
        self.inner.coordinator.teardown();
        self.inner
            .state
            .borrow_mut()
            .dispose_active(self.inner.anchor);
        self.inner.strategy.borrow_mut().clear_sources();
        tracing::debug!(anchor = %self.inner.anchor, "anchor torn down");
    }
}

impl<H, T, E> TemplateManager<H, T, E>
where
    H: ViewContainer<Context = ViewContext<T, E>> + 'static,
    H::Template: 'static,
    H::View: 'static,
    T: Clone + 'static,
    E: Clone + 'static,
{
    /// A manager whose views are bound to a [`ViewContext`].
    pub fn with_view_context(host: H, options: RenderOptions) -> Self {
        Self::new(
            host,
            options,
            ViewContext::from_notification,
            ViewContext::patch,
        )
    }
}

impl<H, T, E> Inner<H, T, E>
where
    H: ViewContainer + 'static,
    H::View: 'static,
    T: Clone + 'static,
    E: Clone + 'static,
{
    fn process(&self, notification: Notification<T, E>, synthetic: bool) {
        let anchor = self.anchor;
        let kind = notification.kind();
        let outcome = {
            let mut state = self.state.borrow_mut();
            if state.torn_down {
                return;
            }
            if state.phase.is_terminal() && !synthetic {
                tracing::trace!(%anchor, %kind, "notification after terminal phase ignored");
                return;
            }
            if let Some(value) = notification.value() {
                state.last_value = Some(value.clone());
            }
            if !synthetic {
                state.phase = AnchorPhase::for_kind(kind);
            }

            let name = resolve_template(kind, state.registered, self.policy);
            let State {
                host,
                templates,
                active,
                views_created,
                views_destroyed,
                last_value,
                ..
            } = &mut *state;

            let reused = match active.as_mut() {
                Some(current) if current.name == name => {
                    (self.update_context)(&mut current.context.borrow_mut(), &notification);
                    tracing::trace!(%anchor, template = %name, %kind, "view reused");
                    true
                }
                _ => false,
            };
            if !reused {
                if let Some(old) = active.take() {
                    host.destroy_view(old.view);
                    *views_destroyed += 1;
                    tracing::debug!(%anchor, template = %old.name, "view disposed");
                }
                if let Some(template) = templates[name.index()].as_ref() {
                    let context = Rc::new(RefCell::new((self.create_context)(&notification)));
                    let view = host.create_embedded_view(template, Rc::clone(&context));
                    *active = Some(ActiveView {
                        name,
                        context,
                        view,
                    });
                    *views_created += 1;
                    tracing::debug!(%anchor, template = %name, %kind, "view created");
                }
            }

            match active.as_ref() {
                Some(current) => Outcome::Commit {
                    view: current.view.clone(),
                    rendered: Rendered {
                        anchor,
                        kind,
                        template: name,
                        value: last_value.clone(),
                    },
                },
                None => Outcome::Missing(name),
            }
        };

        match outcome {
            Outcome::Missing(name) => {
                self.coordinator.cancel_pending();
                self.errors
                    .handle_error(&RenderError::TemplateNotFound { name });
            }
            Outcome::Commit { view, rendered } => {
                let strategy = self.strategy.borrow().current();
                let parent = self.parent.clone();
                self.coordinator
                    .schedule_commit(Some(&strategy), move |descriptor| {
                        descriptor.commit(&view);
                        if let Some(parent) = &parent {
                            descriptor.commit(&**parent);
                        }
                        Some(rendered)
                    });
            }
        }
    }
}

impl<H: ViewContainer, T: Clone + 'static, E> fmt::Debug for TemplateManager<H, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("TemplateManager")
            .field("anchor", &self.inner.anchor)
            .field("phase", &state.phase)
            .field("registered", &state.registered)
            .field("active", &state.active.as_ref().map(|a| a.name))
            .field("torn_down", &state.torn_down)
            .finish()
    }
}
