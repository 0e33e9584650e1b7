#![forbid(unsafe_code)]

//! The `let`-style binding directive.
//!
//! [`LetDirective`] is the host-facing surface of one anchor: it takes a
//! source (value or stream), a strategy (static or dynamic), an optional
//! render callback, and drives a [`TemplateManager`] with the normalized
//! notifications.
//!
//! # Example
//!
//! ```ignore
//! let mut directive = LetDirective::new(container, RenderOptions::new().strategy("local"));
//! directive.register_template(TemplateName::Main, main_template)?;
//! directive.set_source(Input::Stream(values));
//! directive.set_render_callback(|rendered| tracing::info!(?rendered.kind, "rendered"));
//! ```

use std::fmt;

use rxt_core::{
    Notification, NotificationKind, RenderError, TemplateName, ViewContainer, ViewContext,
};

use crate::manager::{RenderOptions, Rendered, TemplateManager};
use crate::normalizer::{Input, materialize_input};
use crate::reactive::{Subject, Subscription};

/// Binds a source to a view fragment at one anchor.
pub struct LetDirective<H: ViewContainer, T: Clone + 'static, E> {
    manager: TemplateManager<H, T, E>,
    source: Subscription,
    render_callback: Subscription,
}

impl<H, T, E> LetDirective<H, T, E>
where
    H: ViewContainer<Context = ViewContext<T, E>> + 'static,
    H::Template: 'static,
    H::View: 'static,
    T: Clone + 'static,
    E: Clone + 'static,
{
    /// A directive whose views are bound to a [`ViewContext`].
    pub fn new(host: H, options: RenderOptions) -> Self {
        Self::from_manager(TemplateManager::with_view_context(host, options))
    }
}

impl<H, T, E> LetDirective<H, T, E>
where
    H: ViewContainer + 'static,
    H::Template: 'static,
    H::Context: 'static,
    H::View: 'static,
    T: Clone + 'static,
    E: Clone + 'static,
{
    /// Wrap an existing manager, e.g. one with a custom context type.
    pub fn from_manager(manager: TemplateManager<H, T, E>) -> Self {
        Self {
            manager,
            source: Subscription::closed(),
            render_callback: Subscription::closed(),
        }
    }

    /// Register the template shown for `name`.
    pub fn register_template(
        &self,
        name: TemplateName,
        template: H::Template,
    ) -> Result<(), RenderError> {
        self.manager.register_template(name, template)
    }

    /// Bind a new source.
    ///
    /// The previous source is unsubscribed first. The new one starts with
    /// its own Suspense notification; the live view is kept if the resolved
    /// template does not change.
    pub fn set_source(&mut self, input: impl Into<Input<T, E>>) {
        self.source.unsubscribe();
        if self.manager.is_torn_down() {
            return;
        }
        self.manager.reset_phase();
        let manager = self.manager.clone();
        self.source = materialize_input(input.into(), move |notification| {
            manager.handle(notification);
        });
        tracing::debug!(anchor = %self.manager.anchor(), "source bound");
    }

    /// Use a static strategy name from now on.
    pub fn set_strategy(&self, name: impl Into<String>) {
        self.manager.set_strategy(name);
    }

    /// Merge a stream of strategy names; the latest name wins.
    pub fn merge_strategy(&self, source: &Subject<String>) {
        self.manager.merge_strategy(source);
    }

    /// Observe every executed commit. Replaces any previous callback.
    pub fn set_render_callback(&mut self, callback: impl Fn(&Rendered<T>) + 'static) {
        self.render_callback = self.manager.rendered().subscribe_next(callback);
    }

    /// Fires once per executed commit.
    pub fn rendered(&self) -> Subject<Rendered<T>> {
        self.manager.rendered()
    }

    /// Show the template and context flags of `kind` with the last value.
    ///
    /// The source subscription is untouched.
    pub fn trigger(&self, kind: NotificationKind) {
        let value = self.manager.last_value();
        self.manager.force(Notification::synthetic(kind, value));
    }

    /// The underlying manager.
    pub fn manager(&self) -> &TemplateManager<H, T, E> {
        &self.manager
    }
}

impl<H: ViewContainer, T: Clone + 'static, E> LetDirective<H, T, E> {
    /// Unsubscribe from the source and tear the anchor down. Idempotent.
    pub fn destroy(&mut self) {
        self.source.unsubscribe();
        self.render_callback.unsubscribe();
        self.manager.teardown();
    }
}

impl<H: ViewContainer, T: Clone + 'static, E> Drop for LetDirective<H, T, E> {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl<H: ViewContainer, T: Clone + 'static, E> fmt::Debug for LetDirective<H, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LetDirective")
            .field("manager", &self.manager)
            .field("source", &!self.source.is_closed())
            .finish()
    }
}
