#![forbid(unsafe_code)]

//! Ad-hoc scheduling under named strategies.
//!
//! [`StrategyProvider`] exposes the strategy table and scheduler to code
//! outside a directive, e.g. to defer a piece of work with the same timing a
//! given anchor uses.

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use rxt_core::{ErrorHandler, RenderError};

use crate::report::TracingErrorHandler;
use crate::scheduler::{Scheduler, TaskHandle};
use crate::strategy::{StrategyDescriptor, StrategyRegistry};

/// Named-strategy scheduling facade.
#[derive(Clone)]
pub struct StrategyProvider {
    registry: StrategyRegistry,
    scheduler: Scheduler,
    errors: Rc<dyn ErrorHandler>,
}

impl StrategyProvider {
    /// Provider over the global registry and this thread's scheduler.
    pub fn new() -> Self {
        Self::with_parts(
            StrategyRegistry::global(),
            Scheduler::current(),
            TracingErrorHandler,
        )
    }

    /// Provider over explicit collaborators.
    pub fn with_parts(
        registry: StrategyRegistry,
        scheduler: Scheduler,
        errors: impl ErrorHandler + 'static,
    ) -> Self {
        Self {
            registry,
            scheduler,
            errors: Rc::new(errors),
        }
    }

    /// Name of the primary strategy.
    pub fn primary_strategy(&self) -> String {
        self.registry.primary_name()
    }

    /// Change the primary strategy. Unknown names are reported and ignored.
    pub fn set_primary_strategy(&self, name: &str) -> Result<(), RenderError> {
        self.registry.set_primary(name).inspect_err(|err| {
            self.errors.handle_error(err);
        })
    }

    /// All registered strategy names, sorted.
    pub fn strategy_names(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Descriptor for `name`, falling back to the primary.
    pub fn strategy(&self, name: &str) -> Arc<StrategyDescriptor> {
        let resolution = self.registry.resolve(Some(name));
        if let Some(err) = &resolution.error {
            self.errors.handle_error(err);
        }
        resolution.descriptor
    }

    /// Run `work` with the timing of strategy `name`.
    ///
    /// Cancel through the returned handle.
    pub fn schedule(&self, name: &str, work: impl FnOnce() + 'static) -> TaskHandle {
        self.strategy(name).schedule(&self.scheduler, work)
    }

    /// The scheduler work is queued on.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }
}

impl Default for StrategyProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StrategyProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyProvider")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
