#![forbid(unsafe_code)]

//! RAII subscription guard.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

enum Teardown {
    /// Keeps a strong callback alive; releasing it disconnects the Weak side.
    Hold(Rc<dyn Any>),
    /// Runs once on release.
    Run(Box<dyn FnOnce()>),
}

/// Handle to an active subscription.
///
/// Releasing happens on [`unsubscribe`](Self::unsubscribe) or on drop,
/// whichever comes first. Further calls do nothing.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    teardown: Option<Teardown>,
}

impl Subscription {
    /// A subscription that keeps `callback` alive until released.
    pub(crate) fn hold(callback: Rc<dyn Any>) -> Self {
        Self {
            teardown: Some(Teardown::Hold(callback)),
        }
    }

    /// A subscription that runs `f` once when released.
    pub fn from_fn(f: impl FnOnce() + 'static) -> Self {
        Self {
            teardown: Some(Teardown::Run(Box::new(f))),
        }
    }

    /// An already-closed subscription.
    pub fn closed() -> Self {
        Self { teardown: None }
    }

    /// Release the subscription. Idempotent.
    pub fn unsubscribe(&mut self) {
        match self.teardown.take() {
            Some(Teardown::Run(f)) => f(),
            Some(Teardown::Hold(callback)) => drop(callback),
            None => {}
        }
    }

    /// Whether the subscription was released.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.teardown.is_none()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl Default for Subscription {
    fn default() -> Self {
        Self::closed()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("closed", &self.is_closed())
            .finish()
    }
}
