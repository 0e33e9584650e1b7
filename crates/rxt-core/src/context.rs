#![forbid(unsafe_code)]

//! The view context record bound to an embedded view.
//!
//! A [`ViewContext`] is created once per inserted view and then patched in
//! place for every later notification that resolves to the same template.
//! The host keeps a shared handle to it, so its identity never changes while
//! the view lives.

use crate::notification::{Notification, NotificationKind};

/// Error flag of a context: clear, raised without a value, or carrying one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ErrorFlag<E> {
    /// No error.
    #[default]
    Clear,
    /// Error shown without an error value (forced by a trigger).
    Raised,
    /// The source failed with this error.
    Failed(E),
}

impl<E> ErrorFlag<E> {
    /// Whether the flag is set at all.
    #[inline]
    pub fn is_set(&self) -> bool {
        !matches!(self, Self::Clear)
    }

    /// The error value, if one was recorded.
    pub fn value(&self) -> Option<&E> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Fields a template's bound expressions read from.
///
/// `implicit` is the default binding; `value` is the same value under its
/// named alias.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewContext<T, E> {
    /// Default binding (last value).
    pub implicit: Option<T>,
    /// Named alias of the last value.
    pub value: Option<T>,
    /// Error state.
    pub error: ErrorFlag<E>,
    /// Source completed.
    pub complete: bool,
    /// Waiting for the first value.
    pub suspense: bool,
}

impl<T, E> Default for ViewContext<T, E> {
    fn default() -> Self {
        Self {
            implicit: None,
            value: None,
            error: ErrorFlag::Clear,
            complete: false,
            suspense: false,
        }
    }
}

impl<T: Clone, E: Clone> ViewContext<T, E> {
    /// Build a fresh context for a view created by `notification`.
    pub fn from_notification(notification: &Notification<T, E>) -> Self {
        let mut ctx = Self::default();
        ctx.patch(notification);
        ctx
    }

    /// Patch fields in place for `notification`.
    ///
    /// Values are only overwritten when the notification carries one, so a
    /// `Complete` or `Error` keeps showing the last value.
    pub fn patch(&mut self, notification: &Notification<T, E>) {
        if let Some(value) = notification.value() {
            self.implicit = Some(value.clone());
            self.value = Some(value.clone());
        }
        match notification.kind() {
            NotificationKind::Suspense => {
                self.suspense = true;
                self.complete = false;
                self.error = ErrorFlag::Clear;
            }
            NotificationKind::Next => {
                self.suspense = false;
                self.complete = false;
                self.error = ErrorFlag::Clear;
            }
            NotificationKind::Error => {
                self.suspense = false;
                self.error = match notification.error_value() {
                    Some(err) => ErrorFlag::Failed(err.clone()),
                    None => ErrorFlag::Raised,
                };
            }
            NotificationKind::Complete => {
                self.suspense = false;
                self.complete = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Ctx = ViewContext<i32, String>;
    type N = Notification<i32, String>;

    #[test]
    fn suspense_context() {
        let ctx = Ctx::from_notification(&N::suspense());
        assert!(ctx.suspense);
        assert!(ctx.implicit.is_none());
        assert!(!ctx.error.is_set());
    }

    #[test]
    fn next_clears_suspense_and_sets_both_bindings() {
        let mut ctx = Ctx::from_notification(&N::suspense());
        ctx.patch(&N::next(4));
        assert!(!ctx.suspense);
        assert_eq!(ctx.implicit, Some(4));
        assert_eq!(ctx.value, Some(4));
    }

    #[test]
    fn complete_keeps_last_value() {
        let mut ctx = Ctx::from_notification(&N::next(9));
        ctx.patch(&N::complete());
        assert!(ctx.complete);
        assert_eq!(ctx.implicit, Some(9));
    }

    #[test]
    fn error_records_value() {
        let mut ctx = Ctx::from_notification(&N::next(1));
        ctx.patch(&N::error("bad".into()));
        assert_eq!(ctx.error.value().map(String::as_str), Some("bad"));
        assert_eq!(ctx.implicit, Some(1));
    }

    #[test]
    fn synthetic_error_is_raised_without_value() {
        let mut ctx = Ctx::default();
        ctx.patch(&N::synthetic(NotificationKind::Error, Some(2)));
        assert_eq!(ctx.error, ErrorFlag::Raised);
        assert_eq!(ctx.value, Some(2));
    }

    #[test]
    fn next_after_suspense_trigger_resets_flags() {
        let mut ctx = Ctx::from_notification(&N::next(1));
        ctx.patch(&N::synthetic(NotificationKind::Suspense, None));
        assert!(ctx.suspense);
        ctx.patch(&N::next(2));
        assert!(!ctx.suspense);
        assert!(!ctx.complete);
    }
}
