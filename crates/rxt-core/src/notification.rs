#![forbid(unsafe_code)]

//! Normalized notifications produced from a bound source.
//!
//! Every event a source can produce (subscription start, value, error,
//! completion) is turned into exactly one [`Notification`]. Notifications are
//! immutable once built; downstream code only reads them.
//!
//! # Invariants
//!
//! 1. `has_value()` is true iff `value()` is `Some`.
//! 2. `error()` is only ever `Some` for [`NotificationKind::Error`].
//! 3. [`NotificationKind::Error`] and [`NotificationKind::Complete`] are
//!    terminal: no notification of the same source follows them.

use std::fmt;

/// The four kinds a notification can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum NotificationKind {
    /// Subscribed, nothing arrived yet.
    Suspense,
    /// A new value.
    Next,
    /// The source failed.
    Error,
    /// The source finished.
    Complete,
}

impl NotificationKind {
    /// All kinds in lifecycle order.
    pub const ALL: [Self; 4] = [Self::Suspense, Self::Next, Self::Error, Self::Complete];

    /// Whether no further notification may follow this one for the same source.
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Error | Self::Complete)
    }

    /// Lowercase name, stable for logs and config.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Suspense => "suspense",
            Self::Next => "next",
            Self::Error => "error",
            Self::Complete => "complete",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A uniform record for one source event.
///
/// `value` is carried by `Next` notifications and, for synthetic
/// notifications (template triggers), by any kind that should keep showing
/// the last value.
#[derive(Clone, PartialEq)]
pub struct Notification<T, E> {
    kind: NotificationKind,
    value: Option<T>,
    error: Option<E>,
}

impl<T, E> Notification<T, E> {
    /// Initial placeholder notification, emitted on subscription.
    #[must_use]
    pub fn suspense() -> Self {
        Self {
            kind: NotificationKind::Suspense,
            value: None,
            error: None,
        }
    }

    /// A new value.
    #[must_use]
    pub fn next(value: T) -> Self {
        Self {
            kind: NotificationKind::Next,
            value: Some(value),
            error: None,
        }
    }

    /// The source failed with `error`.
    #[must_use]
    pub fn error(error: E) -> Self {
        Self {
            kind: NotificationKind::Error,
            value: None,
            error: Some(error),
        }
    }

    /// The source completed.
    #[must_use]
    pub fn complete() -> Self {
        Self {
            kind: NotificationKind::Complete,
            value: None,
            error: None,
        }
    }

    /// Build a notification of `kind` that carries `value` and no error.
    ///
    /// Used for synthetic notifications, e.g. a forced error template that
    /// should still show the last value.
    #[must_use]
    pub fn synthetic(kind: NotificationKind, value: Option<T>) -> Self {
        Self {
            kind,
            value,
            error: None,
        }
    }

    /// Which kind this is.
    #[inline]
    pub fn kind(&self) -> NotificationKind {
        self.kind
    }

    /// The carried value, if any.
    #[inline]
    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// The carried error, if any.
    #[inline]
    pub fn error_value(&self) -> Option<&E> {
        self.error.as_ref()
    }

    /// Whether a value is carried.
    #[inline]
    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    /// Shorthand for `kind().is_terminal()`.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }

    /// Split into parts.
    pub fn into_parts(self) -> (NotificationKind, Option<T>, Option<E>) {
        (self.kind, self.value, self.error)
    }
}

impl<T: fmt::Debug, E: fmt::Debug> fmt::Debug for Notification<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Notification");
        s.field("kind", &self.kind);
        if let Some(value) = &self.value {
            s.field("value", value);
        }
        if let Some(error) = &self.error {
            s.field("error", error);
        }
        s.field("has_value", &self.has_value()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type N = Notification<i32, String>;

    #[test]
    fn constructors_set_kind_and_payload() {
        assert_eq!(N::suspense().kind(), NotificationKind::Suspense);
        assert!(!N::suspense().has_value());

        let next = N::next(7);
        assert_eq!(next.kind(), NotificationKind::Next);
        assert_eq!(next.value(), Some(&7));
        assert!(next.error_value().is_none());

        let err = N::error("boom".into());
        assert_eq!(err.error_value().map(String::as_str), Some("boom"));
        assert!(!err.has_value());

        assert_eq!(N::complete().kind(), NotificationKind::Complete);
    }

    #[test]
    fn terminal_kinds() {
        assert!(!NotificationKind::Suspense.is_terminal());
        assert!(!NotificationKind::Next.is_terminal());
        assert!(NotificationKind::Error.is_terminal());
        assert!(NotificationKind::Complete.is_terminal());
        assert!(N::complete().is_terminal());
    }

    #[test]
    fn synthetic_carries_value_without_error() {
        let n = N::synthetic(NotificationKind::Error, Some(3));
        assert_eq!(n.kind(), NotificationKind::Error);
        assert_eq!(n.value(), Some(&3));
        assert!(n.error_value().is_none());
    }

    #[test]
    fn debug_omits_missing_fields() {
        let debug = format!("{:?}", N::next(1));
        assert!(debug.contains("value: 1"));
        assert!(!debug.contains("error"));
    }

    #[test]
    fn display_names_are_lowercase() {
        let names: Vec<_> = NotificationKind::ALL.iter().map(ToString::to_string).collect();
        assert_eq!(names, ["suspense", "next", "error", "complete"]);
    }
}
