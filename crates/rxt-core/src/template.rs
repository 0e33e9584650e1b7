#![forbid(unsafe_code)]

//! Template names and notification-to-template resolution.
//!
//! An anchor can hold up to four templates, one per [`TemplateName`]. The
//! resolver maps a [`NotificationKind`] to the name that should be visible.
//!
//! # Policies
//!
//! - [`ResolvePolicy::PerKind`] (default): the kind-specific template if one
//!   is registered, otherwise [`TemplateName::Main`]. With only `Main`
//!   registered every kind shares one view and only context flags change.
//! - [`ResolvePolicy::Shared`]: always `Main`, even if kind templates exist.
//!
//! # Invariants
//!
//! 1. [`resolve_template`] is total over [`NotificationKind`] and depends on
//!    nothing but its arguments.
//! 2. `Next` always resolves to `Main`.

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;

use crate::notification::NotificationKind;

/// Name of a template slot on an anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum TemplateName {
    /// The value template, shared by all kinds unless overridden.
    Main,
    /// Placeholder shown before the first value.
    Suspense,
    /// Shown after the source errors.
    Error,
    /// Shown after the source completes.
    Complete,
}

impl TemplateName {
    /// All names in slot order.
    pub const ALL: [Self; 4] = [Self::Main, Self::Suspense, Self::Error, Self::Complete];

    /// The kind-specific name for `kind`.
    pub const fn for_kind(kind: NotificationKind) -> Self {
        match kind {
            NotificationKind::Suspense => Self::Suspense,
            NotificationKind::Next => Self::Main,
            NotificationKind::Error => Self::Error,
            NotificationKind::Complete => Self::Complete,
        }
    }

    /// Stable lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Suspense => "suspense",
            Self::Error => "error",
            Self::Complete => "complete",
        }
    }

    /// Slot index in `0..4`.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Self::Main => 0,
            Self::Suspense => 1,
            Self::Error => 2,
            Self::Complete => 3,
        }
    }

    /// The single-bit set for this name.
    pub const fn flag(self) -> TemplateSet {
        match self {
            Self::Main => TemplateSet::MAIN,
            Self::Suspense => TemplateSet::SUSPENSE,
            Self::Error => TemplateSet::ERROR,
            Self::Complete => TemplateSet::COMPLETE,
        }
    }
}

impl fmt::Display for TemplateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not a known template name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTemplateNameError(pub String);

impl fmt::Display for ParseTemplateNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown template name: {}", self.0)
    }
}

impl std::error::Error for ParseTemplateNameError {}

impl FromStr for TemplateName {
    type Err = ParseTemplateNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|name| name.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ParseTemplateNameError(s.to_string()))
    }
}

bitflags! {
    /// Set of registered template names on one anchor.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TemplateSet: u8 {
        const MAIN = 0b0001;
        const SUSPENSE = 0b0010;
        const ERROR = 0b0100;
        const COMPLETE = 0b1000;
    }
}

impl TemplateSet {
    /// Whether `name` is in the set.
    #[inline]
    pub fn has(self, name: TemplateName) -> bool {
        self.contains(name.flag())
    }

    /// Registered names in slot order.
    pub fn names(self) -> impl Iterator<Item = TemplateName> {
        TemplateName::ALL.into_iter().filter(move |n| self.has(*n))
    }
}

/// How kinds map onto registered templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolvePolicy {
    /// Every kind shows `Main`.
    Shared,
    /// Kind-specific template when registered, else `Main`.
    #[default]
    PerKind,
}

/// Pick the template that should be visible for `kind`.
///
/// The returned name may itself be unregistered (e.g. nothing registered at
/// all); callers decide how to report that.
pub fn resolve_template(
    kind: NotificationKind,
    registered: TemplateSet,
    policy: ResolvePolicy,
) -> TemplateName {
    let resolved = match policy {
        ResolvePolicy::Shared => TemplateName::Main,
        ResolvePolicy::PerKind => {
            let specific = TemplateName::for_kind(kind);
            if registered.has(specific) {
                specific
            } else {
                TemplateName::Main
            }
        }
    };

    #[cfg(feature = "tracing")]
    tracing::trace!(
        kind = kind.as_str(),
        registered = ?registered,
        resolved = resolved.as_str(),
        "resolve_template"
    );

    resolved
}
