#![forbid(unsafe_code)]

//! Render errors and the out-of-band error reporting contract.
//!
//! Source failures are not errors here: they travel as
//! [`Notification::error`](crate::Notification::error). A [`RenderError`] is
//! always a misconfiguration, reported through an [`ErrorHandler`] while the
//! anchor keeps running on a safe fallback.
//!
//! # Failure Modes
//!
//! | Error | Cause | Fallback |
//! |-------|-------|----------|
//! | `UnknownStrategy` | Name not in the registry | Primary strategy |
//! | `TemplateConflict` | Re-register a template while its view is live | Keep existing template |
//! | `TemplateNotFound` | Resolved name has no registration | Render nothing |

use std::fmt;

use crate::template::TemplateName;

/// Broad class of a [`RenderError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad strategy name or conflicting registration.
    Configuration,
    /// No template available for the resolved name.
    TemplateNotFound,
}

/// Errors reported by the template/strategy coordination layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// A strategy name was requested that is not registered.
    UnknownStrategy {
        /// Requested name.
        requested: String,
        /// Strategy used instead.
        fallback: String,
    },
    /// A template was registered again while a view of it is active.
    TemplateConflict {
        /// Conflicting slot.
        name: TemplateName,
    },
    /// The resolved template has no registration and no fallback.
    TemplateNotFound {
        /// Resolved slot.
        name: TemplateName,
    },
}

impl RenderError {
    /// Classify this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::UnknownStrategy { .. } | Self::TemplateConflict { .. } => {
                ErrorClass::Configuration
            }
            Self::TemplateNotFound { .. } => ErrorClass::TemplateNotFound,
        }
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownStrategy {
                requested,
                fallback,
            } => write!(f, "unknown strategy '{requested}', using '{fallback}'"),
            Self::TemplateConflict { name } => {
                write!(f, "template '{name}' is in use and cannot be replaced")
            }
            Self::TemplateNotFound { name } => write!(f, "no template registered for '{name}'"),
        }
    }
}

impl std::error::Error for RenderError {}

/// Fire-and-forget sink for configuration problems.
pub trait ErrorHandler {
    /// Report `err`. Must not panic.
    fn handle_error(&self, err: &RenderError);
}

impl<F: Fn(&RenderError)> ErrorHandler for F {
    fn handle_error(&self, err: &RenderError) {
        self(err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn classes() {
        let unknown = RenderError::UnknownStrategy {
            requested: "x".into(),
            fallback: "normal".into(),
        };
        assert_eq!(unknown.class(), ErrorClass::Configuration);
        assert_eq!(
            RenderError::TemplateConflict {
                name: TemplateName::Main
            }
            .class(),
            ErrorClass::Configuration
        );
        assert_eq!(
            RenderError::TemplateNotFound {
                name: TemplateName::Error
            }
            .class(),
            ErrorClass::TemplateNotFound
        );
    }

    #[test]
    fn display_mentions_names() {
        let err = RenderError::UnknownStrategy {
            requested: "turbo".into(),
            fallback: "normal".into(),
        };
        assert_eq!(err.to_string(), "unknown strategy 'turbo', using 'normal'");
        let err = RenderError::TemplateNotFound {
            name: TemplateName::Complete,
        };
        assert!(err.to_string().contains("complete"));
    }

    #[test]
    fn closures_are_handlers() {
        let seen = RefCell::new(Vec::new());
        let handler = |err: &RenderError| seen.borrow_mut().push(err.clone());
        handler.handle_error(&RenderError::TemplateNotFound {
            name: TemplateName::Main,
        });
        assert_eq!(seen.borrow().len(), 1);
    }
}
