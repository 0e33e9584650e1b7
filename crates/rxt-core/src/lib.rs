#![forbid(unsafe_code)]

//! Core data model and host contracts for rxt template bindings.
//!
//! This crate provides:
//! - [`Notification`] / [`NotificationKind`] for normalized source events
//! - [`TemplateName`], [`TemplateSet`] and [`resolve_template`] for picking
//!   the visible template from a notification
//! - [`ViewContext`], the fixed-shape record a template's bindings read from
//! - [`RenderError`] and the [`ErrorHandler`] collaborator
//! - Host traits ([`ViewContainer`], [`ChangeDetector`], [`ExecutionZone`])
//!   consumed from the UI framework
//!
//! Nothing in here schedules work or owns a subscription; see `rxt-runtime`.

pub mod context;
pub mod error;
pub mod host;
pub mod notification;
pub mod template;

pub use context::{ErrorFlag, ViewContext};
pub use error::{ErrorClass, ErrorHandler, RenderError};
pub use host::{AmbientZone, AnchorId, ChangeDetector, ExecutionZone, ViewContainer};
pub use notification::{Notification, NotificationKind};
pub use template::{
    ParseTemplateNameError, ResolvePolicy, TemplateName, TemplateSet, resolve_template,
};
