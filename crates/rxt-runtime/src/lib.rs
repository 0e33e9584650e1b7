#![forbid(unsafe_code)]

//! Render scheduling and template coordination for rxt.
//!
//! This crate provides:
//! - Single-threaded reactive primitives ([`Observable`], [`Subject`],
//!   [`Subscription`], [`SubscriptionScope`])
//! - The notification normalizer ([`materialize`])
//! - Named render strategies in a process-wide [`StrategyRegistry`], with a
//!   per-anchor [`StrategySelection`]
//! - A cooperative [`Scheduler`] with microtask, animation-frame and
//!   priority lanes
//! - [`RenderCoordinator`] (coalescing commits) and [`TemplateManager`]
//!   (view and context lifecycle)
//! - [`LetDirective`], the host-facing binding, and [`StrategyProvider`] for
//!   ad-hoc scheduling
//! - [`RenderConfig`] and the default [`TracingErrorHandler`]
//!
//! All types are `!Send`: one anchor lives on one thread. Only the strategy
//! table is shared across threads.

pub mod config;
pub mod coordinator;
pub mod directive;
pub mod manager;
pub mod normalizer;
pub mod provider;
pub mod reactive;
pub mod report;
pub mod scheduler;
pub mod strategy;

pub use config::{ConfigError, RenderConfig, StrategySpec};
pub use coordinator::{CommitStats, RenderCoordinator};
pub use directive::LetDirective;
pub use manager::{AnchorPhase, RenderOptions, Rendered, TemplateManager};
pub use normalizer::{Input, materialize, materialize_input};
pub use provider::StrategyProvider;
pub use reactive::{Event, Observable, Subject, Subscription, SubscriptionScope};
pub use report::TracingErrorHandler;
pub use scheduler::{Priority, Scheduler, SchedulerConfig, TaskHandle, Timing};
pub use strategy::{
    CommitMode, DEFAULT_STRATEGY, Resolution, StrategyDescriptor, StrategyRegistry,
    StrategySelection, StrategyTable, builtin_strategies,
};
