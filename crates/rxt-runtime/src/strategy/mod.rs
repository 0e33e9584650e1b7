#![forbid(unsafe_code)]

//! Named render strategies.
//!
//! A strategy is a [`StrategyDescriptor`]: a [`Timing`](crate::Timing) that
//! decides *when* a commit runs and a [`CommitMode`] that decides *how*. The
//! closed set of built-ins is registered in a process-wide
//! [`StrategyRegistry`] at startup; configuration may add more. Each anchor
//! tracks its requested name in a [`StrategySelection`].

pub mod descriptor;
pub mod registry;
pub mod selection;

pub use descriptor::{CommitMode, DEFAULT_STRATEGY, StrategyDescriptor, builtin_strategies};
pub use registry::{Resolution, StrategyRegistry, StrategyTable};
pub use selection::StrategySelection;
