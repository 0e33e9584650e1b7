#![forbid(unsafe_code)]

//! Process-wide strategy table.
//!
//! The table is read on every commit and written only while configuring, so
//! it lives behind an [`ArcSwap`]: reads are a lock-free load, writes publish
//! a new table with `rcu`.
//!
//! # Invariants
//!
//! 1. The primary strategy name always refers to a registered descriptor.
//! 2. Lookups of unknown names never fail hard: [`StrategyRegistry::resolve`]
//!    falls back to the primary and reports why.

use std::fmt;
use std::sync::{Arc, LazyLock};

use ahash::AHashMap;
use arc_swap::ArcSwap;
use rxt_core::RenderError;

use super::descriptor::{CommitMode, DEFAULT_STRATEGY, StrategyDescriptor, builtin_strategies};
use crate::scheduler::{Priority, Timing};

static GLOBAL: LazyLock<StrategyRegistry> = LazyLock::new(StrategyRegistry::with_builtins);

/// Immutable snapshot of registered strategies.
#[derive(Debug, Clone)]
pub struct StrategyTable {
    strategies: AHashMap<String, Arc<StrategyDescriptor>>,
    primary: String,
}

impl StrategyTable {
    fn with_builtins() -> Self {
        let strategies = builtin_strategies()
            .into_iter()
            .map(|s| (s.name().to_string(), Arc::new(s)))
            .collect();
        Self {
            strategies,
            primary: DEFAULT_STRATEGY.to_string(),
        }
    }

    /// Descriptor registered under `name`.
    pub fn get(&self, name: &str) -> Option<&Arc<StrategyDescriptor>> {
        self.strategies.get(name)
    }

    /// Primary strategy name.
    pub fn primary_name(&self) -> &str {
        &self.primary
    }

    /// Primary strategy descriptor.
    pub fn primary(&self) -> Arc<StrategyDescriptor> {
        self.strategies
            .get(&self.primary)
            .cloned()
            .unwrap_or_else(|| Arc::new(fallback_descriptor()))
    }
}

// Only reachable if a table was built without the default strategy.
fn fallback_descriptor() -> StrategyDescriptor {
    StrategyDescriptor::new(
        DEFAULT_STRATEGY,
        Timing::Task(Priority::Normal),
        CommitMode::DetectChanges,
    )
}

/// Outcome of resolving a requested strategy name.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// The descriptor to use.
    pub descriptor: Arc<StrategyDescriptor>,
    /// Set when the request could not be honored.
    pub error: Option<RenderError>,
}

/// Shared handle to a strategy table. Clones see the same table.
#[derive(Clone)]
pub struct StrategyRegistry {
    table: Arc<ArcSwap<StrategyTable>>,
}

impl StrategyRegistry {
    /// A fresh registry holding the built-in strategies.
    pub fn with_builtins() -> Self {
        Self {
            table: Arc::new(ArcSwap::from_pointee(StrategyTable::with_builtins())),
        }
    }

    /// The process-wide registry.
    #[must_use]
    pub fn global() -> Self {
        GLOBAL.clone()
    }

    /// Current table snapshot.
    pub fn snapshot(&self) -> Arc<StrategyTable> {
        self.table.load_full()
    }

    /// Descriptor registered under `name`.
    pub fn get(&self, name: &str) -> Option<Arc<StrategyDescriptor>> {
        self.table.load().get(name).cloned()
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.table.load().get(name).is_some()
    }

    /// Primary strategy descriptor.
    pub fn primary(&self) -> Arc<StrategyDescriptor> {
        self.table.load().primary()
    }

    /// Primary strategy name.
    pub fn primary_name(&self) -> String {
        self.table.load().primary_name().to_string()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.table.load().strategies.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Add or replace a strategy.
    pub fn register(&self, descriptor: StrategyDescriptor) {
        let descriptor = Arc::new(descriptor);
        tracing::debug!(strategy = %descriptor, "strategy registered");
        self.table.rcu(|table| {
            let mut next = StrategyTable::clone(table);
            next.strategies
                .insert(descriptor.name().to_string(), Arc::clone(&descriptor));
            next
        });
    }

    /// Change the primary strategy.
    ///
    /// Unknown names leave the primary untouched.
    pub fn set_primary(&self, name: &str) -> Result<(), RenderError> {
        if !self.contains(name) {
            return Err(RenderError::UnknownStrategy {
                requested: name.to_string(),
                fallback: self.primary_name(),
            });
        }
        self.table.rcu(|table| {
            let mut next = StrategyTable::clone(table);
            next.primary = name.to_string();
            next
        });
        tracing::debug!(primary = name, "primary strategy changed");
        Ok(())
    }

    /// Resolve `requested` to a descriptor, falling back to the primary.
    ///
    /// `None` asks for the primary and is never an error.
    pub fn resolve(&self, requested: Option<&str>) -> Resolution {
        let table = self.table.load();
        match requested {
            None => Resolution {
                descriptor: table.primary(),
                error: None,
            },
            Some(name) => match table.get(name) {
                Some(descriptor) => Resolution {
                    descriptor: Arc::clone(descriptor),
                    error: None,
                },
                None => Resolution {
                    descriptor: table.primary(),
                    error: Some(RenderError::UnknownStrategy {
                        requested: name.to_string(),
                        fallback: table.primary_name().to_string(),
                    }),
                },
            },
        }
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.table.load();
        f.debug_struct("StrategyRegistry")
            .field("strategies", &table.strategies.len())
            .field("primary", &table.primary)
            .finish()
    }
}
