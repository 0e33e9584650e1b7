#![forbid(unsafe_code)]

//! Strategy descriptors: a timing policy plus a commit mode.

use std::fmt;
use std::str::FromStr;

use rxt_core::ChangeDetector;

use crate::scheduler::{Priority, Scheduler, TaskHandle, Timing};

/// Name of the library default strategy.
pub const DEFAULT_STRATEGY: &str = "normal";

/// How a strategy performs the visual commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommitMode {
    /// Process the target's pending updates immediately.
    DetectChanges,
    /// Mark the target dirty for the host's next pass.
    MarkForCheck,
    /// Do nothing.
    Noop,
}

impl CommitMode {
    /// Stable kebab-case name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DetectChanges => "detect-changes",
            Self::MarkForCheck => "mark-for-check",
            Self::Noop => "noop",
        }
    }

    /// Commit `target`.
    pub fn apply(self, target: &dyn ChangeDetector) {
        match self {
            Self::DetectChanges => target.detect_changes(),
            Self::MarkForCheck => target.mark_for_check(),
            Self::Noop => {}
        }
    }
}

impl fmt::Display for CommitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommitMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "detect-changes" => Ok(Self::DetectChanges),
            "mark-for-check" => Ok(Self::MarkForCheck),
            "noop" => Ok(Self::Noop),
            other => Err(format!("unknown commit mode: {other}")),
        }
    }
}

/// A named render strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyDescriptor {
    name: String,
    timing: Timing,
    commit: CommitMode,
}

impl StrategyDescriptor {
    /// Create a descriptor.
    pub fn new(name: impl Into<String>, timing: Timing, commit: CommitMode) -> Self {
        Self {
            name: name.into(),
            timing,
            commit,
        }
    }

    /// Registry key.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// When work under this strategy runs.
    pub fn timing(&self) -> Timing {
        self.timing
    }

    /// How the commit is performed.
    pub fn commit_mode(&self) -> CommitMode {
        self.commit
    }

    /// Whether work runs on the caller's stack.
    pub fn is_sync(&self) -> bool {
        self.timing == Timing::Sync
    }

    /// Defer or run `work` per this strategy's timing.
    pub fn schedule(&self, scheduler: &Scheduler, work: impl FnOnce() + 'static) -> TaskHandle {
        scheduler.schedule(self.timing, work)
    }

    /// Perform the visual commit on `target`.
    pub fn commit(&self, target: &dyn ChangeDetector) {
        self.commit.apply(target);
    }
}

impl fmt::Display for StrategyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.name, self.timing, self.commit)
    }
}

/// The strategies every registry starts with.
pub fn builtin_strategies() -> Vec<StrategyDescriptor> {
    use CommitMode::{DetectChanges, MarkForCheck, Noop};
    vec![
        StrategyDescriptor::new("sync", Timing::Sync, DetectChanges),
        StrategyDescriptor::new("native", Timing::Sync, MarkForCheck),
        StrategyDescriptor::new("noop", Timing::Sync, Noop),
        StrategyDescriptor::new("microtask", Timing::Microtask, DetectChanges),
        StrategyDescriptor::new("local", Timing::AnimationFrame, DetectChanges),
        StrategyDescriptor::new("immediate", Timing::Task(Priority::Immediate), DetectChanges),
        StrategyDescriptor::new(
            "userBlocking",
            Timing::Task(Priority::UserBlocking),
            DetectChanges,
        ),
        StrategyDescriptor::new(DEFAULT_STRATEGY, Timing::Task(Priority::Normal), DetectChanges),
        StrategyDescriptor::new("low", Timing::Task(Priority::Low), DetectChanges),
        StrategyDescriptor::new("idle", Timing::Task(Priority::Idle), DetectChanges),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Default)]
    struct Probe {
        detected: Cell<u32>,
        marked: Cell<u32>,
    }

    impl ChangeDetector for Probe {
        fn detect_changes(&self) {
            self.detected.set(self.detected.get() + 1);
        }

        fn mark_for_check(&self) {
            self.marked.set(self.marked.get() + 1);
        }
    }

    #[test]
    fn commit_modes_hit_the_right_primitive() {
        let probe = Probe::default();
        CommitMode::DetectChanges.apply(&probe);
        CommitMode::MarkForCheck.apply(&probe);
        CommitMode::Noop.apply(&probe);
        assert_eq!(probe.detected.get(), 1);
        assert_eq!(probe.marked.get(), 1);
    }

    #[test]
    fn builtins_include_default_and_are_unique() {
        let builtins = builtin_strategies();
        assert!(builtins.iter().any(|s| s.name() == DEFAULT_STRATEGY));
        let mut names: Vec<_> = builtins.iter().map(StrategyDescriptor::name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), builtins.len());
    }

    #[test]
    fn sync_descriptor_runs_inline() {
        let scheduler = Scheduler::new(Default::default());
        let descriptor = StrategyDescriptor::new("s", Timing::Sync, CommitMode::DetectChanges);
        let ran = std::rc::Rc::new(Cell::new(false));
        let r = std::rc::Rc::clone(&ran);
        descriptor.schedule(&scheduler, move || r.set(true));
        assert!(ran.get());
        assert!(descriptor.is_sync());
    }

    #[test]
    fn commit_mode_parses() {
        assert_eq!("Mark-For-Check".parse(), Ok(CommitMode::MarkForCheck));
        assert!("paint".parse::<CommitMode>().is_err());
    }
}
