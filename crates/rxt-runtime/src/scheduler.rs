#![forbid(unsafe_code)]

//! Cooperative, single-threaded task scheduler.
//!
//! Work is queued into one of three lanes and executed when the host drives
//! the scheduler (once per turn / frame):
//!
//! | Lane | Filled by | Drained |
//! |------|-----------|---------|
//! | microtask | [`Timing::Microtask`] | at the start of every frame and after every task |
//! | animation frame | [`Timing::AnimationFrame`] | once per [`Scheduler::run_frame`], only callbacks queued before the frame began |
//! | priority | [`Timing::Task`] | by expiration (`enqueued + timeout`), within the frame budget |
//!
//! [`Timing::Sync`] runs on the caller's stack and never touches a lane.
//!
//! # Invariants
//!
//! 1. Priority tasks run in expiration order, ties in insertion order.
//! 2. Expired priority tasks run even when the frame budget is exhausted.
//! 3. Work scheduled while a lane is draining is never lost; it runs in the
//!    same drain (microtasks) or a later one (frame callbacks).
//! 4. A cancelled task never runs. Cancelling a finished task is a no-op.
//! 5. No internal borrow is held while user work runs.

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;
use std::time::Duration;

use web_time::Instant;

// =============================================================================
// Timing
// =============================================================================

/// Priority level of a deferred task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    /// Expires immediately.
    Immediate,
    /// Expires after 250 ms.
    UserBlocking,
    /// Expires after 5 s.
    Normal,
    /// Expires after 10 s.
    Low,
    /// Never expires; runs only when budget allows.
    Idle,
}

impl Priority {
    /// How long a task may wait before it must run regardless of budget.
    pub const fn timeout(self) -> Option<Duration> {
        match self {
            Self::Immediate => Some(Duration::ZERO),
            Self::UserBlocking => Some(Duration::from_millis(250)),
            Self::Normal => Some(Duration::from_millis(5_000)),
            Self::Low => Some(Duration::from_millis(10_000)),
            Self::Idle => None,
        }
    }
}

/// When scheduled work runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timing {
    /// Now, on the caller's stack.
    Sync,
    /// At the end of the current turn.
    Microtask,
    /// In the next animation frame.
    AnimationFrame,
    /// In the priority lane.
    Task(Priority),
}

impl Timing {
    /// Stable kebab-case name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::Microtask => "microtask",
            Self::AnimationFrame => "animation-frame",
            Self::Task(Priority::Immediate) => "immediate",
            Self::Task(Priority::UserBlocking) => "user-blocking",
            Self::Task(Priority::Normal) => "normal",
            Self::Task(Priority::Low) => "low",
            Self::Task(Priority::Idle) => "idle",
        }
    }

    const ALL: [Self; 8] = [
        Self::Sync,
        Self::Microtask,
        Self::AnimationFrame,
        Self::Task(Priority::Immediate),
        Self::Task(Priority::UserBlocking),
        Self::Task(Priority::Normal),
        Self::Task(Priority::Low),
        Self::Task(Priority::Idle),
    ];
}

impl fmt::Display for Timing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown timing: {s}"))
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Scheduler tuning.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Time spent on non-expired priority tasks per frame.
    /// Default: 5 ms
    pub frame_budget: Duration,

    /// Upper bound on rounds in [`Scheduler::run_until_idle`], guarding
    /// against work that reschedules itself forever.
    /// Default: 10 000
    pub max_idle_rounds: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            frame_budget: Duration::from_millis(5),
            max_idle_rounds: 10_000,
        }
    }
}

// =============================================================================
// Tasks
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskState {
    Pending,
    Done,
    Cancelled,
}

/// Handle to scheduled work.
#[derive(Clone)]
pub struct TaskHandle {
    state: Rc<Cell<TaskState>>,
}

impl TaskHandle {
    fn new(state: TaskState) -> Self {
        Self {
            state: Rc::new(Cell::new(state)),
        }
    }

    /// Prevent the work from running if it has not run yet.
    pub fn cancel(&self) {
        if self.state.get() == TaskState::Pending {
            self.state.set(TaskState::Cancelled);
        }
    }

    /// Still waiting to run.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.state.get() == TaskState::Pending
    }

    /// Cancelled before it ran.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.get() == TaskState::Cancelled
    }

    /// Ran (or is running).
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.state.get() == TaskState::Done
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("state", &self.state.get())
            .finish()
    }
}

struct Queued {
    work: Box<dyn FnOnce()>,
    state: Rc<Cell<TaskState>>,
}

impl Queued {
    fn run(self) -> bool {
        if self.state.get() != TaskState::Pending {
            return false;
        }
        self.state.set(TaskState::Done);
        (self.work)();
        true
    }
}

struct Timed {
    expires_at: Option<Instant>,
    seq: u64,
    task: Queued,
}

impl Timed {
    fn key(&self) -> (bool, Option<Instant>, u64) {
        (self.expires_at.is_none(), self.expires_at, self.seq)
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

impl PartialEq for Timed {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Timed {}

impl PartialOrd for Timed {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timed {
    // Reversed so the max-heap pops the earliest expiration first.
    fn cmp(&self, other: &Self) -> Ordering {
        other.key().cmp(&self.key())
    }
}

#[derive(Default)]
struct State {
    microtasks: VecDeque<Queued>,
    frame: VecDeque<Queued>,
    tasks: BinaryHeap<Timed>,
    seq: u64,
    frames: u64,
}

// =============================================================================
// Scheduler
// =============================================================================

thread_local! {
    static CURRENT: Scheduler = Scheduler::new(SchedulerConfig::default());
}

/// Cooperative scheduler. Clones share the same queues.
#[derive(Clone)]
pub struct Scheduler {
    state: Rc<RefCell<State>>,
    config: Rc<SchedulerConfig>,
}

impl Scheduler {
    /// Create a scheduler with empty queues.
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            state: Rc::new(RefCell::new(State::default())),
            config: Rc::new(config),
        }
    }

    /// The scheduler of the current thread.
    #[must_use]
    pub fn current() -> Self {
        CURRENT.with(Clone::clone)
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Queue `work` according to `timing`.
    ///
    /// For [`Timing::Sync`] the work has already run when this returns.
    pub fn schedule(&self, timing: Timing, work: impl FnOnce() + 'static) -> TaskHandle {
        if timing == Timing::Sync {
            let handle = TaskHandle::new(TaskState::Done);
            work();
            return handle;
        }

        let handle = TaskHandle::new(TaskState::Pending);
        let queued = Queued {
            work: Box::new(work),
            state: Rc::clone(&handle.state),
        };
        let mut state = self.state.borrow_mut();
        match timing {
            Timing::Sync => {}
            Timing::Microtask => state.microtasks.push_back(queued),
            Timing::AnimationFrame => state.frame.push_back(queued),
            Timing::Task(priority) => {
                state.seq += 1;
                let seq = state.seq;
                state.tasks.push(Timed {
                    expires_at: priority.timeout().map(|t| Instant::now() + t),
                    seq,
                    task: queued,
                });
            }
        }
        tracing::trace!(timing = timing.as_str(), "task scheduled");
        handle
    }

    /// Drain the microtask queue, including microtasks queued meanwhile.
    pub fn run_microtasks(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.state.borrow_mut().microtasks.pop_front();
            match next {
                Some(task) => {
                    if task.run() {
                        ran += 1;
                    }
                }
                None => return ran,
            }
        }
    }

    /// Run one frame within the configured budget.
    pub fn run_frame(&self) -> usize {
        self.frame(Some(self.config.frame_budget))
    }

    /// Run frames until every lane is empty, ignoring the budget.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        let mut rounds = 0;
        while !self.is_idle() {
            if rounds >= self.config.max_idle_rounds {
                tracing::warn!(
                    rounds,
                    pending = self.pending_count(),
                    "scheduler did not settle; giving up"
                );
                break;
            }
            rounds += 1;
            ran += self.frame(None);
        }
        ran
    }

    /// Whether all lanes are empty.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        let state = self.state.borrow();
        state.microtasks.is_empty() && state.frame.is_empty() && state.tasks.is_empty()
    }

    /// Queued entries across all lanes (cancelled ones included until drained).
    #[must_use]
    pub fn pending_count(&self) -> usize {
        let state = self.state.borrow();
        state.microtasks.len() + state.frame.len() + state.tasks.len()
    }

    /// Frames run so far.
    #[must_use]
    pub fn frames(&self) -> u64 {
        self.state.borrow().frames
    }

    fn frame(&self, budget: Option<Duration>) -> usize {
        let frame_no = {
            let mut state = self.state.borrow_mut();
            state.frames += 1;
            state.frames
        };
        let mut ran = self.run_microtasks();

        let callbacks: Vec<Queued> = self.state.borrow_mut().frame.drain(..).collect();
        for task in callbacks {
            if task.run() {
                ran += 1;
            }
            ran += self.run_microtasks();
        }

        let started = Instant::now();
        loop {
            let next = {
                let mut state = self.state.borrow_mut();
                let over_budget = budget.is_some_and(|b| started.elapsed() >= b);
                let take = state
                    .tasks
                    .peek()
                    .is_some_and(|top| !over_budget || top.is_expired(Instant::now()));
                if take { state.tasks.pop() } else { None }
            };
            let Some(timed) = next else { break };
            if timed.task.run() {
                ran += 1;
            }
            ran += self.run_microtasks();
        }

        tracing::trace!(frame = frame_no, ran, "frame finished");
        ran
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Scheduler")
            .field("microtasks", &state.microtasks.len())
            .field("frame", &state.frame.len())
            .field("tasks", &state.tasks.len())
            .field("frames", &state.frames)
            .finish()
    }
}
