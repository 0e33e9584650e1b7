#![forbid(unsafe_code)]

//! Single-threaded push primitives used to wire sources to anchors.
//!
//! - [`Observable`]: a version-tracked value cell that replays its current
//!   value to new subscribers on request.
//! - [`Subject`]: a multicast event stream with `next` / `error` / `complete`
//!   and standard terminal semantics.
//! - [`Subscription`]: RAII guard; dropping or unsubscribing releases the
//!   callback. Unsubscribing twice is a no-op.
//! - [`SubscriptionScope`]: owns a group of subscriptions for one anchor.
//!
//! # Architecture
//!
//! Both `Observable<T>` and `Subject<T, E>` use `Rc<RefCell<..>>` for shared
//! ownership. Subscribers are stored as `Weak` callbacks and cleaned up
//! lazily during notification; the strong side lives in the
//! [`Subscription`]. Callbacks are always invoked with no internal borrow
//! held, so a callback may push into the same cell or stream.
//!
//! # Invariants
//!
//! 1. Subscribers are notified in registration order.
//! 2. `Observable::set` with an equal value is a no-op (no version bump, no
//!    notifications).
//! 3. A `Subject` delivers nothing after its first `error` or `complete`.
//! 4. After a [`Subscription`] is released its callback never runs again.

pub mod observable;
pub mod scope;
pub mod subject;
pub mod subscription;

pub use observable::Observable;
pub use scope::SubscriptionScope;
pub use subject::{Event, Subject};
pub use subscription::Subscription;
