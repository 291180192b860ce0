//! Concurrency and caching support for shift tracking.
//!
//! - [`queue::SerialQueue`]: runs async operations one at a time, in order
//! - [`throttle::Throttle`]: sliding-window rate limiting over a
//!   [`collections::LinkedList`] ledger
//! - [`cache::TtlCache`]: single-flight TTL cache over a path-addressed store
//! - [`records::reduce`]: turns clock events into worked and break time
//! - [`tracker::ShiftTracker`]: ties the above together for one member

pub mod cache;
pub mod clock;
pub mod collections;
pub mod config;
pub mod logging;
pub mod queue;
pub mod records;
pub mod throttle;
pub mod tracker;

pub use cache::{MemoryStore, Snapshot, Store, TtlCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use collections::LinkedList;
pub use config::Config;
pub use queue::{Completion, SerialQueue};
pub use records::{reduce, ClockEvent, EventKind, TimeSummary, Timeline};
pub use throttle::{Admission, Throttle, ThrottleObserver};
pub use tracker::ShiftTracker;
