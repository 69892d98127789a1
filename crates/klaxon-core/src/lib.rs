//! Alarm scheduling engine for klaxond
//!
//! This crate is the heart of klaxond, containing:
//! - Next-fire-time calculation for one-time, daily, and weekly alarms
//! - Per-alarm state machine (Idle -> Firing(Primary | Secondary) -> Idle)
//! - Snooze and dismiss semantics
//! - Firing arbitration: at most one alarm owns the primary notification
//!
//! Nothing here reads the clock. Every operation that depends on the time
//! takes `now` from the caller.

mod alarm;
mod arbiter;
mod collection;
mod engine;
mod events;
pub mod schedule;

pub use alarm::*;
pub use arbiter::*;
pub use collection::*;
pub use engine::*;
pub use events::*;
