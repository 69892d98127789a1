//! Shared utilities for klaxon
//!
//! This crate provides:
//! - ID types (AlarmId, ClientId)
//! - Wall-clock time utilities (mock time, time of day, weekday parsing)
//! - Error types
//! - Default paths for the socket, config file and data directory

mod error;
mod ids;
mod paths;
mod time;

pub use error::*;
pub use ids::*;
pub use paths::*;
pub use time::*;
