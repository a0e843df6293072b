#![forbid(unsafe_code)]
//! tabflow-core: shared data types for the tabflow execution runtime.
//!
//! Nothing in here schedules work or spawns threads. The exec crate builds
//! transports and dispatchers on top of these types.

pub mod config;
pub mod error;
pub mod id;
pub mod prelude;
pub mod stack;
pub mod table;
pub mod types;

pub use error::{Error, Result};
