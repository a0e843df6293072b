//! Convenient re-exports for downstream crates.

pub use crate::config::ExecConfig;
pub use crate::error::{Error, Result};
pub use crate::id::DatasetId;
pub use crate::stack::{format_source_info, Location, Position, StackEntry};
pub use crate::table::{Batch, ColReader, MemTable, Table};
pub use crate::types::{ColMeta, ColType, Column, GroupKey, Scalar, Time};
