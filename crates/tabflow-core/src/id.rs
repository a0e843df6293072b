//! Strongly-typed identifiers used across the runtime.
//!
//! Downstream crates should *not* pass raw uuids or integers around as ids.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifies the upstream producer of a message.
///
/// Every dataset in a materialized graph gets one of these; a transport uses
/// it to tell its transformation which parent a table or watermark came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Ord, PartialOrd)]
#[serde(transparent)]
pub struct DatasetId(Uuid);

impl DatasetId {
    /// Fresh random id (one per dataset when the graph is built).
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// The all-zero id, used for sources that have no upstream dataset.
    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Deterministic id, handy for tests and replayed graphs.
    pub const fn from_u128(v: u128) -> Self {
        Self(Uuid::from_u128(v))
    }

    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DatasetId({})", self.0)
    }
}

impl From<Uuid> for DatasetId {
    fn from(v: Uuid) -> Self {
        Self(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_ids_differ() {
        assert_ne!(DatasetId::random(), DatasetId::random());
    }

    #[test]
    fn deterministic_ids_roundtrip_through_serde() {
        let id = DatasetId::from_u128(42);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.as_uuid()));
        let back: DatasetId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(DatasetId::nil().is_nil());
        assert!(!id.is_nil());
    }
}
