//! Lightweight value/column types for tables flowing through the runtime.
//!
//! Kept deliberately small: operators convert to whatever columnar layout
//! they want internally. The runtime only needs keys, metadata, and lengths.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Nanosecond timestamp used for watermarks and processing time.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Time(i64);

impl Time {
    pub const MIN: Time = Time(i64::MIN);
    pub const MAX: Time = Time(i64::MAX);

    pub const fn from_nanos(ns: i64) -> Self {
        Self(ns)
    }

    pub const fn nanos(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

impl From<i64> for Time {
    fn from(ns: i64) -> Self {
        Self(ns)
    }
}

/// Column element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColType {
    Bool,
    Int,
    UInt,
    Float,
    String,
    Time,
}

impl fmt::Display for ColType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ColType::Bool => "bool",
            ColType::Int => "int",
            ColType::UInt => "uint",
            ColType::Float => "float",
            ColType::String => "string",
            ColType::Time => "time",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColMeta {
    pub label: String,
    pub ty: ColType,
}

impl ColMeta {
    pub fn new(label: impl Into<String>, ty: ColType) -> Self {
        Self {
            label: label.into(),
            ty,
        }
    }
}

impl fmt::Display for ColMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.label, self.ty)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Time(Time),
}

impl Scalar {
    /// Type of a non-null value. `Null` has no type of its own.
    pub fn col_type(&self) -> Option<ColType> {
        match self {
            Scalar::Null => None,
            Scalar::Bool(_) => Some(ColType::Bool),
            Scalar::Int(_) => Some(ColType::Int),
            Scalar::UInt(_) => Some(ColType::UInt),
            Scalar::Float(_) => Some(ColType::Float),
            Scalar::Str(_) => Some(ColType::String),
            Scalar::Time(_) => Some(ColType::Time),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => f.write_str("null"),
            Scalar::Bool(v) => write!(f, "{v}"),
            Scalar::Int(v) => write!(f, "{v}"),
            Scalar::UInt(v) => write!(f, "{v}"),
            Scalar::Float(v) => write!(f, "{v}"),
            Scalar::Str(v) => f.write_str(v),
            Scalar::Time(v) => write!(f, "{v}"),
        }
    }
}

/// One column of a batch. Length is the only thing the runtime inspects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub values: Vec<Scalar>,
}

impl Column {
    pub fn new(values: Vec<Scalar>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Identifies one partition ("table") of the stream: the values of the
/// grouping columns shared by every row in it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupKey {
    cols: Vec<ColMeta>,
    values: Vec<Scalar>,
}

impl GroupKey {
    /// Build a key from matching column metadata and values.
    pub fn new(cols: Vec<ColMeta>, values: Vec<Scalar>) -> crate::Result<Self> {
        if cols.len() != values.len() {
            return Err(crate::Error::Table(format!(
                "group key has {} columns but {} values",
                cols.len(),
                values.len()
            )));
        }
        Ok(Self { cols, values })
    }

    /// The key of an ungrouped stream.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn cols(&self) -> &[ColMeta] {
        &self.cols
    }

    pub fn values(&self) -> &[Scalar] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.cols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cols.is_empty()
    }

    pub fn value(&self, label: &str) -> Option<&Scalar> {
        self.cols
            .iter()
            .position(|c| c.label == label)
            .map(|i| &self.values[i])
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (c, v)) in self.cols.iter().zip(&self.values).enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}={}", c.label, v)?;
        }
        f.write_str("}")
    }
}
