//! Messages carried from an upstream producer to a transport's queue.

use std::fmt;

use tabflow_core::id::DatasetId;
use tabflow_core::table::Table;
use tabflow_core::types::{GroupKey, Time};

use crate::error::ExecError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    RetractTable,
    Process,
    UpdateWatermark,
    UpdateProcessingTime,
    Finish,
}

/// One buffered call on a transport. Every variant records the dataset that
/// produced it.
pub enum Message {
    RetractTable { src: DatasetId, key: GroupKey },
    Process { src: DatasetId, table: Box<dyn Table> },
    UpdateWatermark { src: DatasetId, time: Time },
    UpdateProcessingTime { src: DatasetId, time: Time },
    Finish { src: DatasetId, err: Option<ExecError> },
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::RetractTable { .. } => MessageKind::RetractTable,
            Message::Process { .. } => MessageKind::Process,
            Message::UpdateWatermark { .. } => MessageKind::UpdateWatermark,
            Message::UpdateProcessingTime { .. } => MessageKind::UpdateProcessingTime,
            Message::Finish { .. } => MessageKind::Finish,
        }
    }

    pub fn src(&self) -> DatasetId {
        match self {
            Message::RetractTable { src, .. }
            | Message::Process { src, .. }
            | Message::UpdateWatermark { src, .. }
            | Message::UpdateProcessingTime { src, .. }
            | Message::Finish { src, .. } => *src,
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::RetractTable { src, key } => f
                .debug_struct("RetractTable")
                .field("src", src)
                .field("key", key)
                .finish(),
            Message::Process { src, table } => f
                .debug_struct("Process")
                .field("src", src)
                .field("key", table.key())
                .finish(),
            Message::UpdateWatermark { src, time } => f
                .debug_struct("UpdateWatermark")
                .field("src", src)
                .field("time", time)
                .finish(),
            Message::UpdateProcessingTime { src, time } => f
                .debug_struct("UpdateProcessingTime")
                .field("src", src)
                .field("time", time)
                .finish(),
            Message::Finish { src, err } => f
                .debug_struct("Finish")
                .field("src", src)
                .field("err", err)
                .finish(),
        }
    }
}
