//! The operator-facing interface driven by a transport.

use tabflow_core::id::DatasetId;
use tabflow_core::table::Table;
use tabflow_core::types::{GroupKey, Time};

use crate::error::{ExecError, Result};

/// Operator logic as a synchronous state machine.
///
/// A transport guarantees that no two of these methods run at the same time
/// and that calls arrive in the order the upstream producer made them, so
/// implementations need no synchronization of their own.
///
/// Returning an error from any of the four data callbacks finishes the
/// transport: `finish` is then called once with the (annotated) error and no
/// further messages are delivered.
pub trait Transformation: Send {
    fn retract_table(&mut self, src: DatasetId, key: &GroupKey) -> Result<()>;

    fn process(&mut self, src: DatasetId, table: Box<dyn Table>) -> Result<()>;

    fn update_watermark(&mut self, src: DatasetId, time: Time) -> Result<()>;

    fn update_processing_time(&mut self, src: DatasetId, time: Time) -> Result<()>;

    /// Terminal callback; `err` is `None` on normal completion.
    fn finish(&mut self, src: DatasetId, err: Option<ExecError>);

    fn label(&self) -> &str;

    fn set_label(&mut self, label: &str);
}
