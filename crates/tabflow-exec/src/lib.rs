#![forbid(unsafe_code)]
//! tabflow-exec: transports, message queues, and the dispatcher pool.
//!
//! Every edge of a materialized operator graph gets a `ConsecutiveTransport`.
//! Producers call it from any thread; it buffers the calls and replays them
//! to the downstream `Transformation` one at a time on a `Dispatcher` worker.

pub mod context;
pub mod dispatcher;
pub mod error;
pub mod message;
pub mod metrics;
pub mod queue;
pub mod table_guard;
pub mod transformation;
pub mod transport;

pub use context::{ExecContext, TraceContext};
pub use dispatcher::{Dispatcher, PoolDispatcher, Task};
pub use error::{Code, ExecError, Result};
pub use message::{Message, MessageKind};
pub use metrics::{TransportStats, TransportStatsSnapshot};
pub use queue::MessageQueue;
pub use table_guard::GuardedTable;
pub use transformation::Transformation;
pub use transport::{ConsecutiveTransport, FinishedSignal, SchedulerState, Transport};
