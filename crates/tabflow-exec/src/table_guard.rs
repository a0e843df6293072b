//! Table wrapper that checks batch shapes on the way into an operator.
//!
//! A malformed batch from a predecessor is logged, not rejected: the batch is
//! still handed to the operator unmodified.

use std::fmt::Write as _;
use std::sync::Arc;

use tabflow_core::table::{ColReader, Table};
use tabflow_core::types::{ColMeta, GroupKey};
use tabflow_core::Result as CoreResult;

use crate::context::TraceContext;
use crate::error::{Code, ExecError};
use crate::metrics::TransportStats;

/// What a guarded table needs to know about the transport that owns it.
#[derive(Debug)]
pub(crate) struct GuardInfo {
    pub(crate) source_info: Option<String>,
    pub(crate) trace: Option<TraceContext>,
    pub(crate) stats: Arc<TransportStats>,
}

impl GuardInfo {
    fn report(&self, err: &ExecError) {
        self.stats.record_invalid_batch();
        let source = self.source_info.as_deref().unwrap_or("");
        match &self.trace {
            Some(trace) => tracing::warn!(
                source,
                error = %err,
                tracing.id = %trace.trace_id,
                tracing.sampled = trace.sampled,
                "Invalid column reader received from predecessor"
            ),
            None => tracing::warn!(
                source,
                error = %err,
                "Invalid column reader received from predecessor"
            ),
        }
    }
}

/// Pass-through `Table` whose `do_batches` validates every batch first.
pub struct GuardedTable {
    inner: Box<dyn Table>,
    info: Arc<GuardInfo>,
}

impl GuardedTable {
    pub(crate) fn new(inner: Box<dyn Table>, info: Arc<GuardInfo>) -> Self {
        Self { inner, info }
    }
}

impl Table for GuardedTable {
    fn key(&self) -> &GroupKey {
        self.inner.key()
    }

    fn cols(&self) -> &[ColMeta] {
        self.inner.cols()
    }

    fn do_batches(&mut self, f: &mut dyn FnMut(&dyn ColReader) -> CoreResult<()>) -> CoreResult<()> {
        let info = &self.info;
        self.inner.do_batches(&mut |cr: &dyn ColReader| {
            if let Err(err) = validate(cr) {
                info.report(&err);
            }
            f(cr)
        })
    }

    fn done(&mut self) {
        self.inner.done()
    }

    fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Every column in `cr` must report the same length.
pub fn validate(cr: &dyn ColReader) -> Result<(), ExecError> {
    let cols = cr.cols();
    if cols.is_empty() {
        return Ok(());
    }
    let sz = cr.col_len(0);
    if (1..cols.len()).all(|j| cr.col_len(j) == sz) {
        return Ok(());
    }

    // Only build the full listing once we know it is needed.
    let mut lens = String::new();
    for (j, col) in cols.iter().enumerate() {
        if j > 0 {
            lens.push_str(", ");
        }
        let _ = write!(lens, "{}={}", col, cr.col_len(j));
    }
    Err(ExecError::new(
        Code::Internal,
        format!("mismatched column lengths: [{lens}]"),
    ))
}
