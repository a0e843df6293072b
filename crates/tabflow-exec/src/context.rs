//! Execution context handed to every drain task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{ExecError, Result};

/// Identifiers of the distributed trace a query runs under, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    pub trace_id: String,
    pub span_id: String,
    pub sampled: bool,
}

impl TraceContext {
    pub fn new(trace_id: impl Into<String>, span_id: impl Into<String>, sampled: bool) -> Self {
        Self {
            trace_id: trace_id.into(),
            span_id: span_id.into(),
            sampled,
        }
    }
}

/// Per-query context. Clones share the cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct ExecContext {
    trace: Option<TraceContext>,
    canceled: Arc<AtomicBool>,
}

impl ExecContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trace(mut self, trace: TraceContext) -> Self {
        self.trace = Some(trace);
        self
    }

    pub fn trace(&self) -> Option<&TraceContext> {
        self.trace.as_ref()
    }

    /// Request cancellation. Operators observe it through `check`.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Release);
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }

    /// `Err(Canceled)` once `cancel` has been called. Operators return this
    /// from their callbacks, which finishes their transport like any error.
    pub fn check(&self) -> Result<()> {
        if self.is_canceled() {
            Err(ExecError::Canceled("execution context canceled".into()))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Code;

    #[test]
    fn clones_share_cancellation() {
        let ctx = ExecContext::new();
        let other = ctx.clone();
        assert!(other.check().is_ok());
        ctx.cancel();
        assert!(other.is_canceled());
        assert_eq!(other.check().unwrap_err().code(), Code::Canceled);
    }

    #[test]
    fn trace_is_optional() {
        assert!(ExecContext::new().trace().is_none());
        let ctx = ExecContext::new().with_trace(TraceContext::new("abc", "def", true));
        assert_eq!(ctx.trace().map(|t| t.trace_id.as_str()), Some("abc"));
    }
}
