//! Transports: the scheduling wrapper between producers and an operator.
//!
//! Upstream operators call a transport from any thread. Each call is turned
//! into a `Message` and queued; a single drain task, run by the dispatcher,
//! feeds the queue to the wrapped `Transformation` one message at a time.
//!
//! Scheduler states:
//!
//! ```text
//!   Idle --push--> Running --budget spent / queue empty--> Idle
//!                     |
//!                     +--callback error / Finish drained--> Finished
//! ```
//!
//! Only the pusher (or drain task) that wins the `Idle -> Running` CAS
//! schedules a drain task, so at most one is ever active. That is what lets
//! the transformation run without a lock around its callbacks.

use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};

use tabflow_core::id::DatasetId;
use tabflow_core::stack::{format_source_info, StackEntry};
use tabflow_core::table::Table;
use tabflow_core::types::{GroupKey, Time};

use crate::context::ExecContext;
use crate::dispatcher::Dispatcher;
use crate::error::{ExecError, Result};
use crate::message::Message;
use crate::metrics::TransportStats;
use crate::queue::MessageQueue;
use crate::table_guard::{GuardInfo, GuardedTable};
use crate::transformation::Transformation;

/// Thread-safe front of a transformation.
pub trait Transport: Send + Sync {
    fn retract_table(&self, src: DatasetId, key: GroupKey) -> Result<()>;

    fn process(&self, src: DatasetId, table: Box<dyn Table>) -> Result<()>;

    fn update_watermark(&self, src: DatasetId, time: Time) -> Result<()>;

    fn update_processing_time(&self, src: DatasetId, time: Time) -> Result<()>;

    /// Ask the transformation to finish. No-op once the transport is done.
    fn finish(&self, src: DatasetId, err: Option<ExecError>);

    fn label(&self) -> String;

    fn set_label(&self, label: &str);

    /// Closed once there is no more work to do.
    fn finished(&self) -> FinishedSignal;
}

/// One-shot completion signal. Clones observe the same close.
#[derive(Debug, Clone)]
pub struct FinishedSignal {
    rx: Receiver<()>,
}

impl FinishedSignal {
    pub fn is_closed(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Block until closed.
    pub fn wait(&self) {
        // Nothing is ever sent; recv returns once the sender is dropped.
        let _ = self.rx.recv();
    }

    /// Block until closed or `timeout` elapses. Returns whether it closed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        matches!(
            self.rx.recv_timeout(timeout),
            Err(RecvTimeoutError::Disconnected)
        )
    }

    /// For use with `crossbeam_channel::select!`.
    pub fn receiver(&self) -> &Receiver<()> {
        &self.rx
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SchedulerState {
    Idle = 0,
    Running = 1,
    Finished = 2,
}

impl SchedulerState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => SchedulerState::Idle,
            1 => SchedulerState::Running,
            _ => SchedulerState::Finished,
        }
    }
}

/// Outcome of handing one message to a transformation.
#[derive(Debug)]
pub enum Dispatched {
    /// The callback succeeded; keep draining.
    Delivered,
    /// The callback failed with this (not yet annotated) error.
    Failed(ExecError),
    /// A `Finish` message was delivered, carrying this error.
    Finished(Option<ExecError>),
}

/// Deliver `msg` to the matching callback of `t`.
pub fn dispatch(ctx: &ExecContext, t: &mut dyn Transformation, msg: Message) -> Dispatched {
    let res = match msg {
        Message::RetractTable { src, key } => t.retract_table(src, &key),
        Message::Process { src, table } => {
            let _span = ctx.trace().map(|trace| {
                tracing::info_span!(
                    "process",
                    label = %t.label(),
                    trace_id = %trace.trace_id,
                    parent_span_id = %trace.span_id
                )
                .entered()
            });
            t.process(src, table)
        }
        Message::UpdateWatermark { src, time } => t.update_watermark(src, time),
        Message::UpdateProcessingTime { src, time } => t.update_processing_time(src, time),
        Message::Finish { src, err } => {
            t.finish(src, err.clone());
            return Dispatched::Finished(err);
        }
    };
    match res {
        Ok(()) => Dispatched::Delivered,
        Err(e) => Dispatched::Failed(e),
    }
}

/// Delivers messages to its transformation consecutively, in push order.
#[derive(Clone)]
pub struct ConsecutiveTransport {
    inner: Arc<Inner>,
}

struct Inner {
    dispatcher: Arc<dyn Dispatcher>,

    // Checked out by the active drain task for the length of a drain round.
    transformation: Mutex<Option<Box<dyn Transformation>>>,
    label: Mutex<String>,

    messages: MessageQueue,
    source_info: Option<String>,
    guard: Arc<GuardInfo>,
    stats: Arc<TransportStats>,

    finished_tx: Mutex<Option<Sender<()>>>,
    finished_rx: Receiver<()>,
    err: Mutex<Option<ExecError>>,

    state: AtomicU8,
    inflight: AtomicI64,
}

impl ConsecutiveTransport {
    /// `stack` is the planner's call stack for the node; it is only used to
    /// annotate errors and may be empty.
    pub fn new(
        ctx: &ExecContext,
        dispatcher: Arc<dyn Dispatcher>,
        transformation: Box<dyn Transformation>,
        stack: &[StackEntry],
    ) -> Self {
        let source_info = format_source_info(stack);
        let stats = Arc::new(TransportStats::new());
        let guard = Arc::new(GuardInfo {
            source_info: source_info.clone(),
            trace: ctx.trace().cloned(),
            stats: Arc::clone(&stats),
        });
        let (finished_tx, finished_rx) = bounded(0);
        let label = transformation.label().to_string();
        Self {
            inner: Arc::new(Inner {
                dispatcher,
                transformation: Mutex::new(Some(transformation)),
                label: Mutex::new(label),
                messages: MessageQueue::new(),
                source_info,
                guard,
                stats,
                finished_tx: Mutex::new(Some(finished_tx)),
                finished_rx,
                err: Mutex::new(None),
                state: AtomicU8::new(SchedulerState::Idle as u8),
                inflight: AtomicI64::new(0),
            }),
        }
    }

    /// Terminal error, if the transport finished with one.
    pub fn err(&self) -> Option<ExecError> {
        self.inner.err()
    }

    pub fn state(&self) -> SchedulerState {
        SchedulerState::from_u8(self.inner.state.load(Ordering::SeqCst))
    }

    pub fn source_info(&self) -> Option<&str> {
        self.inner.source_info.as_deref()
    }

    pub fn stats(&self) -> &TransportStats {
        &self.inner.stats
    }

    /// Messages pushed but not yet drained (advisory).
    pub fn queued(&self) -> usize {
        self.inner.messages.len()
    }
}

impl Transport for ConsecutiveTransport {
    fn retract_table(&self, src: DatasetId, key: GroupKey) -> Result<()> {
        if self.inner.is_finished() {
            return self.inner.err_result();
        }
        self.inner.push_msg(Message::RetractTable { src, key });
        Ok(())
    }

    fn process(&self, src: DatasetId, table: Box<dyn Table>) -> Result<()> {
        if self.inner.is_finished() {
            return self.inner.err_result();
        }
        let table = GuardedTable::new(table, Arc::clone(&self.inner.guard));
        self.inner.push_msg(Message::Process {
            src,
            table: Box::new(table),
        });
        Ok(())
    }

    fn update_watermark(&self, src: DatasetId, time: Time) -> Result<()> {
        if self.inner.is_finished() {
            return self.inner.err_result();
        }
        self.inner.push_msg(Message::UpdateWatermark { src, time });
        Ok(())
    }

    fn update_processing_time(&self, src: DatasetId, time: Time) -> Result<()> {
        if self.inner.is_finished() {
            return self.inner.err_result();
        }
        self.inner
            .push_msg(Message::UpdateProcessingTime { src, time });
        Ok(())
    }

    fn finish(&self, src: DatasetId, err: Option<ExecError>) {
        if self.inner.is_finished() {
            return;
        }
        self.inner.push_msg(Message::Finish { src, err });
    }

    fn label(&self) -> String {
        lock(&self.inner.label).clone()
    }

    fn set_label(&self, label: &str) {
        *lock(&self.inner.label) = label.to_string();
    }

    fn finished(&self) -> FinishedSignal {
        FinishedSignal {
            rx: self.inner.finished_rx.clone(),
        }
    }
}

impl Inner {
    fn is_finished(&self) -> bool {
        matches!(
            self.finished_rx.try_recv(),
            Err(TryRecvError::Disconnected)
        )
    }

    fn err(&self) -> Option<ExecError> {
        lock(&self.err).clone()
    }

    fn err_result(&self) -> Result<()> {
        match self.err() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn set_err(&self, err: ExecError) {
        *lock(&self.err) = Some(err);
    }

    fn push_msg(self: &Arc<Self>, msg: Message) {
        self.messages.push(msg);
        self.inflight.fetch_add(1, Ordering::SeqCst);
        self.schedule();
    }

    /// There is work available: make sure exactly one drain task runs.
    fn schedule(self: &Arc<Self>) {
        if self.try_transition(SchedulerState::Idle, SchedulerState::Running) {
            let this = Arc::clone(self);
            self.dispatcher
                .schedule(Box::new(move |ctx: &ExecContext, throughput: usize| {
                    this.process_messages(ctx, throughput)
                }));
        }
    }

    fn try_transition(&self, old: SchedulerState, new: SchedulerState) -> bool {
        self.state
            .compare_exchange(old as u8, new as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn transition(&self, new: SchedulerState) {
        self.state.store(new as u8, Ordering::SeqCst);
    }

    /// Take the transformation for a drain round, bringing its label up to
    /// date with any `set_label` made since the last round. Also returns the
    /// label it was handed.
    fn checkout(&self) -> Option<(Box<dyn Transformation>, String)> {
        let mut t = lock(&self.transformation).take()?;
        let label = lock(&self.label).clone();
        if t.label() != label {
            t.set_label(&label);
        }
        Some((t, label))
    }

    /// Must happen before leaving `Running`, so the next drain task finds it.
    ///
    /// A label the transformation gave itself during the round is copied
    /// back, unless `set_label` changed the cell in the meantime; that newer
    /// label reaches the transformation at the next checkout.
    fn checkin(&self, t: Box<dyn Transformation>, synced: &str) {
        {
            let mut label = lock(&self.label);
            if t.label() != synced && *label == synced {
                *label = t.label().to_string();
            }
        }
        *lock(&self.transformation) = Some(t);
    }

    fn close_finished(&self) {
        drop(lock(&self.finished_tx).take());
    }

    /// Body of a drain task.
    fn process_messages(self: &Arc<Self>, ctx: &ExecContext, throughput: usize) {
        self.stats.record_drain_task();
        let throughput = throughput.max(1);
        loop {
            let Some((mut t, synced)) = self.checkout() else {
                tracing::error!(
                    label = %lock(&self.label),
                    "drain task found no transformation to run"
                );
                return;
            };

            let mut processed = 0;
            while let Some(msg) = self.messages.pop() {
                self.inflight.fetch_sub(1, Ordering::SeqCst);
                let src = msg.src();
                let kind = msg.kind();
                tracing::trace!(?kind, %src, "delivering message");

                match dispatch(ctx, t.as_mut(), msg) {
                    Dispatched::Delivered => self.stats.record_delivered(),
                    Dispatched::Failed(err) => {
                        self.stats.record_delivered();
                        let err = err.with_source_info(self.source_info.clone());
                        self.set_err(err.clone());
                        if self.try_transition(SchedulerState::Running, SchedulerState::Finished) {
                            tracing::debug!(?kind, error = %err, "transport finished with error");
                            t.finish(src, Some(err));
                            self.checkin(t, &synced);
                            self.close_finished();
                        } else {
                            self.checkin(t, &synced);
                        }
                        return;
                    }
                    Dispatched::Finished(err) => {
                        self.stats.record_delivered();
                        // The transformation saw the raw error; the stored
                        // one names this operator, like callback errors.
                        if let Some(err) = err {
                            self.set_err(err.with_source_info(self.source_info.clone()));
                        }
                        self.checkin(t, &synced);
                        if self.try_transition(SchedulerState::Running, SchedulerState::Finished) {
                            tracing::debug!(%src, "transport finished");
                            self.close_finished();
                        }
                        return;
                    }
                }

                processed += 1;
                if processed >= throughput {
                    // Yield the worker and queue up behind everyone else.
                    self.checkin(t, &synced);
                    self.transition(SchedulerState::Idle);
                    self.stats.record_reschedule();
                    self.schedule();
                    return;
                }
            }

            self.checkin(t, &synced);
            self.transition(SchedulerState::Idle);
            // A push may have landed between the last empty pop and going
            // idle; its pusher saw Running and did not schedule. This check
            // must happen in the idle state.
            if self.inflight.load(Ordering::SeqCst) > 0
                && self.try_transition(SchedulerState::Idle, SchedulerState::Running)
            {
                continue;
            }
            return;
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
