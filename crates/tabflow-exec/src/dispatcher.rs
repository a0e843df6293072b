//! Work scheduling for transports.
//!
//! A `Dispatcher` runs scheduled drain tasks at some later point on some
//! worker, passing each one the throughput budget it may spend before
//! yielding. `PoolDispatcher` is the production implementation: a fixed pool
//! of threads sharing one unbounded task queue.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};

use tabflow_core::config::ExecConfig;

use crate::context::ExecContext;
use crate::error::{ExecError, Result};

/// A unit of scheduled work: called with the query context and the
/// throughput budget for this invocation.
pub type Task = Box<dyn FnOnce(&ExecContext, usize) + Send + 'static>;

pub trait Dispatcher: Send + Sync {
    /// Run `task` later. Must not run it inline on the caller's stack.
    fn schedule(&self, task: Task);
}

/// Fixed-size worker pool.
///
/// Panics inside tasks are caught: the worker survives, the first failure is
/// kept as the dispatcher's error, and the query context is canceled so the
/// remaining operators wind down.
pub struct PoolDispatcher {
    ctx: ExecContext,
    config: ExecConfig,
    tx: Mutex<Option<Sender<Task>>>,
    rx: Receiver<Task>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    err: Arc<Mutex<Option<ExecError>>>,
}

impl PoolDispatcher {
    pub fn new(config: ExecConfig, ctx: ExecContext) -> Result<Self> {
        config.validate()?;
        let (tx, rx) = unbounded();
        Ok(Self {
            ctx,
            config,
            tx: Mutex::new(Some(tx)),
            rx,
            workers: Mutex::new(Vec::new()),
            err: Arc::new(Mutex::new(None)),
        })
    }

    /// Build and start a pool in one go.
    pub fn start_new(config: ExecConfig, ctx: ExecContext) -> Result<Arc<Self>> {
        let pool = Arc::new(Self::new(config, ctx)?);
        pool.start()?;
        Ok(pool)
    }

    pub fn context(&self) -> &ExecContext {
        &self.ctx
    }

    /// Spawn the worker threads. Tasks scheduled earlier are already queued
    /// and run as soon as workers come up. Calling twice is a no-op.
    pub fn start(&self) -> Result<()> {
        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        if !workers.is_empty() {
            return Ok(());
        }
        for n in 0..self.config.concurrency {
            let rx = self.rx.clone();
            let ctx = self.ctx.clone();
            let err = Arc::clone(&self.err);
            let throughput = self.config.throughput;
            let handle = thread::Builder::new()
                .name(format!("{}-{}", self.config.worker_name_prefix, n))
                .spawn(move || {
                    while let Ok(task) = rx.recv() {
                        run_task(&ctx, throughput, task, &err);
                    }
                })
                .map_err(|e| ExecError::Dispatcher(format!("spawn worker {n}: {e}")))?;
            workers.push(handle);
        }
        tracing::debug!(
            workers = self.config.concurrency,
            throughput = self.config.throughput,
            "dispatcher started"
        );
        Ok(())
    }

    /// Stop accepting tasks, let workers drain what is queued, and join them.
    ///
    /// Returns the first task panic, if any occurred.
    pub fn stop(&self) -> Result<()> {
        drop(
            self.tx
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );
        let workers = std::mem::take(
            &mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner),
        );
        let current = thread::current().id();
        for handle in workers {
            // The last handle to the pool may be dropped by a task running on
            // one of its own workers; that worker exits once the queue drains.
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                record_err(
                    &self.err,
                    ExecError::Dispatcher("worker thread terminated abnormally".into()),
                );
            }
        }
        match self.err() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// First failure observed by any worker.
    pub fn err(&self) -> Option<ExecError> {
        self.err
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Dispatcher for PoolDispatcher {
    fn schedule(&self, task: Task) {
        let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        match tx.as_ref() {
            Some(tx) => {
                // The pool holds a receiver for as long as it lives.
                let _ = tx.send(task);
            }
            None => tracing::error!("dispatcher stopped; dropping scheduled task"),
        }
    }
}

impl Drop for PoolDispatcher {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn run_task(ctx: &ExecContext, throughput: usize, task: Task, err: &Mutex<Option<ExecError>>) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| task(ctx, throughput))) {
        let msg = panic_message(payload.as_ref());
        tracing::error!(panic = %msg, "scheduled task panicked");
        record_err(err, ExecError::Dispatcher(format!("task panicked: {msg}")));
        ctx.cancel();
    }
}

fn record_err(slot: &Mutex<Option<ExecError>>, e: ExecError) {
    let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
    if slot.is_none() {
        *slot = Some(e);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config(concurrency: usize, throughput: usize) -> ExecConfig {
        ExecConfig {
            concurrency,
            throughput,
            ..ExecConfig::default()
        }
    }

    #[test]
    fn runs_every_task_with_configured_budget() {
        let pool = PoolDispatcher::start_new(config(3, 7), ExecContext::new()).unwrap();
        let budget_sum = Arc::new(AtomicUsize::new(0));
        for _ in 0..50 {
            let budget_sum = Arc::clone(&budget_sum);
            pool.schedule(Box::new(move |_ctx: &ExecContext, throughput: usize| {
                budget_sum.fetch_add(throughput, Ordering::SeqCst);
            }));
        }
        pool.stop().unwrap();
        assert_eq!(budget_sum.load(Ordering::SeqCst), 50 * 7);
    }

    #[test]
    fn tasks_scheduled_before_start_run_after_start() {
        let pool = PoolDispatcher::new(config(1, 1), ExecContext::new()).unwrap();
        let ran = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&ran);
        pool.schedule(Box::new(move |_: &ExecContext, _: usize| {
            r.fetch_add(1, Ordering::SeqCst);
        }));
        pool.start().unwrap();
        pool.stop().unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_task_is_isolated_and_reported() {
        let ctx = ExecContext::new();
        let pool = PoolDispatcher::start_new(config(1, 1), ctx.clone()).unwrap();
        let ran = Arc::new(AtomicUsize::new(0));
        pool.schedule(Box::new(|_: &ExecContext, _: usize| panic!("operator exploded")));
        let r = Arc::clone(&ran);
        pool.schedule(Box::new(move |_: &ExecContext, _: usize| {
            r.fetch_add(1, Ordering::SeqCst);
        }));
        let err = pool.stop().unwrap_err();
        assert!(err.to_string().contains("operator exploded"), "{err}");
        // the single worker survived and ran the next task
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert!(ctx.is_canceled());
    }

    #[test]
    fn schedule_after_stop_is_dropped() {
        let pool = PoolDispatcher::start_new(config(1, 1), ExecContext::new()).unwrap();
        pool.stop().unwrap();
        let ran = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&ran);
        pool.schedule(Box::new(move |_: &ExecContext, _: usize| {
            r.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn rejects_zero_sized_pool() {
        assert!(PoolDispatcher::new(config(0, 1), ExecContext::new()).is_err());
    }
}
