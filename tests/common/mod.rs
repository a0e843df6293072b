//! Shared transformations and table builders for integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tabflow_core::id::DatasetId;
use tabflow_core::table::{MemTable, Table};
use tabflow_core::types::{ColMeta, ColType, Column, GroupKey, Scalar, Time};
use tabflow_exec::{Code, ExecError, Result, Transformation, Transport};

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Retract(DatasetId),
    Process(DatasetId, Vec<usize>),
    Watermark(DatasetId, i64),
    ProcessingTime(DatasetId, i64),
    Finish(DatasetId, Option<String>),
}

/// Records every callback. Optionally fails the n-th `process` call.
pub struct Echo {
    label: String,
    events: Arc<Mutex<Vec<Event>>>,
    fail_on_process: Option<usize>,
    processed: usize,
    active: Arc<AtomicBool>,
    overlaps: Arc<AtomicUsize>,
}

impl Echo {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            events: Arc::new(Mutex::new(Vec::new())),
            fail_on_process: None,
            processed: 0,
            active: Arc::new(AtomicBool::new(false)),
            overlaps: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing_on(mut self, nth_process: usize) -> Self {
        self.fail_on_process = Some(nth_process);
        self
    }

    pub fn events(&self) -> Arc<Mutex<Vec<Event>>> {
        Arc::clone(&self.events)
    }

    /// Counts callbacks that started while another was still running.
    pub fn overlaps(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.overlaps)
    }

    fn enter(&self) {
        if self.active.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn exit(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    fn record(&self, e: Event) {
        self.events.lock().unwrap().push(e);
    }
}

impl Transformation for Echo {
    fn retract_table(&mut self, src: DatasetId, _key: &GroupKey) -> Result<()> {
        self.enter();
        self.record(Event::Retract(src));
        self.exit();
        Ok(())
    }

    fn process(&mut self, src: DatasetId, mut table: Box<dyn Table>) -> Result<()> {
        self.enter();
        self.processed += 1;
        if self.fail_on_process == Some(self.processed) {
            table.done();
            self.exit();
            return Err(ExecError::new(Code::Internal, "boom"));
        }
        // column lengths of every batch, in order
        let mut col_lens = Vec::new();
        let res = table.do_batches(&mut |cr| {
            col_lens.extend((0..cr.cols().len()).map(|j| cr.col_len(j)));
            Ok(())
        });
        self.record(Event::Process(src, col_lens));
        self.exit();
        res.map_err(ExecError::from)
    }

    fn update_watermark(&mut self, src: DatasetId, time: Time) -> Result<()> {
        self.enter();
        self.record(Event::Watermark(src, time.nanos()));
        self.exit();
        Ok(())
    }

    fn update_processing_time(&mut self, src: DatasetId, time: Time) -> Result<()> {
        self.enter();
        self.record(Event::ProcessingTime(src, time.nanos()));
        self.exit();
        Ok(())
    }

    fn finish(&mut self, src: DatasetId, err: Option<ExecError>) {
        self.enter();
        self.record(Event::Finish(src, err.map(|e| e.to_string())));
        self.exit();
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn set_label(&mut self, label: &str) {
        self.label = label.to_string();
    }
}

/// Passes every table and watermark on to a downstream transport, tagging
/// them with its own dataset id.
pub struct Forward {
    id: DatasetId,
    label: String,
    downstream: Arc<dyn Transport>,
}

impl Forward {
    pub fn new(id: DatasetId, downstream: Arc<dyn Transport>) -> Self {
        Self {
            id,
            label: "forward".to_string(),
            downstream,
        }
    }
}

impl Transformation for Forward {
    fn retract_table(&mut self, _src: DatasetId, key: &GroupKey) -> Result<()> {
        self.downstream.retract_table(self.id, key.clone())
    }

    fn process(&mut self, _src: DatasetId, mut table: Box<dyn Table>) -> Result<()> {
        // Re-buffer: tables are read-once.
        let mut copy = MemTable::new(table.key().clone(), table.cols().to_vec());
        table.do_batches(&mut |cr| {
            let columns = (0..cr.cols().len())
                .map(|j| cr.column(j).cloned().unwrap_or_else(|| Column::new(vec![])))
                .collect();
            copy.push_batch(columns)
        })?;
        self.downstream.process(self.id, Box::new(copy))
    }

    fn update_watermark(&mut self, _src: DatasetId, time: Time) -> Result<()> {
        self.downstream.update_watermark(self.id, time)
    }

    fn update_processing_time(&mut self, _src: DatasetId, time: Time) -> Result<()> {
        self.downstream.update_processing_time(self.id, time)
    }

    fn finish(&mut self, _src: DatasetId, err: Option<ExecError>) {
        self.downstream.finish(self.id, err);
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn set_label(&mut self, label: &str) {
        self.label = label.to_string();
    }
}

/// Single-batch table whose columns have the given lengths.
pub fn table_with_lens(lens: &[usize]) -> Box<dyn Table> {
    let cols = (0..lens.len())
        .map(|i| ColMeta::new(format!("c{i}"), ColType::Int))
        .collect();
    let columns = lens
        .iter()
        .map(|n| Column::new((0..*n as i64).map(Scalar::Int).collect()))
        .collect();
    Box::new(
        MemTable::new(GroupKey::empty(), cols)
            .with_batch(columns)
            .expect("column count matches"),
    )
}

pub fn table(rows: usize) -> Box<dyn Table> {
    table_with_lens(&[rows])
}
