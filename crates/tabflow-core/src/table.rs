//! Table and column-reader interfaces, plus a buffered in-memory table.
//!
//! A `Table` is a read-once view over all rows sharing one `GroupKey`. It is
//! delivered as a sequence of batches; each batch is exposed through a
//! `ColReader`. Nothing here checks that columns in a batch agree on length;
//! the exec crate's guarded wrapper does that when batches are iterated.

use crate::error::{Error, Result};
use crate::types::{ColMeta, Column, GroupKey};

/// Read access to one batch of a table.
pub trait ColReader {
    fn key(&self) -> &GroupKey;

    fn cols(&self) -> &[ColMeta];

    /// Row count of the batch, taken from the first column.
    fn len(&self) -> usize {
        if self.cols().is_empty() {
            0
        } else {
            self.col_len(0)
        }
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element count reported by column `j`.
    fn col_len(&self, j: usize) -> usize;

    fn column(&self, j: usize) -> Option<&Column>;
}

/// A stream of batches for one group key.
///
/// Implementations are read once: `do_batches` hands every batch to the
/// callback in order, `done` releases a table that will not be read.
pub trait Table: Send {
    fn key(&self) -> &GroupKey;

    fn cols(&self) -> &[ColMeta];

    fn do_batches(&mut self, f: &mut dyn FnMut(&dyn ColReader) -> Result<()>) -> Result<()>;

    fn done(&mut self);

    fn is_empty(&self) -> bool;
}

/// Concrete `ColReader` over owned columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    key: GroupKey,
    cols: Vec<ColMeta>,
    columns: Vec<Column>,
}

impl Batch {
    pub fn new(key: GroupKey, cols: Vec<ColMeta>, columns: Vec<Column>) -> Result<Self> {
        if cols.len() != columns.len() {
            return Err(Error::Table(format!(
                "batch has {} column descriptors but {} columns",
                cols.len(),
                columns.len()
            )));
        }
        Ok(Self { key, cols, columns })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }
}

impl ColReader for Batch {
    fn key(&self) -> &GroupKey {
        &self.key
    }

    fn cols(&self) -> &[ColMeta] {
        &self.cols
    }

    fn col_len(&self, j: usize) -> usize {
        self.columns.get(j).map(Column::len).unwrap_or(0)
    }

    fn column(&self, j: usize) -> Option<&Column> {
        self.columns.get(j)
    }
}

/// Fully buffered table. Used for tests and for small materialized results.
#[derive(Debug, Clone)]
pub struct MemTable {
    key: GroupKey,
    cols: Vec<ColMeta>,
    batches: Vec<Batch>,
    consumed: bool,
}

impl MemTable {
    pub fn new(key: GroupKey, cols: Vec<ColMeta>) -> Self {
        Self {
            key,
            cols,
            batches: Vec::new(),
            consumed: false,
        }
    }

    /// Append a batch made of `columns`, one per column descriptor.
    pub fn push_batch(&mut self, columns: Vec<Column>) -> Result<()> {
        let batch = Batch::new(self.key.clone(), self.cols.clone(), columns)?;
        self.batches.push(batch);
        Ok(())
    }

    pub fn with_batch(mut self, columns: Vec<Column>) -> Result<Self> {
        self.push_batch(columns)?;
        Ok(self)
    }

    pub fn num_batches(&self) -> usize {
        self.batches.len()
    }

    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(|b| b.len()).sum()
    }
}

impl Table for MemTable {
    fn key(&self) -> &GroupKey {
        &self.key
    }

    fn cols(&self) -> &[ColMeta] {
        &self.cols
    }

    fn do_batches(&mut self, f: &mut dyn FnMut(&dyn ColReader) -> Result<()>) -> Result<()> {
        if self.consumed {
            return Err(Error::Table(format!("table {} already read", self.key)));
        }
        self.consumed = true;
        for batch in std::mem::take(&mut self.batches) {
            f(&batch)?;
        }
        Ok(())
    }

    fn done(&mut self) {
        self.consumed = true;
        self.batches.clear();
    }

    fn is_empty(&self) -> bool {
        self.batches.iter().all(|b| b.is_empty())
    }
}
