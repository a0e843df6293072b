//! Unbounded FIFO between one edge's producers and its drain task.

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::message::Message;

/// Multi-producer queue of messages. `pop` never blocks.
///
/// The queue owns both channel ends, so it can never disconnect.
pub struct MessageQueue {
    tx: Sender<Message>,
    rx: Receiver<Message>,
}

impl MessageQueue {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub fn push(&self, msg: Message) {
        // Only fails when every receiver is gone; we hold one.
        let _ = self.tx.send(msg);
    }

    /// Oldest pending message, or `None` if nothing is queued right now.
    pub fn pop(&self) -> Option<Message> {
        self.rx.try_recv().ok()
    }

    /// Advisory; may be stale by the time the caller looks at it.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new()
    }
}
