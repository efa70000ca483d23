//! Per-entry-type bounded queue.
//!
//! A FIFO of entries plus a semaphore counting free slots. A
//! `crossbeam_channel` bounded channel already blocks the sender once full
//! and wakes it as the receiver end drains — that *is* the counting
//! semaphore, so no separate permit type is needed.

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};

/// Bounded, multi-producer single-consumer queue of entries of type `T`.
pub(crate) struct BoundedQueue<T> {
    sender: Sender<T>,
    receiver: Receiver<T>,
}

impl<T> BoundedQueue<T> {
    /// Create a queue with the given capacity (number of in-flight entries).
    pub(crate) fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self { sender, receiver }
    }

    /// Clone of the sending half; producers block on `send` when full.
    pub(crate) fn sender(&self) -> Sender<T> {
        self.sender.clone()
    }

    /// Clone of the receiving half, handed to the dequeue action.
    pub(crate) fn receiver(&self) -> Receiver<T> {
        self.receiver.clone()
    }
}

/// Pop one item without blocking; used by dequeue actions that know an item
/// is already present because they were only posted after a successful
/// bounded send.
pub(crate) fn try_take<T>(receiver: &Receiver<T>) -> Option<T> {
    match receiver.try_recv() {
        Ok(item) => Some(item),
        Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
    }
}
