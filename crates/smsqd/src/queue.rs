//! Bounded dispatch queue between the producer and the worker pool.
//!
//! Built on a bounded `tokio::sync::mpsc` channel. The sending half is owned
//! by the producer and closing it (dropping it) closes the queue; buffered
//! messages stay retrievable until consumed. The receiving half is shared by
//! all workers behind an async mutex, so each message is delivered to
//! exactly one worker, in FIFO order across the whole queue.

use std::sync::Arc;

use smsq_core::Message;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};

/// Default number of messages the queue can buffer.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Errors from a non-blocking enqueue. The rejected message is handed back.
#[derive(Debug, Error)]
pub enum EnqueueError {
    /// The queue is at capacity
    #[error("dispatch queue is full")]
    Full(Message),

    /// Every receiver has been dropped
    #[error("dispatch queue is closed")]
    Closed(Message),
}

impl EnqueueError {
    /// Recovers the message that could not be enqueued.
    pub fn into_message(self) -> Message {
        match self {
            Self::Full(message) | Self::Closed(message) => message,
        }
    }
}

/// Creates a dispatch queue with the given capacity.
///
/// `capacity` must be non-zero; configuration validation enforces this.
pub fn dispatch_queue(capacity: usize) -> (QueueSender, QueueReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        QueueSender { tx },
        QueueReceiver {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

/// Producer side of the dispatch queue.
///
/// Not `Clone`: a single owner decides when the queue closes.
#[derive(Debug)]
pub struct QueueSender {
    tx: mpsc::Sender<Message>,
}

impl QueueSender {
    /// Enqueues without waiting.
    ///
    /// # Errors
    ///
    /// - `EnqueueError::Full` if the queue is at capacity
    /// - `EnqueueError::Closed` if no receiver remains
    pub fn try_enqueue(&self, message: Message) -> Result<(), EnqueueError> {
        self.tx.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(m) => EnqueueError::Full(m),
            mpsc::error::TrySendError::Closed(m) => EnqueueError::Closed(m),
        })
    }

    /// Number of messages currently buffered.
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Closes the queue for new input.
    ///
    /// Consuming `self` makes a second close, or an enqueue after close,
    /// impossible.
    pub fn close(self) {
        drop(self.tx);
    }
}

/// Consumer side of the dispatch queue, cheap to clone across workers.
#[derive(Debug, Clone)]
pub struct QueueReceiver {
    rx: Arc<Mutex<mpsc::Receiver<Message>>>,
}

impl QueueReceiver {
    /// Waits for the next message.
    ///
    /// Returns `None` once the queue is closed and empty. Cancel safe: if the
    /// future is dropped before completing, no message is lost.
    pub async fn recv(&self) -> Option<Message> {
        let mut rx = self.rx.lock().await;
        rx.recv().await
    }
}
