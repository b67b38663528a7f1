use crate::error::QueueError;
use crate::frame::FramePacket;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Bounded FIFO channel of frame packets, safe for arbitrarily many
/// concurrent producers and consumers. A stage never owns its queue
/// endpoints; it only holds cloned handles to them.
///
/// Consumers suspend in [`take`](Self::take) while the queue is empty.
/// Ordering across multiple consumers is whatever the scheduler makes of
/// it; nothing beyond per-producer FIFO is promised.
#[derive(Clone)]
pub struct FrameQueue {
    tx: mpsc::Sender<FramePacket>,
    rx: Arc<Mutex<mpsc::Receiver<FramePacket>>>,
    capacity: usize,
}

impl FrameQueue {
    pub fn bounded(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Enqueue a packet, waiting for capacity if the queue is full.
    pub async fn put(&self, packet: FramePacket) -> Result<(), QueueError> {
        self.tx.send(packet).await.map_err(|_| QueueError::Closed)
    }

    /// Dequeue the next packet, suspending while the queue is empty.
    /// Returns `None` once the queue has been closed and drained.
    pub async fn take(&self) -> Option<FramePacket> {
        let mut rx = self.rx.lock().await;
        rx.recv().await
    }

    /// Close the queue. Later `put` calls fail with [`QueueError::Closed`];
    /// `take` keeps draining buffered packets and then returns `None`.
    pub async fn close(&self) {
        let mut rx = self.rx.lock().await;
        rx.close();
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
