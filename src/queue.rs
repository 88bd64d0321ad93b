use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::Notify;

/// Unbounded FIFO of pending audio chunks, shared between the transport
/// producer and the cycle consumer.
///
/// `clear` may race an in-flight `push`; a chunk enqueued at the same
/// instant as a clear is allowed to be dropped, never to corrupt the queue.
#[derive(Default)]
pub struct ChunkQueue {
    inner: Mutex<VecDeque<Vec<u8>>>,
    notify: Notify,
}

impl ChunkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, chunk: Vec<u8>) {
        self.inner.lock().unwrap().push_back(chunk);
        self.notify.notify_one();
    }

    /// Drops all pending chunks without waking the consumer.
    pub fn clear(&self) {
        self.inner.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }

    /// Waits for the next chunk. Callers wrap this in
    /// `tokio::time::timeout` to bound inter-chunk silence.
    pub async fn pop(&self) -> Vec<u8> {
        loop {
            if let Some(chunk) = self.inner.lock().unwrap().pop_front() {
                return chunk;
            }
            self.notify.notified().await;
        }
    }
}
