//! Inbound queue shared by every reader of one instance.
//!
//! Many producers (one [`InboundSink`] per reader), one consumer. Payloads come
//! out in arrival order across all topics; nothing is deduplicated.

use tokio::sync::mpsc;

use crate::ChannelError;

/// Producer handle given to readers.
#[derive(Debug, Clone)]
pub struct InboundSink {
    tx: mpsc::UnboundedSender<String>,
}

impl InboundSink {
    /// Enqueue `payload`; fails once the queue's consumer is gone.
    pub fn deliver(&self, payload: String) -> Result<(), ChannelError> {
        self.tx.send(payload).map_err(|_| ChannelError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer end of the inbound path.
#[derive(Debug)]
pub struct InboundQueue {
    sink: InboundSink,
    rx: mpsc::UnboundedReceiver<String>,
}

impl Default for InboundQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InboundQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            sink: InboundSink { tx },
            rx,
        }
    }

    /// A new producer handle feeding this queue.
    pub fn sink(&self) -> InboundSink {
        self.sink.clone()
    }

    /// Wait for the next payload.
    ///
    /// The queue keeps a sink of its own, so this only returns `None` after
    /// [`close`](Self::close).
    pub async fn pop(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Next payload if one is already queued.
    pub fn try_pop(&mut self) -> Option<String> {
        self.rx.try_recv().ok()
    }

    /// Take everything currently queued, in arrival order.
    pub fn drain(&mut self) -> Vec<String> {
        let mut drained = Vec::new();
        while let Ok(payload) = self.rx.try_recv() {
            drained.push(payload);
        }
        drained
    }

    /// Stop accepting payloads. Queued payloads can still be popped.
    pub fn close(&mut self) {
        self.rx.close();
    }
}
