//! Discovery barrier: wait until a writer has at least one matched reader.
//!
//! The transport owns a [`MatchSignal`] per writer and bumps it from its
//! match/unmatch callbacks. Any number of [`DiscoveryBarrier`] clones can wait on
//! the count with a predicate.

use std::time::Duration;

use tokio::sync::watch;

use crate::ChannelError;

/// Transport-side matched-reader counter (single writer).
#[derive(Debug)]
pub struct MatchSignal {
    tx: watch::Sender<usize>,
}

impl Default for MatchSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchSignal {
    /// A signal with no matched readers.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self { tx }
    }

    /// A reader matched.
    pub fn matched(&self) {
        self.tx.send_modify(|n| *n += 1);
    }

    /// A reader went away.
    pub fn unmatched(&self) {
        self.tx.send_modify(|n| *n = n.saturating_sub(1));
    }

    /// Overwrite the count, notifying waiters only if it changed.
    pub fn set(&self, count: usize) {
        self.tx.send_if_modified(|n| {
            if *n == count {
                false
            } else {
                *n = count;
                true
            }
        });
    }

    /// Current matched-reader count.
    pub fn count(&self) -> usize {
        *self.tx.borrow()
    }

    pub fn barrier(&self) -> DiscoveryBarrier {
        DiscoveryBarrier {
            rx: self.tx.subscribe(),
        }
    }
}

/// Reader side of a [`MatchSignal`].
#[derive(Debug, Clone)]
pub struct DiscoveryBarrier {
    rx: watch::Receiver<usize>,
}

impl DiscoveryBarrier {
    pub fn matched_count(&self) -> usize {
        *self.rx.borrow()
    }

    /// Block until at least one reader is matched. Returns the count observed.
    pub async fn wait(&self) -> Result<usize, ChannelError> {
        let mut rx = self.rx.clone();
        let count = *rx
            .wait_for(|n| *n > 0)
            .await
            .map_err(|_| ChannelError::Closed)?;
        Ok(count)
    }

    /// [`wait`](Self::wait) bounded by `timeout`.
    pub async fn wait_timeout(&self, timeout: Duration) -> Result<usize, ChannelError> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| ChannelError::DiscoveryTimeout(timeout))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_counts() {
        let signal = MatchSignal::new();
        let barrier = signal.barrier();
        assert_eq!(barrier.matched_count(), 0);

        signal.matched();
        signal.matched();
        assert_eq!(signal.count(), 2);
        assert_eq!(barrier.matched_count(), 2);

        signal.unmatched();
        signal.unmatched();
        signal.unmatched();
        assert_eq!(barrier.matched_count(), 0);

        signal.set(5);
        assert_eq!(barrier.matched_count(), 5);
    }

    #[tokio::test]
    async fn test_wait_returns_immediately_when_matched() {
        let signal = MatchSignal::new();
        signal.matched();
        assert_eq!(signal.barrier().wait().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_wait_blocks_until_match() {
        let signal = MatchSignal::new();
        let barrier = signal.barrier();

        let waiter = tokio::spawn(async move { barrier.wait().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        signal.matched();
        assert_eq!(waiter.await.unwrap().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_wait_timeout() {
        let signal = MatchSignal::new();
        let result = signal.barrier().wait_timeout(Duration::from_millis(10)).await;
        assert!(matches!(result, Err(ChannelError::DiscoveryTimeout(_))));
    }

    #[tokio::test]
    async fn test_wait_after_signal_dropped() {
        let signal = MatchSignal::new();
        let barrier = signal.barrier();
        drop(signal);
        assert!(matches!(barrier.wait().await, Err(ChannelError::Closed)));
    }
}
