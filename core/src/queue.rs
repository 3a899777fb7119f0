//! FIFO of raw command lines received from controllers
//!
//! Connection handlers push lines; a single translation loop pops them and
//! turns recognized commands into flags on the [`crate::AlarmClock`]. The
//! queue has its own lock, independent of the alarm state lock.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;

/// Thread-safe command queue with wait/notify.
#[derive(Debug, Default)]
pub struct CommandQueue {
    lines: Mutex<VecDeque<String>>,
    notify: Notify,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<String>> {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a line and wake the consumer.
    pub fn push(&self, line: impl Into<String>) {
        self.lock().push_back(line.into());
        self.notify.notify_one();
    }

    /// Remove the oldest line without waiting.
    pub fn try_pop(&self) -> Option<String> {
        self.lock().pop_front()
    }

    /// Wait for the oldest line.
    pub async fn pop(&self) -> String {
        loop {
            if let Some(line) = self.try_pop() {
                return line;
            }
            self.notify.notified().await;
        }
    }

    /// Wait up to `timeout` for the oldest line.
    ///
    /// # Returns
    /// `None` if nothing arrived in time.
    pub async fn pop_timeout(&self, timeout: Duration) -> Option<String> {
        tokio::time::timeout(timeout, self.pop()).await.ok()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_fifo_order() {
        let queue = CommandQueue::new();
        queue.push("snooze");
        queue.push("shut");
        queue.push(String::from("bogus"));

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.try_pop().as_deref(), Some("snooze"));
        assert_eq!(queue.try_pop().as_deref(), Some("shut"));
        assert_eq!(queue.try_pop().as_deref(), Some("bogus"));
        assert!(queue.try_pop().is_none());
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_pop_waits_for_push() {
        let queue = Arc::new(CommandQueue::new());

        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.pop().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.push("snooze");

        let line = tokio::time::timeout(Duration::from_secs(2), consumer)
            .await
            .expect("consumer timed out")
            .unwrap();
        assert_eq!(line, "snooze");
    }

    #[tokio::test]
    async fn test_pop_timeout_on_empty_queue() {
        let queue = CommandQueue::new();
        assert!(queue.pop_timeout(Duration::from_millis(10)).await.is_none());

        queue.push("shut");
        assert_eq!(
            queue.pop_timeout(Duration::from_millis(10)).await.as_deref(),
            Some("shut")
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_producers() {
        let queue = Arc::new(CommandQueue::new());

        let producers: Vec<_> = (0..4)
            .map(|i| {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move {
                    for n in 0..25 {
                        queue.push(format!("{}-{}", i, n));
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.await.unwrap();
        }

        let mut received = 0;
        while queue.pop_timeout(Duration::from_millis(10)).await.is_some() {
            received += 1;
        }
        assert_eq!(received, 100);
    }
}
