//! Actor Mailbox
//!
//! Bounded FIFO queue owned by one actor. The backpressure policy only decides
//! what happens when the queue is full; accepted messages are always consumed
//! in arrival order (DropOldest evicts from the front).
//!
//! The queue is a `VecDeque` behind a short `parking_lot` critical section so
//! that DropOldest can evict from the sender side, with two `Notify`s waking
//! the single consumer and any senders suspended under the Block policy.

use crate::address::Address;
use crate::config::{BackpressurePolicy, MailboxConfig};
use crate::error::{ActorError, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::Notify;
use tracing::{debug, warn};

/// What happened to a delivered message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Queued for processing
    Enqueued,
    /// Queue full under DropNewest, incoming message discarded
    DroppedNewest,
    /// Queue full under DropOldest, front message evicted, incoming queued
    EvictedOldest,
}

/// Result of a non-blocking admission attempt
#[derive(Debug)]
pub enum Admission<M> {
    Accepted(DeliveryOutcome),
    /// Queue full under Block; the message is handed back to the caller
    MustWait(M),
}

/// Mailbox counters
#[derive(Debug, Default)]
pub struct MailboxStats {
    pub enqueued: AtomicU64,
    pub dropped_newest: AtomicU64,
    pub evicted_oldest: AtomicU64,
    pub rejected_full: AtomicU64,
    pub blocked_waits: AtomicU64,
}

/// Point-in-time copy of [`MailboxStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailboxSnapshot {
    pub enqueued: u64,
    pub dropped_newest: u64,
    pub evicted_oldest: u64,
    pub rejected_full: u64,
    pub blocked_waits: u64,
    pub queued: usize,
}

/// Bounded queue with a backpressure policy
#[derive(Debug)]
pub struct Mailbox<M> {
    owner: Address,
    config: MailboxConfig,
    queue: Mutex<VecDeque<M>>,
    readable: Notify,
    writable: Notify,
    closed: AtomicBool,
    stats: MailboxStats,
}

impl<M: Send> Mailbox<M> {
    pub fn new(owner: Address, config: MailboxConfig) -> Self {
        let initial = match config.policy {
            BackpressurePolicy::Unbounded => 0,
            _ => config.capacity.min(4096),
        };

        Self {
            owner,
            config,
            queue: Mutex::new(VecDeque::with_capacity(initial)),
            readable: Notify::new(),
            writable: Notify::new(),
            closed: AtomicBool::new(false),
            stats: MailboxStats::default(),
        }
    }

    /// Apply the backpressure policy without suspending
    pub fn offer(&self, msg: M) -> Result<Admission<M>> {
        // Checked under the queue lock so nothing lands after close + clear
        let mut queue = self.queue.lock();
        if self.is_closed() {
            return Err(ActorError::not_running(&self.owner));
        }

        let full = match self.config.policy {
            BackpressurePolicy::Unbounded => false,
            _ => queue.len() >= self.config.capacity,
        };

        if !full {
            queue.push_back(msg);
            drop(queue);
            self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
            self.readable.notify_one();
            return Ok(Admission::Accepted(DeliveryOutcome::Enqueued));
        }

        match self.config.policy {
            BackpressurePolicy::FailFast => {
                drop(queue);
                self.stats.rejected_full.fetch_add(1, Ordering::Relaxed);
                warn!(
                    actor = %self.owner,
                    capacity = self.config.capacity,
                    "Mailbox full, rejecting message"
                );
                Err(ActorError::MailboxFull {
                    address: self.owner.clone(),
                    capacity: self.config.capacity,
                })
            }
            BackpressurePolicy::DropNewest => {
                drop(queue);
                self.stats.dropped_newest.fetch_add(1, Ordering::Relaxed);
                debug!(actor = %self.owner, "Mailbox full, dropping newest message");
                Ok(Admission::Accepted(DeliveryOutcome::DroppedNewest))
            }
            BackpressurePolicy::DropOldest => {
                queue.pop_front();
                queue.push_back(msg);
                drop(queue);
                self.stats.evicted_oldest.fetch_add(1, Ordering::Relaxed);
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                self.readable.notify_one();
                debug!(actor = %self.owner, "Mailbox full, evicted oldest message");
                Ok(Admission::Accepted(DeliveryOutcome::EvictedOldest))
            }
            BackpressurePolicy::Block | BackpressurePolicy::Unbounded => Ok(Admission::MustWait(msg)),
        }
    }

    /// Enqueue, suspending under Block until space exists or the mailbox closes
    pub async fn push(&self, mut msg: M) -> Result<DeliveryOutcome> {
        loop {
            let notified = self.writable.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.offer(msg)? {
                Admission::Accepted(outcome) => return Ok(outcome),
                Admission::MustWait(returned) => {
                    msg = returned;
                    self.stats.blocked_waits.fetch_add(1, Ordering::Relaxed);
                    notified.await;
                }
            }
        }
    }

    pub fn try_pop(&self) -> Option<M> {
        let msg = self.queue.lock().pop_front();
        if msg.is_some() {
            self.writable.notify_one();
        }
        msg
    }

    /// Wait for the next message. Cancel-safe: a message is only removed from
    /// the queue when this future completes.
    pub async fn pop(&self) -> M {
        loop {
            let notified = self.readable.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(msg) = self.try_pop() {
                return msg;
            }
            notified.await;
        }
    }

    /// Refuse further deliveries and wake every suspended sender
    pub fn close(&self) {
        {
            let _queue = self.queue.lock();
            self.closed.store(true, Ordering::Release);
        }
        self.writable.notify_waiters();
        self.readable.notify_waiters();
    }

    /// Drop everything still queued, returning how many messages were lost
    pub fn clear(&self) -> usize {
        let mut queue = self.queue.lock();
        let dropped = queue.len();
        queue.clear();
        dropped
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    pub fn config(&self) -> MailboxConfig {
        self.config
    }

    pub fn owner(&self) -> &Address {
        &self.owner
    }

    pub fn stats(&self) -> MailboxSnapshot {
        MailboxSnapshot {
            enqueued: self.stats.enqueued.load(Ordering::Relaxed),
            dropped_newest: self.stats.dropped_newest.load(Ordering::Relaxed),
            evicted_oldest: self.stats.evicted_oldest.load(Ordering::Relaxed),
            rejected_full: self.stats.rejected_full.load(Ordering::Relaxed),
            blocked_waits: self.stats.blocked_waits.load(Ordering::Relaxed),
            queued: self.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn mailbox(capacity: usize, policy: BackpressurePolicy) -> Mailbox<u32> {
        Mailbox::new(
            "actor://local/mailbox".parse().unwrap(),
            MailboxConfig::new(capacity, policy),
        )
    }

    fn drain(mailbox: &Mailbox<u32>) -> Vec<u32> {
        std::iter::from_fn(|| mailbox.try_pop()).collect()
    }

    #[test]
    fn test_fifo_order() {
        let mb = mailbox(8, BackpressurePolicy::Block);
        for i in 0..5 {
            assert!(matches!(
                mb.offer(i).unwrap(),
                Admission::Accepted(DeliveryOutcome::Enqueued)
            ));
        }
        assert_eq!(drain(&mb), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_drop_newest_reports_success() {
        let mb = mailbox(2, BackpressurePolicy::DropNewest);
        mb.offer(1).unwrap();
        mb.offer(2).unwrap();
        assert!(matches!(
            mb.offer(3).unwrap(),
            Admission::Accepted(DeliveryOutcome::DroppedNewest)
        ));
        assert_eq!(drain(&mb), vec![1, 2]);
        assert_eq!(mb.stats().dropped_newest, 1);
    }

    #[test]
    fn test_unbounded_ignores_capacity() {
        let mb = mailbox(1, BackpressurePolicy::Unbounded);
        for i in 0..100 {
            mb.offer(i).unwrap();
        }
        assert_eq!(mb.len(), 100);
    }

    #[test]
    fn test_block_hands_message_back() {
        let mb = mailbox(1, BackpressurePolicy::Block);
        mb.offer(1).unwrap();
        match mb.offer(2).unwrap() {
            Admission::MustWait(returned) => assert_eq!(returned, 2),
            other => panic!("expected MustWait, got {:?}", other),
        }
    }

    #[test]
    fn test_closed_mailbox_rejects() {
        let mb = mailbox(4, BackpressurePolicy::Block);
        mb.offer(1).unwrap();
        mb.close();
        assert!(mb.offer(2).unwrap_err().is_not_running());
        assert_eq!(mb.clear(), 1);
        assert!(mb.is_empty());
    }

    #[test]
    fn test_nothing_lands_after_close_and_clear() {
        for _ in 0..50 {
            let mb = Arc::new(mailbox(1024, BackpressurePolicy::Unbounded));
            let senders: Vec<_> = (0..4)
                .map(|_| {
                    let mb = Arc::clone(&mb);
                    std::thread::spawn(move || {
                        let mut accepted = 0u32;
                        while mb.offer(accepted).is_ok() {
                            accepted += 1;
                        }
                        accepted
                    })
                })
                .collect();

            std::thread::yield_now();
            mb.close();
            mb.clear();
            for sender in senders {
                sender.join().unwrap();
            }
            assert!(mb.is_empty());
        }
    }

    #[tokio::test]
    async fn test_block_waits_for_space() {
        let mb = Arc::new(mailbox(1, BackpressurePolicy::Block));
        mb.push(1).await.unwrap();

        let sender = {
            let mb = Arc::clone(&mb);
            tokio::spawn(async move { mb.push(2).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!sender.is_finished());
        assert_eq!(mb.len(), 1);

        assert_eq!(mb.pop().await, 1);
        let outcome = tokio::time::timeout(Duration::from_secs(1), sender)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(outcome, DeliveryOutcome::Enqueued);
        assert_eq!(mb.pop().await, 2);
        assert!(mb.stats().blocked_waits >= 1);
    }

    #[tokio::test]
    async fn test_close_wakes_blocked_sender() {
        let mb = Arc::new(mailbox(1, BackpressurePolicy::Block));
        mb.push(1).await.unwrap();

        let sender = {
            let mb = Arc::clone(&mb);
            tokio::spawn(async move { mb.push(2).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        mb.close();

        let result = tokio::time::timeout(Duration::from_secs(1), sender)
            .await
            .unwrap()
            .unwrap();
        assert!(result.unwrap_err().is_not_running());
    }

    #[tokio::test]
    async fn test_pop_wakes_on_delivery() {
        let mb = Arc::new(mailbox(4, BackpressurePolicy::Block));
        let consumer = {
            let mb = Arc::clone(&mb);
            tokio::spawn(async move { mb.pop().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        mb.push(42).await.unwrap();

        let received = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, 42);
    }

    proptest! {
        #[test]
        fn prop_drop_oldest_keeps_last_capacity(capacity in 1usize..16, extra in 1usize..32) {
            let mb = mailbox(capacity, BackpressurePolicy::DropOldest);
            let total = capacity + extra;
            for i in 0..total as u32 {
                mb.offer(i).unwrap();
            }

            let expected: Vec<u32> = ((total - capacity) as u32..total as u32).collect();
            prop_assert_eq!(drain(&mb), expected);
            prop_assert_eq!(mb.stats().evicted_oldest, extra as u64);
        }

        #[test]
        fn prop_fail_fast_rejects_only_past_capacity(capacity in 1usize..16) {
            let mb = mailbox(capacity, BackpressurePolicy::FailFast);
            for i in 0..capacity as u32 {
                prop_assert!(mb.offer(i).is_ok());
            }
            let rejected = matches!(mb.offer(99), Err(ActorError::MailboxFull { .. }));
            prop_assert!(rejected);
            prop_assert_eq!(mb.len(), capacity);
        }
    }
}
