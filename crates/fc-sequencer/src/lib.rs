//! Ordered concurrent message sequencer.
//!
//! Multiple workers each hold their own broker delivery and call `submit`
//! concurrently. The sequencer guarantees every enqueued message is handed
//! to the handler exactly once, in the order `submit` was first called for
//! it, and that a single handler failure fail-stops every message still in
//! flight: once one handler invocation errors, every subsequent `submit`
//! call — including the one that is still processing the failing message —
//! resolves to a negative acknowledgement instead of running the handler
//! again.
//!
//! The queue itself (append-before-lock) and the handler-invocation lock
//! (pop-under-lock) are deliberately two different primitives: many workers
//! can append concurrently, but only one at a time may be inside the
//! handler. Because invocation is fully serialized, whichever worker is
//! running the handler at the moment it errors is unambiguously the
//! originating worker — there is no separate compare-and-swap needed to
//! decide that.

use async_trait::async_trait;
use fc_common::AckNack;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Error, Debug)]
pub enum SequencerError {
    #[error("handler failed: {0}")]
    HandlerFailed(String),
}

pub type Result<T> = std::result::Result<T, SequencerError>;

/// Handler invoked on the popped head of the queue. Implementors are the
/// inbound poller's publish step or the outbound dispatcher's send step —
/// both sit behind the same sequencer type.
#[async_trait]
pub trait SequencedHandler<M: Send + 'static>: Send + Sync {
    type Error: std::fmt::Display + Send + Sync + 'static;

    async fn handle(&self, message: M) -> std::result::Result<(), Self::Error>;
}

/// Grace periods taken from the pub/sub worker loop this sequencer replaces:
/// the originating worker sleeps briefly before re-raising so in-flight
/// sibling workers get a chance to observe the terminal error and nack
/// their own messages before the process unwinds; non-originating workers
/// sleep a little longer so they don't spin ahead of that unwind.
#[derive(Debug, Clone)]
pub struct SequencerConfig {
    pub originator_grace: Duration,
    pub peer_yield: Duration,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            originator_grace: Duration::from_secs(1),
            peer_yield: Duration::from_secs(2),
        }
    }
}

struct TerminalState {
    error: Mutex<Option<String>>,
}

impl TerminalState {
    fn new() -> Self {
        Self {
            error: Mutex::new(None),
        }
    }

    fn is_set(&self) -> bool {
        self.error.lock().is_some()
    }

    /// Sets the terminal error if none is set yet and reports whether this
    /// call was the one that set it. Invocation is already serialized by
    /// the handler lock, so in practice this is always a fresh set.
    fn set(&self, message: String) -> bool {
        let mut guard = self.error.lock();
        if guard.is_some() {
            return false;
        }
        *guard = Some(message);
        true
    }
}

/// FIFO plus mutual-exclusion lock serializing handler invocation.
pub struct Sequencer<M, H>
where
    M: Send + 'static,
    H: SequencedHandler<M>,
{
    queue: Mutex<VecDeque<M>>,
    handler_lock: tokio::sync::Mutex<()>,
    terminal: Arc<TerminalState>,
    handler: H,
    config: SequencerConfig,
}

impl<M, H> Sequencer<M, H>
where
    M: Send + 'static,
    H: SequencedHandler<M>,
{
    pub fn new(handler: H, config: SequencerConfig) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            handler_lock: tokio::sync::Mutex::new(()),
            terminal: Arc::new(TerminalState::new()),
            handler,
            config,
        }
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_failed(&self) -> bool {
        self.terminal.is_set()
    }

    /// Submits `message` for ordered, serialized handling.
    ///
    /// Returns `Ok(AckNack::Ack)` once the queue has advanced past this
    /// call's enqueue position with no terminal error observed,
    /// `Ok(AckNack::Nack)` if a terminal error was already set by a prior
    /// call, or `Err` only on the single call whose own handler invocation
    /// produced the terminal error — the caller should treat `Err` as a
    /// signal to nack its own message and stop pulling new ones.
    pub async fn submit(&self, message: M) -> Result<AckNack> {
        self.queue.lock().push_back(message);
        metrics::gauge!("sequencer.queue_depth").set(self.queue_depth() as f64);

        let mut originated = false;

        {
            let _guard = self.handler_lock.lock().await;
            if !self.terminal.is_set() {
                let popped = self.queue.lock().pop_front();
                metrics::gauge!("sequencer.queue_depth").set(self.queue_depth() as f64);

                if let Some(item) = popped {
                    match self.handler.handle(item).await {
                        Ok(()) => {
                            metrics::counter!("sequencer.handled_total").increment(1);
                        }
                        Err(e) => {
                            originated = self.terminal.set(e.to_string());
                            metrics::counter!("sequencer.failstop_total").increment(1);
                        }
                    }
                }
            }
        }

        if self.terminal.is_set() {
            if originated {
                warn!("sequencer fail-stop tripped, holding before re-raise");
                tokio::time::sleep(self.config.originator_grace).await;
                let message = self
                    .terminal
                    .error
                    .lock()
                    .clone()
                    .unwrap_or_else(|| "sequencer handler failed".to_string());
                return Err(SequencerError::HandlerFailed(message));
            }
            tokio::time::sleep(self.config.peer_yield).await;
            return Ok(AckNack::Nack { delay_seconds: None });
        }

        Ok(AckNack::Ack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RecordingHandler {
        seen: Mutex<Vec<u32>>,
        fail_on: Option<u32>,
    }

    #[async_trait]
    impl SequencedHandler<u32> for RecordingHandler {
        type Error = String;

        async fn handle(&self, message: u32) -> std::result::Result<(), String> {
            self.seen.lock().push(message);
            if Some(message) == self.fail_on {
                return Err(format!("boom on {message}"));
            }
            Ok(())
        }
    }

    fn fast_config() -> SequencerConfig {
        SequencerConfig {
            originator_grace: Duration::from_millis(5),
            peer_yield: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn processes_messages_in_enqueue_order_when_all_succeed() {
        let handler = RecordingHandler {
            seen: Mutex::new(Vec::new()),
            fail_on: None,
        };
        let sequencer = Sequencer::new(handler, fast_config());

        for i in 1..=5u32 {
            let result = sequencer.submit(i).await.unwrap();
            assert!(matches!(result, AckNack::Ack));
        }

        assert_eq!(*sequencer.handler.seen.lock(), vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn failure_on_third_message_fail_stops_every_later_submit() {
        // Mirrors the five-worker fail-stop scenario: messages 1..5 enqueue
        // in order, the handler throws on the third, and every submit from
        // that point on — including the failing one — resolves negatively.
        let handler = RecordingHandler {
            seen: Mutex::new(Vec::new()),
            fail_on: Some(3),
        };
        let sequencer = Sequencer::new(handler, fast_config());

        assert!(matches!(sequencer.submit(1).await.unwrap(), AckNack::Ack));
        assert!(matches!(sequencer.submit(2).await.unwrap(), AckNack::Ack));

        let third = sequencer.submit(3).await;
        assert!(third.is_err(), "originating call must re-raise");

        let fourth = sequencer.submit(4).await.unwrap();
        assert!(matches!(fourth, AckNack::Nack { .. }));
        let fifth = sequencer.submit(5).await.unwrap();
        assert!(matches!(fifth, AckNack::Nack { .. }));

        assert_eq!(*sequencer.handler.seen.lock(), vec![1, 2, 3]);
        assert!(sequencer.is_failed());
    }

    #[tokio::test]
    async fn handler_invocations_never_overlap() {
        struct OverlapDetector {
            in_flight: AtomicUsize,
            max_observed: AtomicUsize,
        }

        #[async_trait]
        impl SequencedHandler<u32> for OverlapDetector {
            type Error = String;

            async fn handle(&self, _message: u32) -> std::result::Result<(), String> {
                let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_observed.fetch_max(current, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        }

        let sequencer = Arc::new(Sequencer::new(
            OverlapDetector {
                in_flight: AtomicUsize::new(0),
                max_observed: AtomicUsize::new(0),
            },
            fast_config(),
        ));

        let mut tasks = Vec::new();
        for i in 0..8u32 {
            let sequencer = sequencer.clone();
            tasks.push(tokio::spawn(async move {
                sequencer.submit(i).await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(sequencer.handler.max_observed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn default_grace_periods_are_one_and_two_seconds() {
        let config = SequencerConfig::default();
        assert_eq!(config.originator_grace, Duration::from_secs(1));
        assert_eq!(config.peer_yield, Duration::from_secs(2));
    }
}
