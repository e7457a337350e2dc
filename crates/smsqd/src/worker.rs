//! SMS worker pool.
//!
//! A fixed number of workers share the dispatch queue. Each worker runs in
//! one of two modes:
//!
//! - **Normal**: waits on shutdown and the queue at the same time, sends
//!   every message it receives, and exits when the queue is closed and empty.
//! - **Drain**: entered once shutdown is observed. The worker keeps sending
//!   buffered messages one at a time until the queue is closed and empty,
//!   so nothing already queued is discarded because of shutdown timing.
//!
//! A failed send is logged and counted, never fatal to the worker.

use std::sync::Arc;

use smsq_core::Message;
use smsq_mmcli::ModemManager;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::queue::QueueReceiver;
use crate::shutdown::Shutdown;

/// Default number of concurrent workers.
pub const DEFAULT_WORKER_COUNT: usize = 3;

/// Per-worker (or aggregated) send counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub sent: u64,
    pub failed: u64,
    /// Messages handled after shutdown was observed (included in sent/failed)
    pub drained: u64,
}

impl WorkerStats {
    fn merge(&mut self, other: WorkerStats) {
        self.sent += other.sent;
        self.failed += other.failed;
        self.drained += other.drained;
    }

    /// Total messages taken off the queue.
    pub fn processed(&self) -> u64 {
        self.sent + self.failed
    }
}

struct Worker {
    id: usize,
    queue: QueueReceiver,
    manager: Arc<dyn ModemManager>,
    shutdown: Shutdown,
}

impl Worker {
    async fn run(self) -> WorkerStats {
        let mut stats = WorkerStats::default();
        info!(worker_id = self.id, "Worker started");

        loop {
            let next = tokio::select! {
                biased;

                _ = self.shutdown.triggered() => break,
                next = self.queue.recv() => next,
            };

            match next {
                Some(message) => self.deliver(&message, &mut stats).await,
                None => {
                    info!(worker_id = self.id, "Dispatch queue closed, worker shutting down");
                    return stats;
                }
            }
        }

        self.drain(&mut stats).await;
        info!(
            worker_id = self.id,
            sent = stats.sent,
            failed = stats.failed,
            drained = stats.drained,
            "Worker shutting down"
        );
        stats
    }

    async fn drain(&self, stats: &mut WorkerStats) {
        debug!(worker_id = self.id, "Draining remaining messages");
        while let Some(message) = self.queue.recv().await {
            info!(worker_id = self.id, modem_id = %message.modem_id(), "Draining message");
            self.deliver(&message, stats).await;
            stats.drained += 1;
        }
    }

    async fn deliver(&self, message: &Message, stats: &mut WorkerStats) {
        debug!(worker_id = self.id, modem_id = %message.modem_id(), "Processing message");

        match self.manager.send_sms(message).await {
            Ok(()) => {
                stats.sent += 1;
                info!(
                    worker_id = self.id,
                    modem_id = %message.modem_id(),
                    destination = message.destination(),
                    "SMS sent"
                );
            }
            Err(e) => {
                stats.failed += 1;
                warn!(
                    worker_id = self.id,
                    modem_id = %message.modem_id(),
                    error = %e,
                    "Error sending SMS"
                );
            }
        }
    }
}

/// Handles to the running workers.
pub struct WorkerPool {
    handles: Vec<JoinHandle<WorkerStats>>,
}

impl WorkerPool {
    /// Spawns `count` workers on the current runtime.
    pub fn spawn(
        count: usize,
        queue: QueueReceiver,
        manager: Arc<dyn ModemManager>,
        shutdown: Shutdown,
    ) -> Self {
        info!(count, "Starting SMS workers");

        let handles = (1..=count)
            .map(|id| {
                let worker = Worker {
                    id,
                    queue: queue.clone(),
                    manager: Arc::clone(&manager),
                    shutdown: shutdown.clone(),
                };
                tokio::spawn(worker.run())
            })
            .collect();

        Self { handles }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Waits until every worker has exited and sums their counters.
    pub async fn join(self) -> WorkerStats {
        let mut total = WorkerStats::default();
        for handle in self.handles {
            match handle.await {
                Ok(stats) => total.merge(stats),
                Err(e) => error!(error = %e, "Worker task failed"),
            }
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::dispatch_queue;
    use async_trait::async_trait;
    use smsq_core::{ModemId, OutboundSms};
    use smsq_mmcli::ModemError;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records sends; fails for a chosen destination.
    #[derive(Default)]
    struct RecordingManager {
        sent: Mutex<Vec<Message>>,
        fail_destination: Option<&'static str>,
    }

    #[async_trait]
    impl ModemManager for RecordingManager {
        async fn discover_modems(&self) -> Result<Vec<ModemId>, ModemError> {
            Err(ModemError::NoModems)
        }

        async fn enable_modem(&self, _modem_id: &ModemId) -> Result<(), ModemError> {
            Ok(())
        }

        async fn send_sms(&self, message: &Message) -> Result<(), ModemError> {
            if self.fail_destination == Some(message.destination()) {
                return Err(ModemError::SmsIdNotFound {
                    modem_id: message.modem_id().clone(),
                });
            }
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    fn msg(destination: &str) -> Message {
        OutboundSms::new(destination, "hi")
            .unwrap()
            .for_modem(ModemId::new("m0"))
    }

    #[tokio::test]
    async fn test_workers_exit_when_queue_closes() {
        let (tx, rx) = dispatch_queue(10);
        let manager = Arc::new(RecordingManager::default());
        let pool = WorkerPool::spawn(3, rx, manager.clone(), Shutdown::new());
        assert_eq!(pool.len(), 3);

        tx.try_enqueue(msg("+15551234567")).unwrap();
        tx.close();

        let stats = pool.join().await;
        assert_eq!(stats.sent, 1);
        assert_eq!(stats.drained, 0);
        assert_eq!(manager.sent.lock().unwrap()[0], msg("+15551234567"));
    }

    #[tokio::test]
    async fn test_send_failure_does_not_stop_worker() {
        let (tx, rx) = dispatch_queue(10);
        let manager = Arc::new(RecordingManager {
            fail_destination: Some("+10000000000"),
            ..RecordingManager::default()
        });
        let pool = WorkerPool::spawn(1, rx, manager.clone(), Shutdown::new());

        tx.try_enqueue(msg("+10000000000")).unwrap();
        tx.try_enqueue(msg("+15551234567")).unwrap();
        tx.close();

        let stats = pool.join().await;
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.sent, 1);
        assert_eq!(stats.processed(), 2);
    }

    #[tokio::test]
    async fn test_shutdown_drains_buffered_messages() {
        let (tx, rx) = dispatch_queue(10);
        let manager = Arc::new(RecordingManager::default());
        let shutdown = Shutdown::new();

        for n in 0..5 {
            tx.try_enqueue(msg(&format!("+1555000000{n}"))).unwrap();
        }
        // Signal before any worker exists, so all five go through drain mode.
        shutdown.trigger();
        let pool = WorkerPool::spawn(3, rx, manager.clone(), shutdown);
        tx.close();

        let stats = tokio::time::timeout(Duration::from_secs(5), pool.join())
            .await
            .unwrap();
        assert_eq!(stats.sent, 5);
        assert_eq!(stats.drained, 5);
        assert_eq!(manager.sent.lock().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_drain_waits_for_close() {
        let (tx, rx) = dispatch_queue(10);
        let manager = Arc::new(RecordingManager::default());
        let shutdown = Shutdown::new();
        shutdown.trigger();

        let pool = WorkerPool::spawn(2, rx, manager.clone(), shutdown);

        // Queue still open: workers must not have given up yet.
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.try_enqueue(msg("+15551234567")).unwrap();
        tx.close();

        let stats = pool.join().await;
        assert_eq!(stats.sent, 1);
    }
}
