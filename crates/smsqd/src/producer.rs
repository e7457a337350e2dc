//! Message producer.
//!
//! Each cycle snapshots the registry, asks the message source for one SMS per
//! modem, binds it to that modem and tries to enqueue it. Enqueueing never
//! waits for room: when the queue is full the producer backs off briefly and
//! drops the message. Delivery is best effort.
//!
//! On shutdown the producer stops at the next checkpoint (before each source
//! call, before each enqueue, and during every sleep), closes the queue and
//! returns its counters.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::queue::{EnqueueError, QueueSender};
use crate::registry::ModemRegistry;
use crate::shutdown::Shutdown;
use crate::source::MessageSource;

/// Producer timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProducerSettings {
    /// Pause after each full pass over the registry
    pub produce_interval: Duration,
    /// Retry delay while the registry is empty
    pub empty_registry_backoff: Duration,
    /// Delay applied after an enqueue hits a full queue
    pub backpressure_delay: Duration,
}

impl Default for ProducerSettings {
    fn default() -> Self {
        Self {
            produce_interval: Duration::from_secs(3),
            empty_registry_backoff: Duration::from_secs(3),
            backpressure_delay: Duration::from_secs(1),
        }
    }
}

/// Counters accumulated by the producer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProduceStats {
    /// Completed passes over a non-empty registry
    pub cycles: u64,
    pub enqueued: u64,
    /// Messages dropped because the queue was full
    pub dropped: u64,
    pub source_failures: u64,
}

/// How a production cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed,
    Shutdown,
}

/// Feeds the dispatch queue from the message source.
pub struct Producer {
    registry: Arc<ModemRegistry>,
    source: Arc<dyn MessageSource>,
    queue: QueueSender,
    shutdown: Shutdown,
    settings: ProducerSettings,
}

impl Producer {
    #[must_use]
    pub fn new(
        registry: Arc<ModemRegistry>,
        source: Arc<dyn MessageSource>,
        queue: QueueSender,
        shutdown: Shutdown,
        settings: ProducerSettings,
    ) -> Self {
        Self {
            registry,
            source,
            queue,
            shutdown,
            settings,
        }
    }

    /// Produces until shutdown, then closes the queue.
    pub async fn run(self) -> ProduceStats {
        let mut stats = ProduceStats::default();
        info!(
            interval_secs = self.settings.produce_interval.as_secs(),
            capacity = self.queue.capacity(),
            "Message producer started"
        );

        loop {
            if self.shutdown.is_triggered() {
                break;
            }

            if self.registry.is_empty() {
                debug!("No modems known yet, waiting");
                if !self.shutdown.sleep(self.settings.empty_registry_backoff).await {
                    break;
                }
                continue;
            }

            if self.produce_cycle(&mut stats).await == CycleOutcome::Shutdown {
                break;
            }

            if !self.shutdown.sleep(self.settings.produce_interval).await {
                break;
            }
        }

        let Self { queue, .. } = self;
        info!(
            buffered = queue.len(),
            enqueued = stats.enqueued,
            dropped = stats.dropped,
            "Producer stopping, closing dispatch queue"
        );
        queue.close();

        stats
    }

    /// One pass over the registry: at most one enqueue attempt per modem.
    pub async fn produce_cycle(&self, stats: &mut ProduceStats) -> CycleOutcome {
        for modem_id in self.registry.snapshot() {
            let next = tokio::select! {
                biased;

                _ = self.shutdown.triggered() => return CycleOutcome::Shutdown,
                next = self.source.next_message() => next,
            };

            let sms = match next {
                Ok(sms) => sms,
                Err(e) => {
                    warn!(modem_id = %modem_id, error = %e, "Error getting message");
                    stats.source_failures += 1;
                    continue;
                }
            };

            // Nothing may be enqueued once shutdown has been observed.
            if self.shutdown.is_triggered() {
                return CycleOutcome::Shutdown;
            }

            match self.queue.try_enqueue(sms.for_modem(modem_id.clone())) {
                Ok(()) => {
                    stats.enqueued += 1;
                    debug!(modem_id = %modem_id, queue_len = self.queue.len(), "Enqueued message");
                }
                Err(EnqueueError::Full(_)) => {
                    stats.dropped += 1;
                    warn!(
                        modem_id = %modem_id,
                        capacity = self.queue.capacity(),
                        "Queue is full, dropping message"
                    );
                    if !self.shutdown.sleep(self.settings.backpressure_delay).await {
                        return CycleOutcome::Shutdown;
                    }
                }
                Err(EnqueueError::Closed(_)) => {
                    // All workers are gone; nothing left to feed.
                    warn!("Dispatch queue closed by consumers, stopping producer");
                    return CycleOutcome::Shutdown;
                }
            }
        }

        stats.cycles += 1;
        CycleOutcome::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::dispatch_queue;
    use crate::source::{SourceError, StaticMessageSource};
    use async_trait::async_trait;
    use smsq_core::{ModemId, OutboundSms};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn hi() -> OutboundSms {
        OutboundSms::new("+15551234567", "hi").unwrap()
    }

    fn registry(ids: &[&str]) -> Arc<ModemRegistry> {
        let registry = Arc::new(ModemRegistry::new());
        registry.merge_all(ids.iter().copied().map(ModemId::from));
        registry
    }

    /// Fails on every other call.
    struct FlakySource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MessageSource for FlakySource {
        async fn next_message(&self) -> Result<OutboundSms, SourceError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) % 2 == 0 {
                Err(SourceError::Unavailable("database offline".to_string()))
            } else {
                Ok(hi())
            }
        }
    }

    #[tokio::test]
    async fn test_cycle_binds_modem_id() {
        let (tx, rx) = dispatch_queue(10);
        let producer = Producer::new(
            registry(&["m0"]),
            Arc::new(StaticMessageSource::new(hi())),
            tx,
            Shutdown::new(),
            ProducerSettings::default(),
        );

        let mut stats = ProduceStats::default();
        assert_eq!(producer.produce_cycle(&mut stats).await, CycleOutcome::Completed);
        assert_eq!(stats.enqueued, 1);

        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.destination(), "+15551234567");
        assert_eq!(msg.body(), "hi");
        assert_eq!(msg.modem_id().as_str(), "m0");
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_queue_drops_without_retry() {
        let (tx, rx) = dispatch_queue(2);
        let producer = Producer::new(
            registry(&["m0", "m1", "m2"]),
            Arc::new(StaticMessageSource::new(hi())),
            tx,
            Shutdown::new(),
            ProducerSettings::default(),
        );

        let start = tokio::time::Instant::now();
        let mut stats = ProduceStats::default();
        producer.produce_cycle(&mut stats).await;

        assert_eq!(stats.enqueued, 2);
        assert_eq!(stats.dropped, 1);
        // One backpressure delay was applied
        assert!(start.elapsed() >= Duration::from_secs(1));

        assert_eq!(rx.recv().await.unwrap().modem_id().as_str(), "m0");
        assert_eq!(rx.recv().await.unwrap().modem_id().as_str(), "m1");
        drop(producer);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_source_failure_skips_modem() {
        let (tx, _rx) = dispatch_queue(10);
        let producer = Producer::new(
            registry(&["m0", "m1", "m2", "m3"]),
            Arc::new(FlakySource {
                calls: AtomicUsize::new(0),
            }),
            tx,
            Shutdown::new(),
            ProducerSettings::default(),
        );

        let mut stats = ProduceStats::default();
        producer.produce_cycle(&mut stats).await;
        assert_eq!(stats.source_failures, 2);
        assert_eq!(stats.enqueued, 2);
        assert_eq!(stats.cycles, 1);
    }

    #[tokio::test]
    async fn test_no_enqueue_after_shutdown() {
        let (tx, rx) = dispatch_queue(10);
        let shutdown = Shutdown::new();
        shutdown.trigger();

        let producer = Producer::new(
            registry(&["m0"]),
            Arc::new(StaticMessageSource::new(hi())),
            tx,
            shutdown,
            ProducerSettings::default(),
        );

        let stats = producer.run().await;
        assert_eq!(stats, ProduceStats::default());
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_waits_for_modems_then_closes_on_shutdown() {
        let (tx, rx) = dispatch_queue(100);
        let registry = registry(&[]);
        let shutdown = Shutdown::new();

        let producer = Producer::new(
            Arc::clone(&registry),
            Arc::new(StaticMessageSource::new(hi())),
            tx,
            shutdown.clone(),
            ProducerSettings::default(),
        );
        let handle = tokio::spawn(producer.run());

        tokio::time::sleep(Duration::from_secs(4)).await;
        registry.merge(ModemId::new("m0"));

        // Backoff ends at t=6; cycles at t=6, 9, 12
        tokio::time::sleep(Duration::from_secs(9)).await;
        shutdown.trigger();

        let stats = handle.await.unwrap();
        assert_eq!(stats.enqueued, 3);
        assert_eq!(stats.cycles, 3);

        let mut received = 0;
        while rx.recv().await.is_some() {
            received += 1;
        }
        assert_eq!(received, 3);
    }
}
