//! Dispatch pipeline wiring and shutdown coordination.
//!
//! ```text
//!  ModemManager ──▶ Discovery ──▶ ModemRegistry ──▶ Producer ◀── MessageSource
//!                                                      │ try_enqueue
//!                                                      ▼
//!                                            bounded dispatch queue
//!                                                      │ recv
//!                                                      ▼
//!                                     Worker 1 .. Worker N ──▶ ModemManager::send_sms
//! ```
//!
//! Startup: discovery first, then a (cancellable) head start so modems are
//! enabled, then workers and producer. Shutdown: the shared [`Shutdown`]
//! stops discovery and the producer; the producer closes the queue; workers
//! drain it and exit. [`Pipeline::run`] returns only after every worker has
//! exited.

use std::sync::Arc;
use std::time::Duration;

use smsq_mmcli::ModemManager;
use tracing::{error, info};

use crate::config::Config;
use crate::discovery::{DiscoveryError, DiscoveryService, DEFAULT_DISCOVERY_INTERVAL};
use crate::producer::{ProduceStats, Producer, ProducerSettings};
use crate::queue::{dispatch_queue, DEFAULT_QUEUE_CAPACITY};
use crate::registry::ModemRegistry;
use crate::shutdown::Shutdown;
use crate::source::MessageSource;
use crate::worker::{WorkerPool, WorkerStats, DEFAULT_WORKER_COUNT};

/// Sizing and timing of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    pub queue_capacity: usize,
    pub worker_count: usize,
    pub discovery_interval: Duration,
    pub startup_delay: Duration,
    pub producer: ProducerSettings,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            worker_count: DEFAULT_WORKER_COUNT,
            discovery_interval: DEFAULT_DISCOVERY_INTERVAL,
            startup_delay: Duration::from_secs(10),
            producer: ProducerSettings::default(),
        }
    }
}

impl From<&Config> for PipelineSettings {
    fn from(config: &Config) -> Self {
        Self {
            queue_capacity: config.queue_capacity,
            worker_count: config.worker_count,
            discovery_interval: config.discovery_interval(),
            startup_delay: config.startup_delay(),
            producer: ProducerSettings {
                produce_interval: config.produce_interval(),
                empty_registry_backoff: config.empty_registry_backoff(),
                backpressure_delay: config.backpressure_delay(),
            },
        }
    }
}

/// What happened during a pipeline run.
#[derive(Debug)]
pub struct PipelineReport {
    pub produced: ProduceStats,
    pub workers: WorkerStats,
    /// `Err` if discovery stopped on a loop-fatal error
    pub discovery: Result<(), DiscoveryError>,
}

/// The complete dispatch pipeline.
pub struct Pipeline {
    settings: PipelineSettings,
    manager: Arc<dyn ModemManager>,
    source: Arc<dyn MessageSource>,
    registry: Arc<ModemRegistry>,
    shutdown: Shutdown,
}

impl Pipeline {
    #[must_use]
    pub fn new(
        settings: PipelineSettings,
        manager: Arc<dyn ModemManager>,
        source: Arc<dyn MessageSource>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            settings,
            manager,
            source,
            registry: Arc::new(ModemRegistry::new()),
            shutdown,
        }
    }

    /// Uses an existing registry instead of a fresh one.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<ModemRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &Arc<ModemRegistry> {
        &self.registry
    }

    /// Runs until shutdown and every worker has drained and exited.
    pub async fn run(self) -> PipelineReport {
        let Self {
            settings,
            manager,
            source,
            registry,
            shutdown,
        } = self;

        info!(
            queue_capacity = settings.queue_capacity,
            worker_count = settings.worker_count,
            "Dispatch pipeline starting"
        );

        let discovery = DiscoveryService::new(
            Arc::clone(&manager),
            Arc::clone(&registry),
            shutdown.clone(),
        )
        .with_interval(settings.discovery_interval);
        let discovery_handle = tokio::spawn(async move {
            let result = discovery.run().await;
            if let Err(e) = &result {
                error!(error = %e, "Modem discovery stopped; continuing with known modems");
            }
            result
        });

        // Give discovery a head start to enable modems before sending.
        if !settings.startup_delay.is_zero() {
            shutdown.sleep(settings.startup_delay).await;
        }

        let (queue_tx, queue_rx) = dispatch_queue(settings.queue_capacity);
        let pool = WorkerPool::spawn(
            settings.worker_count,
            queue_rx,
            Arc::clone(&manager),
            shutdown.clone(),
        );

        let producer = Producer::new(
            Arc::clone(&registry),
            source,
            queue_tx,
            shutdown.clone(),
            settings.producer,
        );
        let produced = match tokio::spawn(producer.run()).await {
            Ok(stats) => stats,
            Err(e) => {
                error!(error = %e, "Producer task failed");
                ProduceStats::default()
            }
        };

        info!("Main loop closed, waiting for workers to finish");
        let workers = pool.join().await;
        info!(sent = workers.sent, failed = workers.failed, "All workers are done");

        let discovery = match discovery_handle.await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "Discovery task failed");
                Ok(())
            }
        };

        info!(
            enqueued = produced.enqueued,
            dropped = produced.dropped,
            sent = workers.sent,
            failed = workers.failed,
            "Dispatch pipeline stopped"
        );

        PipelineReport {
            produced,
            workers,
            discovery,
        }
    }
}
