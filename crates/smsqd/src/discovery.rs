//! Modem discovery and enablement loop.
//!
//! Keeps the [`ModemRegistry`] populated and every known modem enabled.
//! Each pass lists modems, merges new identifiers, then enables every
//! identifier the registry knows (including ones the latest listing no
//! longer reports). Passes repeat on a fixed interval until shutdown.
//!
//! A listing or enable failure aborts only the current pass; the loop retries
//! after the usual interval, so a modem that drops out briefly is picked up
//! again. When the manager reports no modems at all, [`DiscoveryService::run`]
//! returns the error and the rest of the pipeline keeps working with the
//! modems already registered.

use std::sync::Arc;
use std::time::Duration;

use smsq_core::ModemId;
use smsq_mmcli::{ModemError, ModemManager};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::registry::ModemRegistry;
use crate::shutdown::Shutdown;

/// Default pause between discovery passes.
pub const DEFAULT_DISCOVERY_INTERVAL: Duration = Duration::from_secs(15);

/// Errors from a discovery pass.
///
/// Only [`DiscoveryError::NoModems`] ends the loop; the others abort the
/// current pass.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The modem manager reported no modems
    #[error("no modems were found")]
    NoModems,

    /// Listing modems failed
    #[error("failed to list modems: {0}")]
    List(#[source] ModemError),

    /// Enabling a known modem failed
    #[error("failed to enable modem {modem_id}: {source}")]
    Enable {
        modem_id: ModemId,
        #[source]
        source: ModemError,
    },
}

impl DiscoveryError {
    /// Whether this error stops the discovery loop for good.
    pub fn is_loop_fatal(&self) -> bool {
        matches!(self, Self::NoModems)
    }
}

/// Outcome of a single discovery pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryResult {
    /// Modems reported by the manager in this pass
    pub reported: usize,
    /// Modems newly added to the registry
    pub added: usize,
    /// Modems successfully enabled
    pub enabled: usize,
}

/// Periodic discovery/enable loop.
pub struct DiscoveryService {
    manager: Arc<dyn ModemManager>,
    registry: Arc<ModemRegistry>,
    shutdown: Shutdown,
    interval: Duration,
}

impl DiscoveryService {
    /// Creates a discovery service with the default interval.
    #[must_use]
    pub fn new(
        manager: Arc<dyn ModemManager>,
        registry: Arc<ModemRegistry>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            manager,
            registry,
            shutdown,
            interval: DEFAULT_DISCOVERY_INTERVAL,
        }
    }

    /// Overrides the pause between passes.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Runs discovery passes until shutdown or a loop-fatal error.
    ///
    /// A failed pass (listing or enable error) is logged and retried after
    /// the interval. Only [`DiscoveryError::NoModems`] ends the loop.
    /// Returns `Ok(())` when stopped by shutdown.
    pub async fn run(self) -> Result<(), DiscoveryError> {
        info!(interval_secs = self.interval.as_secs(), "Modem discovery started");

        while !self.shutdown.is_triggered() {
            match self.discover_once().await {
                Ok(result) => debug!(
                    reported = result.reported,
                    added = result.added,
                    enabled = result.enabled,
                    known = self.registry.len(),
                    "Discovery pass complete"
                ),
                Err(e) if e.is_loop_fatal() => return Err(e),
                Err(e) => warn!(
                    error = %e,
                    retry_in_secs = self.interval.as_secs(),
                    "Discovery pass aborted"
                ),
            }

            if !self.shutdown.sleep(self.interval).await {
                break;
            }
        }

        info!("Modem discovery shutting down");
        Ok(())
    }

    /// Performs one list/merge/enable pass.
    ///
    /// The first enable failure aborts the pass. If shutdown fires while a
    /// manager call is pending, the call is abandoned and the partial result
    /// is returned without error.
    pub async fn discover_once(&self) -> Result<DiscoveryResult, DiscoveryError> {
        let listed = tokio::select! {
            biased;

            _ = self.shutdown.triggered() => return Ok(DiscoveryResult::default()),
            listed = self.manager.discover_modems() => listed,
        };

        let reported = match listed {
            Ok(modems) if modems.is_empty() => return Err(DiscoveryError::NoModems),
            Ok(modems) => modems,
            Err(ModemError::NoModems) => return Err(DiscoveryError::NoModems),
            Err(e) => return Err(DiscoveryError::List(e)),
        };

        let mut result = DiscoveryResult {
            reported: reported.len(),
            ..DiscoveryResult::default()
        };
        result.added = self.registry.merge_all(reported);
        if result.added > 0 {
            info!(added = result.added, known = self.registry.len(), "Discovered new modems");
        }

        for modem_id in self.registry.snapshot() {
            let enabled = tokio::select! {
                biased;

                _ = self.shutdown.triggered() => break,
                enabled = self.manager.enable_modem(&modem_id) => enabled,
            };

            if let Err(source) = enabled {
                return Err(DiscoveryError::Enable { modem_id, source });
            }
            result.enabled += 1;
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use smsq_core::Message;
    use std::sync::Mutex;

    /// Manager whose listing is scripted per call; the last entry repeats.
    struct ScriptedManager {
        listings: Mutex<Vec<Vec<&'static str>>>,
        list_calls: Mutex<usize>,
        enabled: Mutex<Vec<ModemId>>,
        /// Each entry makes one enable of that modem fail.
        enable_failures: Mutex<Vec<&'static str>>,
        hang_enable: bool,
    }

    impl ScriptedManager {
        fn new(listings: Vec<Vec<&'static str>>) -> Self {
            Self {
                listings: Mutex::new(listings),
                list_calls: Mutex::new(0),
                enabled: Mutex::new(Vec::new()),
                enable_failures: Mutex::new(Vec::new()),
                hang_enable: false,
            }
        }

        fn failing_once(self, modem: &'static str) -> Self {
            self.enable_failures.lock().unwrap().push(modem);
            self
        }
    }

    #[async_trait]
    impl ModemManager for ScriptedManager {
        async fn discover_modems(&self) -> Result<Vec<ModemId>, ModemError> {
            *self.list_calls.lock().unwrap() += 1;
            let mut listings = self.listings.lock().unwrap();
            let next = if listings.len() > 1 {
                listings.remove(0)
            } else {
                listings.first().cloned().unwrap_or_default()
            };
            if next.is_empty() {
                return Err(ModemError::NoModems);
            }
            Ok(next.into_iter().map(ModemId::from).collect())
        }

        async fn enable_modem(&self, modem_id: &ModemId) -> Result<(), ModemError> {
            if self.hang_enable {
                std::future::pending::<()>().await;
            }
            let failure = {
                let mut failures = self.enable_failures.lock().unwrap();
                let pos = failures.iter().position(|m| *m == modem_id.as_str());
                pos.map(|i| failures.remove(i))
            };
            if failure.is_some() {
                return Err(ModemError::CommandFailed {
                    command: format!("mmcli -m {modem_id} --enable"),
                    output: "error: couldn't enable".to_string(),
                });
            }
            self.enabled.lock().unwrap().push(modem_id.clone());
            Ok(())
        }

        async fn send_sms(&self, _message: &Message) -> Result<(), ModemError> {
            Ok(())
        }
    }

    fn service(manager: Arc<ScriptedManager>) -> (DiscoveryService, Arc<ModemRegistry>, Shutdown) {
        let registry = Arc::new(ModemRegistry::new());
        let shutdown = Shutdown::new();
        let service = DiscoveryService::new(manager, Arc::clone(&registry), shutdown.clone())
            .with_interval(Duration::from_secs(15));
        (service, registry, shutdown)
    }

    #[tokio::test]
    async fn test_discover_once_merges_and_enables() {
        let manager = Arc::new(ScriptedManager::new(vec![vec!["m0", "m1"]]));
        let (service, registry, _shutdown) = service(Arc::clone(&manager));

        let result = service.discover_once().await.unwrap();
        assert_eq!(
            result,
            DiscoveryResult {
                reported: 2,
                added: 2,
                enabled: 2
            }
        );
        assert_eq!(registry.len(), 2);
        assert_eq!(manager.enabled.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_vanished_modems_stay_registered_and_enabled() {
        let manager = Arc::new(ScriptedManager::new(vec![vec!["m0", "m1"], vec!["m1"]]));
        let (service, registry, _shutdown) = service(Arc::clone(&manager));

        service.discover_once().await.unwrap();
        let second = service.discover_once().await.unwrap();

        assert_eq!(second.reported, 1);
        assert_eq!(second.added, 0);
        assert_eq!(second.enabled, 2);
        assert!(registry.contains(&ModemId::new("m0")));
    }

    #[tokio::test]
    async fn test_no_modems_is_loop_fatal() {
        let manager = Arc::new(ScriptedManager::new(vec![vec![]]));
        let (service, registry, _shutdown) = service(manager);

        let result = service.run().await;
        assert!(matches!(result, Err(DiscoveryError::NoModems)));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_enable_failure_aborts_pass() {
        let manager = ScriptedManager::new(vec![vec!["m0", "m1", "m2"]]).failing_once("m1");
        let (service, registry, _shutdown) = service(Arc::new(manager));

        let err = service.discover_once().await.unwrap_err();
        assert!(!err.is_loop_fatal());
        assert!(matches!(
            &err,
            DiscoveryError::Enable { modem_id, .. } if modem_id.as_str() == "m1"
        ));
        // Merged before enabling
        assert_eq!(registry.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_enable_failure_does_not_stop_loop() {
        let manager = Arc::new(
            ScriptedManager::new(vec![vec!["m0"], vec!["m0", "m1"]]).failing_once("m0"),
        );
        let (service, registry, shutdown) = service(Arc::clone(&manager));

        let handle = tokio::spawn(service.run());

        // Pass at t=0 fails, passes at t=15 and t=30 succeed
        tokio::time::sleep(Duration::from_secs(40)).await;
        assert!(!handle.is_finished());
        assert_eq!(*manager.list_calls.lock().unwrap(), 3);
        assert_eq!(registry.snapshot(), vec![ModemId::new("m0"), ModemId::new("m1")]);
        assert!(manager.enabled.lock().unwrap().contains(&ModemId::new("m1")));

        shutdown.trigger();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_abandons_hanging_enable() {
        let mut manager = ScriptedManager::new(vec![vec!["m0"]]);
        manager.hang_enable = true;
        let (service, registry, shutdown) = service(Arc::new(manager));

        let handle = tokio::spawn(service.run());
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(registry.len(), 1);

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("discovery ignored shutdown")
            .unwrap()
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_repeats_until_shutdown() {
        let manager = Arc::new(ScriptedManager::new(vec![vec!["m0"]]));
        let (service, _registry, shutdown) = service(Arc::clone(&manager));

        let handle = tokio::spawn(service.run());

        // Passes at t=0, 15, 30
        tokio::time::sleep(Duration::from_secs(31)).await;
        shutdown.trigger();

        handle.await.unwrap().unwrap();
        assert_eq!(manager.enabled.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_run_after_shutdown_does_nothing() {
        let manager = Arc::new(ScriptedManager::new(vec![vec!["m0"]]));
        let (service, registry, shutdown) = service(Arc::clone(&manager));
        shutdown.trigger();

        service.run().await.unwrap();
        assert!(registry.is_empty());
    }
}
