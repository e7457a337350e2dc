//! Logging-only modem manager for running without hardware.

use async_trait::async_trait;
use smsq_core::{Message, ModemId};
use tracing::info;

use crate::{ModemError, ModemManager};

/// Modem ID reported by [`DryRunModemManager`].
const DRY_RUN_MODEM: &str = "dry-run/Modem/0";

/// A [`ModemManager`] that reports a single fake modem and logs sends.
#[derive(Debug, Default)]
pub struct DryRunModemManager;

impl DryRunModemManager {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ModemManager for DryRunModemManager {
    async fn discover_modems(&self) -> Result<Vec<ModemId>, ModemError> {
        Ok(vec![ModemId::new(DRY_RUN_MODEM)])
    }

    async fn enable_modem(&self, modem_id: &ModemId) -> Result<(), ModemError> {
        info!(modem_id = %modem_id, "[dry-run] enable modem");
        Ok(())
    }

    async fn send_sms(&self, message: &Message) -> Result<(), ModemError> {
        info!(
            modem_id = %message.modem_id(),
            destination = message.destination(),
            body_len = message.body().len(),
            "[dry-run] send SMS"
        );
        Ok(())
    }
}
