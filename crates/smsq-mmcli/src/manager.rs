//! The modem-management capability consumed by the dispatch pipeline.

use async_trait::async_trait;
use smsq_core::{Message, ModemId};

use crate::ModemError;

/// Operations the dispatcher needs from the modem-management subsystem.
///
/// Implementations must be shareable across tasks: discovery, and every
/// worker hold the same instance behind an `Arc`.
#[async_trait]
pub trait ModemManager: Send + Sync {
    /// Lists the modems currently visible.
    ///
    /// Returns `ModemError::NoModems` when none are present.
    async fn discover_modems(&self) -> Result<Vec<ModemId>, ModemError>;

    /// Activates a modem so it can transmit.
    async fn enable_modem(&self, modem_id: &ModemId) -> Result<(), ModemError>;

    /// Creates the SMS on the message's modem and triggers transmission.
    async fn send_sms(&self, message: &Message) -> Result<(), ModemError>;
}
