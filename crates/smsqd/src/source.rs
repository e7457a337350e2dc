//! Where outbound messages come from.
//!
//! The producer asks a [`MessageSource`] for one SMS per known modem each
//! cycle. Real deployments back this with a database, queue or API; the
//! daemon ships [`StaticMessageSource`], which repeats a configured message.

use async_trait::async_trait;
use smsq_core::OutboundSms;
use thiserror::Error;

/// Errors a message source may report. Always non-fatal to the producer.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The backing store could not be read
    #[error("message source unavailable: {0}")]
    Unavailable(String),
}

/// Supplies the next SMS payload to send.
#[async_trait]
pub trait MessageSource: Send + Sync {
    async fn next_message(&self) -> Result<OutboundSms, SourceError>;
}

/// Returns the same message every time.
#[derive(Debug, Clone)]
pub struct StaticMessageSource {
    message: OutboundSms,
}

impl StaticMessageSource {
    pub fn new(message: OutboundSms) -> Self {
        Self { message }
    }
}

#[async_trait]
impl MessageSource for StaticMessageSource {
    async fn next_message(&self) -> Result<OutboundSms, SourceError> {
        Ok(self.message.clone())
    }
}
