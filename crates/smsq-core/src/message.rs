//! Outbound SMS values.
//!
//! A message source yields an [`OutboundSms`] (destination and body). The
//! producer binds it to a modem, turning it into a [`Message`] that then
//! moves by value through the dispatch queue to a worker.

use serde::{Deserialize, Serialize};

use crate::{DomainError, DomainResult, ModemId};

/// An SMS waiting to be assigned to a modem.
///
/// Deserialization goes through [`OutboundSms::new`], so an empty
/// destination is rejected there too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawOutboundSms")]
pub struct OutboundSms {
    destination: String,
    body: String,
}

impl OutboundSms {
    /// Creates an outbound SMS.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::EmptyField` if `destination` is empty.
    pub fn new(destination: impl Into<String>, body: impl Into<String>) -> DomainResult<Self> {
        let destination = destination.into();
        if destination.trim().is_empty() {
            return Err(DomainError::EmptyField {
                field: "destination",
            });
        }
        Ok(Self {
            destination,
            body: body.into(),
        })
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Binds this SMS to the modem that will transmit it.
    #[must_use]
    pub fn for_modem(self, modem_id: ModemId) -> Message {
        Message {
            destination: self.destination,
            body: self.body,
            modem_id,
        }
    }
}

/// Unvalidated wire form of [`OutboundSms`].
#[derive(Deserialize)]
struct RawOutboundSms {
    destination: String,
    body: String,
}

impl TryFrom<RawOutboundSms> for OutboundSms {
    type Error = DomainError;

    fn try_from(raw: RawOutboundSms) -> DomainResult<Self> {
        Self::new(raw.destination, raw.body)
    }
}

/// An SMS bound to a modem, ready for dispatch.
///
/// Immutable once built; it is owned by exactly one pipeline stage at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    destination: String,
    body: String,
    modem_id: ModemId,
}

impl Message {
    /// Phone number the SMS is addressed to.
    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Text of the SMS.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Modem that will transmit the SMS.
    pub fn modem_id(&self) -> &ModemId {
        &self.modem_id
    }
}
