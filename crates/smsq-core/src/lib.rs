//! smsq Core - Shared types for modem SMS dispatch
//!
//! This crate provides the domain types shared between the
//! dispatch daemon (smsqd) and the modem-management wrapper (smsq-mmcli).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod error;
pub mod message;
pub mod modem;

// Re-exports for convenience
pub use error::{DomainError, DomainResult};
pub use message::{Message, OutboundSms};
pub use modem::ModemId;
