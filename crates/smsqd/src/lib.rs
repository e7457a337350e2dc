//! smsq Daemon - modem discovery and SMS dispatch
//!
//! This crate provides the dispatch pipeline of the smsq daemon:
//! - `registry` - append-only set of known modems
//! - `discovery` - periodic modem listing and enablement
//! - `producer` - fills the dispatch queue from a message source
//! - `queue` - bounded multi-consumer dispatch queue
//! - `worker` - pool of SMS senders with drain-on-shutdown
//! - `pipeline` - wiring and shutdown coordination
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         smsqd                                │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  ┌─────────────┐     ┌───────────────┐     ┌─────────────┐   │
//! │  │  Discovery  │────▶│ ModemRegistry │────▶│  Producer   │   │
//! │  └─────────────┘     └───────────────┘     └──────┬──────┘   │
//! │                                                   │          │
//! │                                   bounded queue   ▼          │
//! │                              ┌────────────────────────────┐  │
//! │                              │  Worker 1 .. Worker N      │  │
//! │                              └────────────────────────────┘  │
//! │                                                              │
//! │   Shutdown (CancellationToken) ──▶ every task above          │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Failure Model
//!
//! Nothing in the pipeline panics or unwinds across task boundaries:
//! - Send, enable and message-source failures are logged where they happen
//! - Only "no modems found" stops a loop (discovery), never the process
//! - Closing the dispatch queue is how the producer tells workers to finish

pub mod config;
pub mod discovery;
pub mod pipeline;
pub mod producer;
pub mod queue;
pub mod registry;
pub mod shutdown;
pub mod source;
pub mod worker;
