//! smsq mmcli - modem management for the smsq dispatcher
//!
//! Exposes the [`ModemManager`] capability the dispatch pipeline consumes
//! and two implementations of it:
//! - [`Mmcli`] drives ModemManager through the `mmcli` command line tool
//! - [`DryRunModemManager`] only logs, for running without hardware
//!
//! # Panic-Free Guarantees
//!
//! This crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Command failures and unexpected output are returned as `ModemError`

mod dry_run;
mod error;
mod manager;
mod mmcli;

pub use dry_run::DryRunModemManager;
pub use error::ModemError;
pub use manager::ModemManager;
pub use mmcli::{
    parse_created_sms_path, parse_modem_list, Mmcli, DEFAULT_MMCLI_PATH, DEFAULT_POST_SEND_DELAY,
};
