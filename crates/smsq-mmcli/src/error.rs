//! Errors returned by modem management operations.

use smsq_core::ModemId;
use thiserror::Error;

/// Errors that can occur while talking to the modem manager.
#[derive(Debug, Error)]
pub enum ModemError {
    /// The modem manager reported no modems
    #[error("no modems were found")]
    NoModems,

    /// The command could not be started at all
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The command ran but exited unsuccessfully
    #[error("{command} failed: {output}")]
    CommandFailed { command: String, output: String },

    /// Creating the SMS succeeded but no SMS path was printed
    #[error("sms id not found in output of modem {modem_id}")]
    SmsIdNotFound { modem_id: ModemId },

    /// An argument cannot be expressed in mmcli's key/value syntax
    #[error("invalid {field}: {reason}")]
    InvalidArgument { field: &'static str, reason: String },
}
