//! `mmcli` command line wrapper.
//!
//! Every operation spawns `mmcli` directly (no shell) and parses its
//! human-readable output. Stdout and stderr are merged before parsing,
//! since mmcli prints some diagnostics on either stream.
//!
//! # Output formats
//!
//! ```text
//! $ mmcli -L
//!     /org/freedesktop/ModemManager1/Modem/0 [Quectel] EC25
//!
//! $ mmcli -m 0 --messaging-create-sms="text='hi',number='+15551234567'"
//! Successfully created new SMS: /org/freedesktop/ModemManager1/SMS/21
//! ```

use std::time::Duration;

use async_trait::async_trait;
use smsq_core::{Message, ModemId};
use tokio::process::Command;
use tracing::{debug, trace, warn};

use crate::{ModemError, ModemManager};

/// Default program name, resolved through `PATH`.
pub const DEFAULT_MMCLI_PATH: &str = "mmcli";

/// Pause after each successful send, rate-limiting the modem hardware.
pub const DEFAULT_POST_SEND_DELAY: Duration = Duration::from_secs(10);

/// Exact text mmcli prints when the manager sees no modems.
const NO_MODEMS_OUTPUT: &str = "No modems were found";

/// [`ModemManager`] backed by the `mmcli` tool.
#[derive(Debug, Clone)]
pub struct Mmcli {
    program: String,
    post_send_delay: Duration,
}

impl Mmcli {
    /// Creates a wrapper around the given `mmcli` binary.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            post_send_delay: DEFAULT_POST_SEND_DELAY,
        }
    }

    /// Sets the pause applied after every successful send.
    #[must_use]
    pub fn with_post_send_delay(mut self, delay: Duration) -> Self {
        self.post_send_delay = delay;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn post_send_delay(&self) -> Duration {
        self.post_send_delay
    }

    /// Runs mmcli and returns whether it succeeded plus its merged output.
    async fn exec(&self, args: &[&str]) -> Result<(bool, String), ModemError> {
        trace!(program = %self.program, ?args, "Running mmcli");

        // Callers may abandon a pending call on shutdown; don't leave mmcli behind.
        let output = Command::new(&self.program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ModemError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok((output.status.success(), text))
    }

    /// Runs mmcli, turning a non-zero exit into `ModemError::CommandFailed`.
    async fn run(&self, args: &[&str]) -> Result<String, ModemError> {
        let (success, text) = self.exec(args).await?;
        if !success {
            return Err(ModemError::CommandFailed {
                command: format!("{} {}", self.program, args.join(" ")),
                output: text.trim().to_string(),
            });
        }
        Ok(text)
    }
}

impl Default for Mmcli {
    fn default() -> Self {
        Self::new(DEFAULT_MMCLI_PATH)
    }
}

#[async_trait]
impl ModemManager for Mmcli {
    async fn discover_modems(&self) -> Result<Vec<ModemId>, ModemError> {
        let (success, text) = self.exec(&["-L"]).await?;

        // mmcli may exit non-zero when nothing is attached; the text is what counts.
        if text.trim() == NO_MODEMS_OUTPUT {
            return Err(ModemError::NoModems);
        }
        if !success {
            return Err(ModemError::CommandFailed {
                command: format!("{} -L", self.program),
                output: text.trim().to_string(),
            });
        }

        parse_modem_list(&text)
    }

    async fn enable_modem(&self, modem_id: &ModemId) -> Result<(), ModemError> {
        self.run(&["-m", modem_id.as_str(), "--enable"]).await?;
        debug!(modem_id = %modem_id, "Modem enabled");
        Ok(())
    }

    async fn send_sms(&self, message: &Message) -> Result<(), ModemError> {
        let create_arg = create_sms_argument(message)?;
        let modem_id = message.modem_id();

        // Phase 1: create the SMS object on the modem.
        let created = self
            .run(&["-m", modem_id.as_str(), create_arg.as_str()])
            .await?;

        let sms_path =
            parse_created_sms_path(&created).ok_or_else(|| ModemError::SmsIdNotFound {
                modem_id: modem_id.clone(),
            })?;

        debug!(modem_id = %modem_id, sms = %sms_path, "SMS created");

        // Phase 2: transmit it.
        self.run(&["-s", sms_path.as_str(), "--send"]).await?;

        if !self.post_send_delay.is_zero() {
            tokio::time::sleep(self.post_send_delay).await;
        }

        Ok(())
    }
}

/// Builds the `--messaging-create-sms` argument for a message.
///
/// mmcli's key/value syntax wraps values in single quotes and has no escape,
/// so values containing `'` cannot be expressed.
fn create_sms_argument(message: &Message) -> Result<String, ModemError> {
    for (field, value) in [("body", message.body()), ("destination", message.destination())] {
        if value.contains('\'') {
            warn!(field, "Rejecting SMS with single quote");
            return Err(ModemError::InvalidArgument {
                field,
                reason: "single quotes are not supported by mmcli".to_string(),
            });
        }
    }

    Ok(format!(
        "--messaging-create-sms=text='{}',number='{}'",
        message.body(),
        message.destination()
    ))
}

/// Parses the output of `mmcli -L` into modem identifiers.
///
/// Every line mentioning `Modem` contributes its first field. Returns
/// `ModemError::NoModems` when the output says so or no line matches.
pub fn parse_modem_list(output: &str) -> Result<Vec<ModemId>, ModemError> {
    if output.trim() == NO_MODEMS_OUTPUT {
        return Err(ModemError::NoModems);
    }

    let modems: Vec<ModemId> = output
        .lines()
        .filter(|line| line.contains("Modem"))
        .filter_map(|line| line.split_whitespace().next())
        .filter_map(|field| ModemId::parse(field).ok())
        .collect();

    if modems.is_empty() {
        return Err(ModemError::NoModems);
    }

    Ok(modems)
}

/// Extracts the SMS object path from `--messaging-create-sms` output.
///
/// Returns the last field of the first line mentioning `SMS`.
pub fn parse_created_sms_path(output: &str) -> Option<String> {
    output
        .lines()
        .find(|line| line.contains("SMS"))
        .and_then(|line| line.split_whitespace().last())
        .map(|field| field.trim().to_string())
}
