//! Modem identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{DomainError, DomainResult};

/// Identifier of a hardware modem as reported by the modem manager.
///
/// Usually a ModemManager object path such as
/// `/org/freedesktop/ModemManager1/Modem/0`, but any token without
/// whitespace is accepted (`mmcli -m` also takes bare indices like `0`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModemId(String);

impl ModemId {
    /// Creates a modem ID without validation.
    ///
    /// Use [`ModemId::parse`] for identifiers coming from external output.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Parses and validates a modem identifier.
    ///
    /// Leading and trailing whitespace is trimmed. Empty identifiers and
    /// identifiers with inner whitespace are rejected.
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let id = raw.trim();
        if id.is_empty() {
            return Err(DomainError::EmptyField { field: "modem_id" });
        }
        if id.chars().any(char::is_whitespace) {
            return Err(DomainError::InvalidFieldValue {
                field: "modem_id".to_string(),
                value: id.to_string(),
                expected: "a single token without whitespace".to_string(),
            });
        }
        Ok(Self(id.to_string()))
    }

    /// Returns the underlying string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the trailing path segment (`"0"` for `.../Modem/0`).
    ///
    /// Useful for compact log output.
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for ModemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ModemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ModemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for ModemId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
