//! Join key shared by every record category.

use std::borrow::Borrow;
use std::fmt::{self, Display, Formatter};

use serde::Serialize;

/// Unique device key (the hostname).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct DeviceIdentity(String);

impl DeviceIdentity {
    /// Wrap a hostname.
    #[must_use]
    pub fn new(hostname: impl Into<String>) -> Self {
        Self(hostname.into())
    }

    /// Borrow the hostname.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for DeviceIdentity {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl Borrow<str> for DeviceIdentity {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DeviceIdentity {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for DeviceIdentity {
    fn from(value: String) -> Self {
        Self(value)
    }
}
