//! Validation System - Credential Gate
//!
//! Enumerated fields are checked against fixed allowed sets before anything
//! else runs. A rejected value never becomes a silent default.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Allowed `security_standard` values. Empty means an open network.
pub const SECURITY_STANDARDS: &[&str] = &["WPA", "WEP", ""];

/// Allowed `hidden` values. Empty means a visible network.
pub const HIDDEN_VALUES: &[&str] = &["true", ""];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid configuration: {field} = {value:?}, choose from {allowed:?}")]
pub struct InvalidConfiguration {
    pub field: &'static str,
    pub value: String,
    pub allowed: &'static [&'static str],
}

impl InvalidConfiguration {
    fn new(field: &'static str, value: &str, allowed: &'static [&'static str]) -> Self {
        Self {
            field,
            value: value.to_string(),
            allowed,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SecurityStandard {
    #[default]
    Wpa,
    Wep,
    Open,
}

impl SecurityStandard {
    /// The value written into the wire string and templates.
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityStandard::Wpa => "WPA",
            SecurityStandard::Wep => "WEP",
            SecurityStandard::Open => "",
        }
    }
}

impl FromStr for SecurityStandard {
    type Err = InvalidConfiguration;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WPA" => Ok(SecurityStandard::Wpa),
            "WEP" => Ok(SecurityStandard::Wep),
            "" => Ok(SecurityStandard::Open),
            other => Err(InvalidConfiguration::new(
                "security_standard",
                other,
                SECURITY_STANDARDS,
            )),
        }
    }
}

impl fmt::Display for SecurityStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse the `hidden` field: `"true"` or empty.
pub fn parse_hidden(value: &str) -> Result<bool, InvalidConfiguration> {
    match value {
        "true" => Ok(true),
        "" => Ok(false),
        other => Err(InvalidConfiguration::new("hidden", other, HIDDEN_VALUES)),
    }
}

/// A validated credential profile.
///
/// Only obtainable through [`Credentials::new`], so holding one means both
/// enumerated fields passed validation. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    ssid: String,
    password: String,
    security_standard: SecurityStandard,
    hidden: bool,
}

impl Credentials {
    pub fn new(
        ssid: impl Into<String>,
        password: impl Into<String>,
        security_standard: &str,
        hidden: &str,
    ) -> Result<Self, InvalidConfiguration> {
        let security_standard = security_standard.parse()?;
        let hidden = parse_hidden(hidden)?;

        Ok(Self {
            ssid: ssid.into(),
            password: password.into(),
            security_standard,
            hidden,
        })
    }

    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn security_standard(&self) -> SecurityStandard {
        self.security_standard
    }

    pub fn hidden(&self) -> bool {
        self.hidden
    }

    /// The `hidden` field as it appears in the wire string.
    pub fn hidden_str(&self) -> &'static str {
        if self.hidden { "true" } else { "" }
    }

    /// Connection string consumed by scanning devices. Never escaped.
    ///
    /// `WIFI:T:<security>;S:<ssid>;P:<password>;H:<hidden>;`
    pub fn wire_string(&self) -> String {
        format!(
            "WIFI:T:{};S:{};P:{};H:{};",
            self.security_standard.as_str(),
            self.ssid,
            self.password,
            self.hidden_str()
        )
    }
}
