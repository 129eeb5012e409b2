//! DM connection configuration.
//!
//! [`DmConfig`] is what callers hand to
//! [`ConnectionManager::connect`](crate::ConnectionManager::connect);
//! [`ConnectDescriptor`] is the driver-facing form computed from it.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::{DmRsError, DriverError, Result};

/// Port DM listens on when none is configured.
pub const DEFAULT_PORT: u16 = 5236;

/// DM connection configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DmConfig {
    /// Hostname or IP address
    pub host: String,
    /// Port number (default: 5236)
    pub port: Option<u16>,
    pub username: String,
    pub password: String,
    /// Used both as model namespace and schema
    pub database: Option<String>,
    /// Session timezone (default: +00:00)
    pub timezone: String,
    pub support_big_numbers: Option<bool>,
    pub big_number_strings: Option<bool>,
    /// Driver-specific options layered over the computed descriptor
    pub dialect_options: BTreeMap<String, String>,
}

impl Default for DmConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: None,
            username: String::new(),
            password: String::new(),
            database: None,
            timezone: "+00:00".to_string(),
            support_big_numbers: None,
            big_number_strings: None,
            dialect_options: BTreeMap::new(),
        }
    }
}

impl DmConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }

    pub fn support_big_numbers(mut self, enabled: bool) -> Self {
        self.support_big_numbers = Some(enabled);
        self
    }

    pub fn big_number_strings(mut self, enabled: bool) -> Self {
        self.big_number_strings = Some(enabled);
        self
    }

    /// Set a driver-specific option, e.g. `"schema"` or `"loginEncrypt"`.
    pub fn dialect_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.dialect_options.insert(key.into(), value.into());
        self
    }

    /// Effective port.
    pub fn port_or_default(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    /// Builds the driver descriptor: computed defaults first, then the
    /// `dialect_options` overlay.
    pub fn descriptor(&self) -> Result<ConnectDescriptor> {
        let port = self.port_or_default();
        let mut descriptor = ConnectDescriptor {
            connect_string: format!(
                "dm://{}:{}@{}:{}?autoCommit=false&loginEncrypt=false",
                self.username, self.password, self.host, port
            ),
            host: self.host.clone(),
            port,
            user: self.username.clone(),
            password: self.password.clone(),
            model_name: self.database.clone(),
            schema: self.database.clone(),
            timezone: self.timezone.clone(),
            support_big_numbers: self.support_big_numbers.unwrap_or(true),
            big_number_strings: self.big_number_strings.unwrap_or(false),
            extras: BTreeMap::new(),
        };
        for (key, value) in &self.dialect_options {
            descriptor.apply(key, value)?;
        }
        Ok(descriptor)
    }
}

/// How wide integers in select results are exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BigNumberPolicy {
    /// Wide integers that fit in `i64` become plain integers.
    Narrow,
    /// Wide integers become decimal strings.
    Strings,
    /// Values are left as the driver delivered them.
    Preserve,
}

/// Driver-facing session descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectDescriptor {
    pub connect_string: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub model_name: Option<String>,
    pub schema: Option<String>,
    pub timezone: String,
    pub support_big_numbers: bool,
    pub big_number_strings: bool,
    /// Options the descriptor has no field for, passed to the driver as is.
    pub extras: BTreeMap<String, String>,
}

impl ConnectDescriptor {
    fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "connectString" => self.connect_string = value.to_string(),
            "host" => self.host = value.to_string(),
            "port" => self.port = parse_option(key, value)?,
            "user" => self.user = value.to_string(),
            "password" => self.password = value.to_string(),
            "modelName" => self.model_name = Some(value.to_string()),
            "schema" => self.schema = Some(value.to_string()),
            "timezone" => self.timezone = value.to_string(),
            "supportBigNumbers" => self.support_big_numbers = parse_option(key, value)?,
            "bigNumberStrings" => self.big_number_strings = parse_option(key, value)?,
            _ => {
                self.extras.insert(key.to_string(), value.to_string());
            }
        }
        Ok(())
    }

    pub fn big_number_policy(&self) -> BigNumberPolicy {
        match (self.support_big_numbers, self.big_number_strings) {
            (true, false) => BigNumberPolicy::Narrow,
            (true, true) => BigNumberPolicy::Strings,
            (false, _) => BigNumberPolicy::Preserve,
        }
    }

    /// Connect string with the password masked, for logs.
    pub fn redacted(&self) -> String {
        if self.password.is_empty() {
            return self.connect_string.clone();
        }
        self.connect_string
            .replacen(&format!(":{}@", self.password), ":***@", 1)
    }
}

fn parse_option<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| {
        DmRsError::InvalidConnectionConfig(DriverError::client(
            "EINVAL",
            format!("Invalid value `{value}` for option `{key}`"),
        ))
    })
}
