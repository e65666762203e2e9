//! Configuration file management for cert-checks.
//!
//! This module handles loading, parsing, and merging configuration from TOML files
//! and command-line arguments. Settings can be specified in multiple places with
//! clear precedence rules.
//!
//! # Configuration Precedence
//!
//! 1. Default values (lowest priority)
//! 2. Configuration file (cert-checks.toml or specified with --config)
//! 3. Environment variables and command-line arguments (highest priority)
//!
//! # Example Configuration File
//!
//! ```toml
//! cert = "https://dev1.sensu.io:8443"
//! servername = "dev1.sensu.io"
//! influx = false
//! timeout = 10
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::metrics::OutputFormat;
use crate::{CheckOptions, Deadline};

/// File looked up in the working directory when no --config is given.
pub const DEFAULT_CONFIG_FILE: &str = "cert-checks.toml";

/// Main configuration structure for cert-checks.
///
/// All fields are optional to support partial configuration and merging.
/// Missing values will be filled in by defaults or overridden by CLI arguments.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// URL or path of the certificate to inspect
    pub cert: Option<String>,
    /// TLS server name extension value, also verified against the certificate
    pub servername: Option<String>,
    /// Sanitize tag values for InfluxDB
    pub influx: Option<bool>,
    /// Overall deadline in seconds; 0 disables it
    pub timeout: Option<u64>,
}

impl Config {
    /// Loads configuration from a TOML file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the TOML configuration file
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Successfully parsed configuration
    /// * `Err(ConfigError::Io)` - File could not be read
    /// * `Err(ConfigError::Parse)` - File contains invalid TOML
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use cert_checks::config::Config;
    /// let config = Config::from_file("cert-checks.toml")?;
    /// # Ok::<(), cert_checks::config::ConfigError>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        Ok(config)
    }

    /// Creates a configuration with the built-in defaults.
    ///
    /// # Default Values
    ///
    /// - `cert`: None (must be provided)
    /// - `servername`: None
    /// - `influx`: false
    /// - `timeout`: 0 (no overall deadline)
    pub fn defaults() -> Self {
        Config {
            cert: None,
            servername: None,
            influx: Some(false),
            timeout: Some(0),
        }
    }

    /// Merges this configuration with another, prioritizing the other's values.
    ///
    /// For each field, if the `other` config has a value (Some), it overrides
    /// this config's value. If the `other` value is None, keeps the current value.
    ///
    /// # Example
    ///
    /// ```
    /// # use cert_checks::config::Config;
    /// let defaults = Config::defaults();
    /// let file_config = Config::from_file("config.toml").unwrap_or_default();
    /// let merged = defaults.merge_with(file_config);
    /// ```
    pub fn merge_with(mut self, other: Config) -> Self {
        if other.cert.is_some() {
            self.cert = other.cert;
        }
        if other.servername.is_some() {
            self.servername = other.servername;
        }
        if other.influx.is_some() {
            self.influx = other.influx;
        }
        if other.timeout.is_some() {
            self.timeout = other.timeout;
        }
        self
    }

    /// Creates a Config from command-line arguments for merging.
    ///
    /// Only provided arguments (Some values) will override other configurations.
    pub fn from_cli_args(
        cert: Option<String>,
        servername: Option<String>,
        influx: Option<bool>,
        timeout: Option<u64>,
    ) -> Self {
        Config {
            cert,
            servername,
            influx,
            timeout,
        }
    }

    /// Returns the certificate location, rejecting a missing or blank one.
    pub fn require_cert(&self) -> Result<&str, ConfigError> {
        match self.cert.as_deref().map(str::trim) {
            Some(cert) if !cert.is_empty() => Ok(cert),
            _ => Err(ConfigError::Validation(
                "--cert is required. must be URL to certificate. ex: file:///var/run/app/site.crt, https://dev1.sensu.io:8443, tcp://127.0.0.1:443"
                    .to_string(),
            )),
        }
    }

    /// Check options derived from this configuration.
    pub fn check_options(&self) -> CheckOptions {
        let output = if self.influx.unwrap_or(false) {
            OutputFormat::Influx
        } else {
            OutputFormat::Prometheus
        };
        let options = CheckOptions::default().with_output(output);
        match &self.servername {
            Some(name) => options.with_server_name(name.as_str()),
            None => options,
        }
    }

    /// Overall deadline starting now, if a non-zero timeout is configured.
    pub fn deadline(&self) -> Option<Deadline> {
        self.timeout
            .filter(|seconds| *seconds > 0)
            .map(|seconds| Deadline::after(Duration::from_secs(seconds)))
    }

    /// Generates an example configuration file in TOML format.
    ///
    /// # Example
    ///
    /// ```
    /// # use cert_checks::config::Config;
    /// let example = Config::example_toml();
    /// println!("{}", example);
    /// ```
    pub fn example_toml() -> String {
        let example = Config {
            cert: Some("https://dev1.sensu.io:8443".to_string()),
            servername: Some("dev1.sensu.io".to_string()),
            influx: Some(false),
            timeout: Some(10),
        };

        toml::to_string_pretty(&example)
            .unwrap_or_else(|_| "# Error generating example".to_string())
    }
}

/// Errors that can occur during configuration loading and parsing.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error (file not found, permission denied, etc.)
    #[error("IO Error: {0}")]
    Io(String),
    /// TOML parsing error (invalid syntax, type mismatch, etc.)
    #[error("Parse Error: {0}")]
    Parse(String),
    /// Validation error (missing required fields, invalid values, etc.)
    #[error("{0}")]
    Validation(String),
}
