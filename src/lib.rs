//! Certificate expiry metrics.
//!
//! Loads the leaf X.509 certificate from a file or a live TLS endpoint and
//! reports how long ago it was issued and how long until it expires:
//!
//! ```no_run
//! use cert_checks::{collect_metrics, CheckOptions, Deadline};
//! use std::time::Duration;
//!
//! let options = CheckOptions::default().with_server_name("sensu.io");
//! let metrics = collect_metrics(
//!     "https://sensu.io",
//!     &options,
//!     Some(Deadline::after(Duration::from_secs(5))),
//! )?;
//! println!("{}", metrics);
//! # Ok::<(), cert_checks::CertCheckError>(())
//! ```

pub mod config;
pub mod error;
pub mod hostname;
pub mod loader;
pub mod location;
pub mod metrics;

use std::time::SystemTime;

pub use error::{CertCheckError, ErrorKind, Result};
pub use hostname::verify_hostname;
pub use loader::Deadline;
pub use location::{Location, NetworkScheme, TlsTarget};
pub use metrics::{Metrics, OutputFormat, Tags};

/// Source of the evaluation instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Clock {
    /// Wall-clock time, sampled once per check
    #[default]
    System,
    /// A pinned instant, for reproducible output
    Fixed(SystemTime),
}

impl Clock {
    pub fn now(&self) -> SystemTime {
        match self {
            Clock::System => SystemTime::now(),
            Clock::Fixed(instant) => *instant,
        }
    }
}

/// Per-check settings supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// Sent as SNI and verified against the certificate when set
    pub server_name: Option<String>,
    pub output: OutputFormat,
    pub clock: Clock,
}

impl CheckOptions {
    pub fn with_server_name(mut self, server_name: impl Into<String>) -> Self {
        let server_name = server_name.into();
        self.server_name = (!server_name.is_empty()).then_some(server_name);
        self
    }

    pub fn with_output(mut self, output: OutputFormat) -> Self {
        self.output = output;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }
}

/// Loads the certificate at `location` and computes its metrics.
///
/// `deadline` bounds the network strategy only; file reads ignore it. The
/// evaluation instant is sampled once, after the certificate is loaded.
pub fn collect_metrics(
    location: &str,
    options: &CheckOptions,
    deadline: Option<Deadline>,
) -> Result<Metrics> {
    let server_name = options.server_name.as_deref();
    let source = Location::parse(location, server_name)?;
    let certificate = source.load(deadline)?;
    Metrics::collect(
        &certificate,
        options.clock.now(),
        server_name,
        options.output,
    )
}
