//! Certificate loading strategies.
//!
//! # Submodules
//!
//! - `file` - PEM file on disk
//! - `tls` - leaf certificate from a TLS handshake

pub mod file;
pub mod tls;

use std::time::{Duration, Instant};

use openssl::x509::X509;

use crate::error::Result;
use crate::location::Location;

/// Network budget used when the caller supplies no deadline.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(10);

const MAX_TIMEOUT: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// Absolute point in time by which a network load must finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline(Instant);

impl Deadline {
    pub fn at(instant: Instant) -> Self {
        Deadline(instant)
    }

    /// A deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        let now = Instant::now();
        Deadline(now.checked_add(timeout).unwrap_or(now + MAX_TIMEOUT))
    }

    /// Time left before the deadline, or `None` once it has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.0
            .checked_duration_since(Instant::now())
            .filter(|left| !left.is_zero())
    }
}

impl Location {
    /// Fetches the certificate this location points at.
    ///
    /// `deadline` applies to the TLS strategy only and defaults to
    /// [`DEFAULT_DIAL_TIMEOUT`] from now.
    pub fn load(&self, deadline: Option<Deadline>) -> Result<X509> {
        match self {
            Location::File(path) => file::load_pem(path),
            Location::Tls(target) => {
                let deadline = deadline.unwrap_or_else(|| Deadline::after(DEFAULT_DIAL_TIMEOUT));
                tls::fetch_leaf(target, deadline)
            }
        }
    }
}
