//! Error types for certificate checks.
//!
//! Every stage of a check (location parsing, loading, hostname verification)
//! reports failures through [`CertCheckError`]. Variants carry the location,
//! path or address involved so the message is actionable on its own.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Error type for certificate check failures.
///
/// None of these are retried; each one ends the check that produced it.
#[derive(Debug, Error)]
pub enum CertCheckError {
    /// The location string could not be understood at all
    #[error("error parsing cert location {location:?}: {reason}")]
    InvalidLocation {
        /// The location as supplied
        location: String,
        /// Why it was rejected
        reason: String,
    },

    /// The location parsed, but its scheme has no loader
    #[error("unsupported certificate location scheme \"{scheme}\" for {location}")]
    UnsupportedScheme {
        /// The offending scheme
        scheme: String,
        /// The location as supplied
        location: String,
    },

    /// The certificate file does not exist
    #[error("file not found: {}", .path.display())]
    NotFound {
        /// Path that was looked up
        path: PathBuf,
    },

    /// The location names something that is not a regular file
    #[error("cannot use directory: {}", .path.display())]
    InvalidTarget {
        /// Path that was looked up
        path: PathBuf,
    },

    /// Reading the certificate file failed
    #[error("error reading certificate file {}: {source}", .path.display())]
    Io {
        /// File being read
        path: PathBuf,
        /// The underlying I/O error
        source: io::Error,
    },

    /// No PEM block could be decoded from the file contents
    #[error("error decoding PEM data from {}: {reason}", .path.display())]
    Decode {
        /// File being decoded
        path: PathBuf,
        /// Decoder message
        reason: String,
    },

    /// The DER body is not a valid X.509 certificate
    #[error("error parsing x509 certificate from {origin}: {source}")]
    Parse {
        /// Where the bytes came from (path or address)
        origin: String,
        /// The underlying OpenSSL error
        source: openssl::error::ErrorStack,
    },

    /// A TCP connection to the target could not be established
    #[error("error dialing TLS connection to {address}: {source}")]
    Dial {
        /// The host:port being dialed
        address: String,
        /// The underlying I/O error (refused, unresolvable, timed out)
        source: io::Error,
    },

    /// The TLS handshake did not complete
    #[error("error completing TLS handshake with {address}: {details}")]
    Handshake {
        /// The host:port of the peer
        address: String,
        /// Details about why the handshake failed
        details: String,
    },

    /// The certificate does not cover the requested server name
    #[error("error supplied servername not valid for this certificate: {server_name} is not among {names:?}")]
    HostnameMismatch {
        /// Name that was requested
        server_name: String,
        /// Names the certificate does cover
        names: Vec<String>,
    },
}

/// Coarse classification of a [`CertCheckError`], handy for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidLocation,
    UnsupportedScheme,
    NotFound,
    InvalidTarget,
    Io,
    Decode,
    Parse,
    Dial,
    Handshake,
    HostnameMismatch,
}

impl CertCheckError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidLocation { .. } => ErrorKind::InvalidLocation,
            Self::UnsupportedScheme { .. } => ErrorKind::UnsupportedScheme,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidTarget { .. } => ErrorKind::InvalidTarget,
            Self::Io { .. } => ErrorKind::Io,
            Self::Decode { .. } => ErrorKind::Decode,
            Self::Parse { .. } => ErrorKind::Parse,
            Self::Dial { .. } => ErrorKind::Dial,
            Self::Handshake { .. } => ErrorKind::Handshake,
            Self::HostnameMismatch { .. } => ErrorKind::HostnameMismatch,
        }
    }

    /// True for failures caused by the certificate bytes themselves.
    pub fn is_malformed_certificate(&self) -> bool {
        matches!(self.kind(), ErrorKind::Decode | ErrorKind::Parse)
    }
}

pub type Result<T> = std::result::Result<T, CertCheckError>;
