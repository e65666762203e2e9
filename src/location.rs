//! Classifies a certificate location into a loading strategy.
//!
//! Accepted forms:
//!
//! - a bare path, absolute or relative (`/etc/ssl/site.crt`, `certs/site.pem`)
//! - `file:///etc/ssl/site.crt`
//! - `https://host[:port]` (port defaults to 443)
//! - `tcp://host:port`, `tcp4://host:port`, `tcp6://host:port`
//!
//! Anything else is rejected here, before any network or file I/O beyond a
//! `stat` of the candidate path.

use std::fmt;
use std::fs;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use strum_macros::{Display, EnumString};
use url::{Host, Url};

use crate::error::{CertCheckError, Result};

const FILE_PREFIX: &str = "file://";
const HTTPS_DEFAULT_PORT: u16 = 443;

/// Transport family used to reach a TLS endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum NetworkScheme {
    /// Either address family
    Tcp,
    /// IPv4 only
    Tcp4,
    /// IPv6 only
    Tcp6,
}

impl NetworkScheme {
    pub fn accepts(&self, address: &SocketAddr) -> bool {
        match self {
            NetworkScheme::Tcp => true,
            NetworkScheme::Tcp4 => address.is_ipv4(),
            NetworkScheme::Tcp6 => address.is_ipv6(),
        }
    }
}

/// A TLS endpoint to fetch the leaf certificate from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsTarget {
    pub scheme: NetworkScheme,
    /// Host name or IP literal, without IPv6 brackets
    pub host: String,
    pub port: u16,
    /// Overrides the SNI name sent during the handshake
    pub server_name: Option<String>,
}

impl TlsTarget {
    /// `host:port`, bracketing IPv6 literals.
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Name to present via SNI: the override if any, else the host when it
    /// is a DNS name. IP literals are never sent.
    pub fn sni_name(&self) -> Option<&str> {
        match &self.server_name {
            Some(name) => Some(name.as_str()),
            None if self.host.parse::<IpAddr>().is_ok() => None,
            None => Some(self.host.as_str()),
        }
    }
}

impl fmt::Display for TlsTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.address())
    }
}

/// Where a certificate comes from. Exactly one strategy per location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// A PEM file on the local filesystem
    File(PathBuf),
    /// The leaf certificate presented during a TLS handshake
    Tls(TlsTarget),
}

impl Location {
    /// Parses `location`, carrying `server_name` into the TLS strategy.
    ///
    /// An empty `server_name` is treated as absent.
    pub fn parse(location: &str, server_name: Option<&str>) -> Result<Location> {
        if let Some(path) = location.strip_prefix(FILE_PREFIX) {
            return Self::from_path(Path::new(path));
        }

        let url = match Url::parse(location) {
            Ok(url) => url,
            // no scheme at all: a plain filesystem path
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                return Self::from_path(Path::new(location));
            }
            Err(e) => {
                return Err(CertCheckError::InvalidLocation {
                    location: location.to_string(),
                    reason: format!("error parsing certificate location as network url: {}", e),
                });
            }
        };

        let (scheme, default_port) = match url.scheme() {
            "file" => {
                let path = url.to_file_path().map_err(|_| CertCheckError::InvalidLocation {
                    location: location.to_string(),
                    reason: "not a local file url".to_string(),
                })?;
                return Self::from_path(&path);
            }
            "https" => (NetworkScheme::Tcp, Some(HTTPS_DEFAULT_PORT)),
            other => match other.parse::<NetworkScheme>() {
                Ok(scheme) => (scheme, None),
                Err(_) => {
                    return Err(CertCheckError::UnsupportedScheme {
                        scheme: other.to_string(),
                        location: location.to_string(),
                    });
                }
            },
        };

        let host = match url.host() {
            Some(Host::Domain(domain)) if !domain.is_empty() => domain.to_string(),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Ipv6(addr)) => addr.to_string(),
            _ => {
                return Err(CertCheckError::InvalidLocation {
                    location: location.to_string(),
                    reason: "missing host".to_string(),
                });
            }
        };
        let port = url
            .port()
            .or(default_port)
            .ok_or_else(|| CertCheckError::InvalidLocation {
                location: location.to_string(),
                reason: "missing port".to_string(),
            })?;

        Ok(Location::Tls(TlsTarget {
            scheme,
            host,
            port,
            server_name: server_name
                .filter(|name| !name.is_empty())
                .map(str::to_string),
        }))
    }

    fn from_path(path: &Path) -> Result<Location> {
        let metadata = fs::metadata(path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => CertCheckError::NotFound {
                path: path.to_path_buf(),
            },
            _ => CertCheckError::Io {
                path: path.to_path_buf(),
                source,
            },
        })?;
        if metadata.is_dir() {
            return Err(CertCheckError::InvalidTarget {
                path: path.to_path_buf(),
            });
        }
        Ok(Location::File(path.to_path_buf()))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::File(path) => write!(f, "{}{}", FILE_PREFIX, path.display()),
            Location::Tls(target) => target.fmt(f),
        }
    }
}
