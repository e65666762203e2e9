//! Leaf certificate retrieval over TLS.
//!
//! The peer's chain is deliberately not verified: the point is to inspect
//! certificates, including expired and self-signed ones.

use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::mpsc;
use std::thread;

use openssl::ssl::{HandshakeError, Ssl, SslContext, SslMethod, SslVerifyMode};
use openssl::x509::X509;

use super::Deadline;
use crate::error::{CertCheckError, Result};
use crate::location::TlsTarget;

/// Connects to `target`, completes a handshake and returns the peer's leaf
/// certificate.
///
/// Name resolution, connecting and the handshake are all bounded by
/// `deadline`; running out of time at any of them is a `Dial` error. The
/// system resolver cannot be interrupted, so a lookup that outlives the
/// deadline is abandoned on its worker thread rather than cancelled.
pub fn fetch_leaf(target: &TlsTarget, deadline: Deadline) -> Result<X509> {
    let address = target.address();
    let tcp_stream = dial(target, &address, &deadline)?;

    let remaining = deadline
        .remaining()
        .ok_or_else(|| timed_out(&address, "before the TLS handshake started"))?;
    tcp_stream
        .set_read_timeout(Some(remaining))
        .and_then(|_| tcp_stream.set_write_timeout(Some(remaining)))
        .map_err(|source| CertCheckError::Dial {
            address: address.clone(),
            source,
        })?;

    let setup_failed = |e: openssl::error::ErrorStack| CertCheckError::Handshake {
        address: address.clone(),
        details: e.to_string(),
    };
    let mut context = SslContext::builder(SslMethod::tls_client()).map_err(setup_failed)?;
    context.set_verify(SslVerifyMode::NONE);
    let context = context.build();

    let mut connector = Ssl::new(&context).map_err(setup_failed)?;
    if let Some(name) = target.sni_name() {
        connector.set_hostname(name).map_err(setup_failed)?;
    }

    let mut stream = connector
        .connect(tcp_stream)
        .map_err(|e| handshake_failed(&address, e))?;

    let leaf = stream.ssl().peer_certificate();
    // the certificate is already in hand; a failed close_notify changes nothing
    let _ = stream.shutdown();

    leaf.ok_or_else(|| CertCheckError::Handshake {
        address,
        details: "peer presented no certificate".to_string(),
    })
}

fn dial(target: &TlsTarget, address: &str, deadline: &Deadline) -> Result<TcpStream> {
    let dial_failed = |source: io::Error| CertCheckError::Dial {
        address: address.to_string(),
        source,
    };

    let candidates: Vec<SocketAddr> = resolve(target, address, deadline)?
        .into_iter()
        .filter(|candidate| target.scheme.accepts(candidate))
        .collect();
    if candidates.is_empty() {
        return Err(dial_failed(io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("no {} address found for {}", target.scheme, target.host),
        )));
    }

    let mut last_error = None;
    for candidate in candidates {
        let remaining = deadline
            .remaining()
            .ok_or_else(|| timed_out(address, "while connecting"))?;
        match TcpStream::connect_timeout(&candidate, remaining) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_error = Some(e),
        }
    }
    Err(dial_failed(last_error.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::NotConnected, "no address could be reached")
    })))
}

fn resolve(target: &TlsTarget, address: &str, deadline: &Deadline) -> Result<Vec<SocketAddr>> {
    let remaining = deadline
        .remaining()
        .ok_or_else(|| timed_out(address, "before resolving the host"))?;

    let (sender, receiver) = mpsc::channel();
    let host = target.host.clone();
    let port = target.port;
    thread::spawn(move || {
        let resolved = (host.as_str(), port)
            .to_socket_addrs()
            .map(|addrs| addrs.collect::<Vec<_>>());
        // the receiver is gone once the deadline has passed
        let _ = sender.send(resolved);
    });

    match receiver.recv_timeout(remaining) {
        Ok(resolved) => resolved.map_err(|source| CertCheckError::Dial {
            address: address.to_string(),
            source,
        }),
        Err(_) => Err(timed_out(address, "while resolving the host")),
    }
}

fn timed_out(address: &str, stage: &str) -> CertCheckError {
    CertCheckError::Dial {
        address: address.to_string(),
        source: io::Error::new(io::ErrorKind::TimedOut, format!("deadline exceeded {}", stage)),
    }
}

fn handshake_failed<S>(address: &str, error: HandshakeError<S>) -> CertCheckError {
    let details = match error {
        HandshakeError::SetupFailure(stack) => stack.to_string(),
        HandshakeError::WouldBlock(_) => {
            return timed_out(address, "during the TLS handshake");
        }
        HandshakeError::Failure(mid) => {
            if mid.error().io_error().is_some_and(is_timeout) {
                return timed_out(address, "during the TLS handshake");
            }
            mid.error().to_string()
        }
    };
    CertCheckError::Handshake {
        address: address.to_string(),
        details,
    }
}

/// Socket read/write timeouts surface as `WouldBlock` on Unix and
/// `TimedOut` on Windows.
fn is_timeout(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::location::NetworkScheme;
    use std::net::TcpListener;
    use std::time::{Duration, Instant};

    fn target(port: u16, scheme: NetworkScheme) -> TlsTarget {
        TlsTarget {
            scheme,
            host: "127.0.0.1".to_string(),
            port,
            server_name: None,
        }
    }

    #[test]
    fn test_expired_deadline_fails_before_connecting() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let deadline = Deadline::at(Instant::now() - Duration::from_secs(1));

        let err = fetch_leaf(&target(port, NetworkScheme::Tcp), deadline).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Dial);
    }

    #[test]
    fn test_address_family_filter() {
        let deadline = Deadline::after(Duration::from_secs(2));
        let err = fetch_leaf(&target(443, NetworkScheme::Tcp6), deadline).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Dial);
        assert!(err.to_string().contains("127.0.0.1"));
    }

    #[test]
    fn test_silent_peer_times_out_as_dial_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let deadline = Deadline::after(Duration::from_millis(200));

        let err = fetch_leaf(&target(port, NetworkScheme::Tcp), deadline).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Dial, "unexpected error {}", err);
        assert!(err.to_string().contains("during the TLS handshake"));
        drop(listener);
    }

    #[test]
    fn test_timeout_kinds() {
        assert!(is_timeout(&io::Error::from(io::ErrorKind::WouldBlock)));
        assert!(is_timeout(&io::Error::from(io::ErrorKind::TimedOut)));
        assert!(!is_timeout(&io::Error::from(io::ErrorKind::ConnectionReset)));
    }

    #[test]
    fn test_resolve_within_deadline() {
        let deadline = Deadline::after(Duration::from_secs(2));
        let addrs = resolve(&target(8443, NetworkScheme::Tcp), "127.0.0.1:8443", &deadline).unwrap();
        assert_eq!(addrs, vec!["127.0.0.1:8443".parse::<SocketAddr>().unwrap()]);
    }

    #[test]
    fn test_resolve_with_expired_deadline() {
        let deadline = Deadline::at(Instant::now() - Duration::from_secs(1));
        let err = resolve(&target(8443, NetworkScheme::Tcp), "127.0.0.1:8443", &deadline).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Dial);
        assert!(err.to_string().contains("before resolving"));
    }

    #[test]
    fn test_connection_refused() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let deadline = Deadline::after(Duration::from_secs(2));
        let err = fetch_leaf(&target(port, NetworkScheme::Tcp4), deadline).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Dial);
    }
}
