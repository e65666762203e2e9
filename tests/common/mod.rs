//! Throwaway certificates and loopback servers for integration tests.

#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::ssl::{NameType, SniError, SslAcceptor, SslContext, SslMethod};
use openssl::x509::extension::SubjectAlternativeName;
use openssl::x509::{X509NameBuilder, X509};

pub const LIFETIME: Duration = Duration::from_secs(72 * 60 * 60);

pub struct TestCert {
    pub cert: X509,
    pub key: PKey<Private>,
    pub not_before: i64,
}

impl TestCert {
    pub fn issued_at(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(self.not_before as u64)
    }

    pub fn expires_at(&self) -> SystemTime {
        self.issued_at() + LIFETIME
    }

    pub fn pem(&self) -> Vec<u8> {
        self.cert.to_pem().unwrap()
    }

    pub fn write_to(&self, dir: &Path, file_name: &str) -> PathBuf {
        let path = dir.join(file_name);
        std::fs::write(&path, self.pem()).unwrap();
        path
    }
}

/// Self-signed certificate for `host`, valid for [`LIFETIME`] from `not_before`.
pub fn issue(host: &str, not_before: i64) -> TestCert {
    issue_with_names(Some(host), &[host], &[], not_before)
}

pub fn issue_with_names(
    common_name: Option<&str>,
    dns_names: &[&str],
    ip_addresses: &[&str],
    not_before: i64,
) -> TestCert {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    let key = PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap();

    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_nid(Nid::ORGANIZATIONNAME, "Acme Co")
        .unwrap();
    if let Some(common_name) = common_name {
        name.append_entry_by_nid(Nid::COMMONNAME, common_name)
            .unwrap();
    }
    let name = name.build();

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(not_before as u32).unwrap();
    builder
        .set_serial_number(&serial.to_asn1_integer().unwrap())
        .unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder
        .set_not_before(&Asn1Time::from_unix(not_before).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::from_unix(not_before + LIFETIME.as_secs() as i64).unwrap())
        .unwrap();

    if !dns_names.is_empty() || !ip_addresses.is_empty() {
        let mut san = SubjectAlternativeName::new();
        for dns in dns_names {
            san.dns(dns);
        }
        for ip in ip_addresses {
            san.ip(ip);
        }
        let extension = san.build(&builder.x509v3_context(None, None)).unwrap();
        builder.append_extension(extension).unwrap();
    }

    builder.sign(&key, MessageDigest::sha256()).unwrap();
    TestCert {
        cert: builder.build(),
        key,
        not_before,
    }
}

/// Serves `default` over TLS on loopback, switching to an alternate
/// certificate when the client's SNI names one of `virtual_hosts`.
pub fn spawn_tls_server(default: &TestCert, virtual_hosts: &[(&str, &TestCert)]) -> SocketAddr {
    spawn_tls_server_on("127.0.0.1:0", default, virtual_hosts).unwrap()
}

/// Like [`spawn_tls_server`], bound to `bind`. Fails when the address
/// cannot be bound, e.g. `[::1]:0` on a host without IPv6.
pub fn spawn_tls_server_on(
    bind: &str,
    default: &TestCert,
    virtual_hosts: &[(&str, &TestCert)],
) -> std::io::Result<SocketAddr> {
    let listener = TcpListener::bind(bind)?;
    let addr = listener.local_addr()?;

    let mut alternates = Vec::new();
    for (host, cert) in virtual_hosts {
        let mut context = SslContext::builder(SslMethod::tls_server()).unwrap();
        context.set_certificate(&cert.cert).unwrap();
        context.set_private_key(&cert.key).unwrap();
        alternates.push((host.to_string(), context.build()));
    }

    let mut acceptor = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls()).unwrap();
    acceptor.set_certificate(&default.cert).unwrap();
    acceptor.set_private_key(&default.key).unwrap();
    acceptor.check_private_key().unwrap();
    acceptor.set_servername_callback(move |ssl, _alert| {
        let requested = ssl.servername(NameType::HOST_NAME).map(str::to_string);
        if let Some(requested) = requested {
            if let Some((_, context)) = alternates.iter().find(|(host, _)| *host == requested) {
                ssl.set_ssl_context(context)
                    .map_err(|_| SniError::ALERT_FATAL)?;
            }
        }
        Ok(())
    });
    let acceptor = Arc::new(acceptor.build());

    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let acceptor = Arc::clone(&acceptor);
            thread::spawn(move || {
                if let Ok(mut tls) = acceptor.accept(stream) {
                    let mut buf = [0u8; 1];
                    let _ = tls.read(&mut buf);
                }
            });
        }
    });
    Ok(addr)
}

/// A listener that answers anything with a plaintext HTTP error.
pub fn spawn_plaintext_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        for mut stream in listener.incoming().flatten() {
            let mut buf = [0u8; 1024];
            let _ = stream.read(&mut buf);
            let _ = stream.write_all(b"HTTP/1.1 400 Bad Request\r\nConnection: close\r\n\r\n");
        }
    });
    addr
}

/// A listener that accepts connections and never says anything.
pub fn spawn_silent_server(hold: Duration) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            thread::spawn(move || {
                thread::sleep(hold);
                drop(stream);
            });
        }
    });
    addr
}

/// A loopback port with nothing listening on it.
pub fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}
