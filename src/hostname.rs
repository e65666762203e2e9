//! Server name verification against a certificate.
//!
//! IP literals are compared with the IP address SAN entries. DNS names are
//! compared case-insensitively with the DNS SAN entries, where a left-most
//! `*` label stands for exactly one label. The subject common name is only
//! considered when the certificate has no DNS SAN entries at all.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use openssl::nid::Nid;
use openssl::x509::X509Ref;

use crate::error::{CertCheckError, Result};

/// Checks that `cert` is valid for `server_name`.
pub fn verify_hostname(cert: &X509Ref, server_name: &str) -> Result<()> {
    let host = server_name.trim_end_matches('.');
    let literal = host.trim_start_matches('[').trim_end_matches(']');

    let (matched, names): (bool, Vec<String>) = if let Ok(ip) = literal.parse::<IpAddr>() {
        let addresses = ip_addresses(cert);
        (
            addresses.contains(&ip),
            addresses.iter().map(IpAddr::to_string).collect(),
        )
    } else {
        let mut names = dns_names(cert);
        if names.is_empty() {
            names.extend(common_name(cert));
        }
        (names.iter().any(|pattern| matches_pattern(pattern, host)), names)
    };

    if matched {
        Ok(())
    } else {
        Err(CertCheckError::HostnameMismatch {
            server_name: server_name.to_string(),
            names,
        })
    }
}

/// First subject common name, if the certificate has one.
pub fn common_name(cert: &X509Ref) -> Option<String> {
    cert.subject_name()
        .entries_by_nid(Nid::COMMONNAME)
        .next()
        .and_then(|entry| entry.data().as_utf8().ok())
        .map(|name| name.to_string())
}

/// DNS entries of the subject alternative name extension.
pub fn dns_names(cert: &X509Ref) -> Vec<String> {
    cert.subject_alt_names()
        .map(|sans| {
            sans.iter()
                .filter_map(|name| name.dnsname().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn ip_addresses(cert: &X509Ref) -> Vec<IpAddr> {
    cert.subject_alt_names()
        .map(|sans| {
            sans.iter()
                .filter_map(|name| name.ipaddress().and_then(ip_from_bytes))
                .collect()
        })
        .unwrap_or_default()
}

fn ip_from_bytes(bytes: &[u8]) -> Option<IpAddr> {
    if let Ok(octets) = <[u8; 4]>::try_from(bytes) {
        return Some(IpAddr::V4(Ipv4Addr::from(octets)));
    }
    <[u8; 16]>::try_from(bytes)
        .ok()
        .map(|octets| IpAddr::V6(Ipv6Addr::from(octets)))
}

fn matches_pattern(pattern: &str, host: &str) -> bool {
    let pattern = pattern.trim_end_matches('.').to_ascii_lowercase();
    let host = host.to_ascii_lowercase();
    if pattern.is_empty() || host.is_empty() {
        return false;
    }
    match pattern.strip_prefix("*.") {
        Some(suffix) => match host.split_once('.') {
            Some((label, rest)) => !label.is_empty() && rest == suffix,
            None => false,
        },
        None => pattern == host,
    }
}
