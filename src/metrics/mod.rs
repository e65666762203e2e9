//! Certificate validity metrics.
//!
//! [`Metrics::collect`] turns a certificate and an evaluation instant into
//! elapsed/remaining seconds plus a small tag set. Rendering lives in
//! `exposition`.
//!
//! # Submodules
//!
//! - `exposition` - line-oriented text output

pub mod exposition;

use std::time::{SystemTime, UNIX_EPOCH};

use openssl::asn1::{Asn1Time, Asn1TimeRef};
use openssl::x509::X509Ref;
use strum_macros::{Display, EnumString};

use crate::error::{CertCheckError, Result};
use crate::hostname::{common_name, verify_hostname};

pub use exposition::render;

pub const SECONDS_PER_DAY: f64 = 86_400.0;

const NANOS_PER_SECOND: i128 = 1_000_000_000;

/// How tag values are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum OutputFormat {
    /// Values as found in the certificate
    #[default]
    Prometheus,
    /// Subject rewritten for stores that reject `*` and `.` in identifiers
    Influx,
}

impl OutputFormat {
    /// Rewrites a subject for this format.
    ///
    /// Influx replaces the first `*` with `STAR` and every `.` with `_`.
    pub fn subject(&self, common_name: &str) -> String {
        match self {
            OutputFormat::Prometheus => common_name.to_string(),
            OutputFormat::Influx => common_name.replacen('*', "STAR", 1).replace('.', "_"),
        }
    }
}

/// Ordered `key="value"` labels attached to every metric line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags(Vec<(String, String)>);

impl Tags {
    pub fn new() -> Self {
        Tags::default()
    }

    /// Sets `key`, replacing an earlier value in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Tags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut tags = Tags::new();
        for (key, value) in iter {
            tags.insert(key, value);
        }
        tags
    }
}

/// Result of one check. Both durations come from the same `evaluated_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metrics {
    pub evaluated_at: SystemTime,
    /// Negative when evaluated before the certificate's `notBefore`
    pub seconds_since_issued: i64,
    /// Negative once the certificate has expired
    pub seconds_until_expires: i64,
    pub tags: Tags,
}

impl Metrics {
    pub fn new(evaluated_at: SystemTime, seconds_since_issued: i64, seconds_until_expires: i64) -> Self {
        Metrics {
            evaluated_at,
            seconds_since_issued,
            seconds_until_expires,
            tags: Tags::new(),
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key, value);
        self
    }

    /// Computes metrics for `cert` as of `now`.
    ///
    /// When `server_name` is given the certificate must be valid for it, and
    /// it is added as the `servername` tag. The `subject` tag is present when
    /// the certificate has a common name.
    pub fn collect(
        cert: &X509Ref,
        now: SystemTime,
        server_name: Option<&str>,
        output: OutputFormat,
    ) -> Result<Metrics> {
        let server_name = server_name.filter(|name| !name.is_empty());
        if let Some(name) = server_name {
            verify_hostname(cert, name)?;
        }

        let not_before = unix_seconds(cert.not_before())?;
        let not_after = unix_seconds(cert.not_after())?;
        let now_nanos = unix_nanos(now);

        let mut metrics = Metrics::new(
            now,
            whole_seconds(now_nanos - i128::from(not_before) * NANOS_PER_SECOND),
            whole_seconds(i128::from(not_after) * NANOS_PER_SECOND - now_nanos),
        );
        if let Some(subject) = common_name(cert) {
            metrics.tags.insert("subject", output.subject(&subject));
        }
        if let Some(name) = server_name {
            metrics.tags.insert("servername", name);
        }
        Ok(metrics)
    }

    /// Milliseconds since the Unix epoch of the evaluation instant.
    pub fn epoch_millis(&self) -> i64 {
        unix_nanos(self.evaluated_at).div_euclid(1_000_000) as i64
    }

    pub fn days_until_expires(&self) -> f64 {
        self.seconds_until_expires as f64 / SECONDS_PER_DAY
    }

    pub fn days_since_issued(&self) -> f64 {
        self.seconds_since_issued as f64 / SECONDS_PER_DAY
    }
}

fn unix_seconds(time: &Asn1TimeRef) -> Result<i64> {
    let to_error = |source| CertCheckError::Parse {
        origin: "certificate validity period".to_string(),
        source,
    };
    let epoch = Asn1Time::from_unix(0).map_err(to_error)?;
    let diff = epoch.diff(time).map_err(to_error)?;
    Ok(i64::from(diff.days) * 86_400 + i64::from(diff.secs))
}

fn unix_nanos(time: SystemTime) -> i128 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => after.as_nanos() as i128,
        Err(before) => -(before.duration().as_nanos() as i128),
    }
}

// truncates toward zero
fn whole_seconds(nanos: i128) -> i64 {
    (nanos / NANOS_PER_SECOND) as i64
}
