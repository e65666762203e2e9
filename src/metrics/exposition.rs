//! Text exposition of [`Metrics`].
//!
//! Four families are written, each as `# HELP`, `# TYPE` and one sample line
//! `<name>[{k="v", ...}] <value> <epoch_ms>`:
//!
//! ```text
//! # HELP cert_days_left number of days until certificate expires. Expired certificates produce negative numbers.
//! # TYPE cert_days_left gauge
//! cert_days_left 0.023148 42000
//! ```

use std::fmt;

use super::{Metrics, Tags};

struct Family {
    name: &'static str,
    help: &'static str,
    kind: &'static str,
}

const DAYS_LEFT: Family = Family {
    name: "cert_days_left",
    help: "number of days until certificate expires. Expired certificates produce negative numbers.",
    kind: "gauge",
};
const SECONDS_LEFT: Family = Family {
    name: "cert_seconds_left",
    help: "number of seconds until certificate expires. Expired certificates produce negative numbers.",
    kind: "gauge",
};
const ISSUED_DAYS: Family = Family {
    name: "cert_issued_days",
    help: "total number of days since certificate was issued.",
    kind: "counter",
};
const ISSUED_SECONDS: Family = Family {
    name: "cert_issued_seconds",
    help: "total number of seconds since the certificate was issued.",
    kind: "counter",
};

/// Renders `metrics` as newline separated exposition text, without a
/// trailing newline.
pub fn render(metrics: &Metrics) -> String {
    let epoch = metrics.epoch_millis();
    let labels = render_tags(&metrics.tags);
    let samples = [
        (DAYS_LEFT, format!("{:.6}", metrics.days_until_expires())),
        (SECONDS_LEFT, metrics.seconds_until_expires.to_string()),
        (ISSUED_DAYS, format!("{:.6}", metrics.days_since_issued())),
        (ISSUED_SECONDS, metrics.seconds_since_issued.to_string()),
    ];

    samples
        .iter()
        .flat_map(|(family, value)| {
            [
                format!("# HELP {} {}", family.name, family.help),
                format!("# TYPE {} {}", family.name, family.kind),
                format!("{}{} {} {}", family.name, labels, value, epoch),
            ]
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_tags(tags: &Tags) -> String {
    if tags.is_empty() {
        return String::new();
    }
    let pairs: Vec<String> = tags
        .iter()
        .map(|(key, value)| format!("{}=\"{}\"", key, escape(value)))
        .collect();
    format!("{{{}}}", pairs.join(", "))
}

fn escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render(self))
    }
}
