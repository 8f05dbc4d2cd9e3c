//! Metrics instrumentation for fixture-dns.
//!
//! All metrics are prefixed with `fixture_dns.`

use metrics::{counter, gauge, histogram};
use std::time::Instant;

/// Record a DNS query.
pub fn record_query(record_type: &str, result: QueryResult, duration: std::time::Duration) {
    let result_str = match result {
        QueryResult::Success => "success",
        QueryResult::NxDomain => "nxdomain",
        QueryResult::NoData => "nodata",
        QueryResult::Refused => "refused",
    };

    counter!("fixture_dns.query.count", "type" => record_type.to_string(), "result" => result_str)
        .increment(1);
    histogram!("fixture_dns.query.duration.seconds", "type" => record_type.to_string())
        .record(duration.as_secs_f64());
}

/// Query result type for metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryResult {
    /// Query returned records.
    Success,
    /// Name not in the zone.
    NxDomain,
    /// Name exists but has no records of the queried type.
    NoData,
    /// Query outside the served zone.
    Refused,
}

/// Record the number of records returned by a successful lookup.
pub fn record_answer_records(count: usize) {
    histogram!("fixture_dns.query.records_returned").record(count as f64);
}

/// Record zone size (call on load and periodically).
pub fn record_zone_counts(names: usize, records: usize) {
    gauge!("fixture_dns.zone.names.count").set(names as f64);
    gauge!("fixture_dns.zone.records.count").set(records as f64);
}

/// Record the SOA serial number.
pub fn record_serial(serial: u32) {
    gauge!("fixture_dns.zone.serial").set(serial as f64);
}

/// Record a zone snapshot replacement.
pub fn record_zone_reload() {
    counter!("fixture_dns.zone.reload.count").increment(1);
}

/// Record the outcome of verifying one query against the server.
pub fn record_verification(record_type: &str, outcome: VerifyOutcome) {
    let outcome_str = match outcome {
        VerifyOutcome::Match => "match",
        VerifyOutcome::Mismatch => "mismatch",
        VerifyOutcome::Timeout => "timeout",
        VerifyOutcome::Error => "error",
    };

    counter!("fixture_dns.verify.query.count", "type" => record_type.to_string(), "outcome" => outcome_str)
        .increment(1);
}

/// Per-query verification outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Answer matched the expected records.
    Match,
    /// Answer differed from the expected records.
    Mismatch,
    /// Query tool did not finish in time.
    Timeout,
    /// Query tool failed or its output could not be parsed.
    Error,
}

/// Helper for timing operations.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed duration since timer start.
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}
