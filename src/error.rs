//! Error types for fixture-dns.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while building, serving or verifying fixtures.
#[derive(Debug, Error)]
pub enum DnsError {
    /// A record could not be constructed from the given field values.
    #[error("invalid record: {field}: {reason}")]
    InvalidRecord {
        /// Name of the offending field (e.g. `address`, `port`, `name`).
        field: &'static str,
        /// Human readable description of the problem.
        reason: String,
    },

    /// A fixture group has an SRV record whose target has no address records.
    #[error("incomplete fixture {group}: SRV target {target} has no A/AAAA records in the group")]
    IncompleteFixture {
        /// The group's record to resolve.
        group: String,
        /// The dangling SRV target.
        target: String,
    },

    /// The external query tool did not answer in time.
    #[error("query `{query}` timed out after {timeout:?}")]
    QueryTimeout {
        /// The query that was issued.
        query: String,
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// The external query tool failed to run or exited unsuccessfully.
    #[error("query `{query}` failed: {reason}")]
    QueryTool {
        /// The query that was issued.
        query: String,
        /// Failure description (exit status, stderr, spawn error).
        reason: String,
    },

    /// The query tool output could not be parsed.
    #[error("cannot parse answer line `{line}`: {reason}")]
    AnswerParse {
        /// The offending output line.
        line: String,
        /// What was wrong with it.
        reason: String,
    },

    /// IO error (network, file, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// DNS protocol error
    #[error("DNS protocol error: {0}")]
    Proto(#[from] hickory_proto::ProtoError),

    /// Fixture (de)serialization error
    #[error("fixture format error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl DnsError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn parse(line: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::AnswerParse {
            line: line.into(),
            reason: reason.into(),
        }
    }
}
