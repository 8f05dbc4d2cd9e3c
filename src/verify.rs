//! Live verification of fixture groups against a DNS deployment.
//!
//! For every distinct (name, type) in a group the [`Verifier`] asks a
//! [`QueryTool`] for the answer, parses the `;; ANSWER SECTION:` of the
//! tool's text output and compares the answer against the group's own
//! records as an unordered multiset. A failing key is recorded as a
//! [`Mismatch`] and never stops the remaining keys from being checked.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::config::VerifyConfig;
use crate::error::DnsError;
use crate::fixture::RecordGroup;
use crate::metrics::{self, VerifyOutcome};
use crate::record::{tokenize, validate_name, Payload, RecordKind};

/// Line that opens the answer section in `dig` output.
pub const ANSWER_SECTION_DELIMITER: &str = ";; ANSWER SECTION:";

/// External collaborator issuing one live query.
#[async_trait]
pub trait QueryTool: Send + Sync {
    /// Run the query and return the tool's raw text output.
    async fn query(&self, kind: RecordKind, name: &str) -> Result<String, DnsError>;

    /// Human readable form of the query, used in reports.
    fn describe(&self, kind: RecordKind, name: &str) -> String {
        format!("{kind} {name}")
    }
}

/// One parsed answer line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerLine {
    /// Owner name, normalized.
    pub name: String,
    /// TTL as reported.
    pub ttl: u32,
    /// Class mnemonic as reported (normally `IN`).
    pub class: String,
    /// Record type.
    pub kind: RecordKind,
    /// Parsed rdata.
    pub data: Payload,
    /// The line as the tool printed it.
    pub line: String,
}

impl AnswerLine {
    /// Canonical `"<name> <ttl> <class> <type> <rdata>"` form, comparable
    /// with [`crate::record::ResourceRecord::presentation`].
    pub fn canonical(&self) -> String {
        format!(
            "{} {} {} {} {}",
            self.name,
            self.ttl,
            self.class,
            self.kind,
            self.data.rdata()
        )
    }
}

/// Parse one presentation-format answer line.
pub fn parse_answer_line(line: &str) -> Result<AnswerLine, DnsError> {
    let tokens = tokenize(line).map_err(|reason| DnsError::parse(line, reason))?;
    if tokens.len() < 5 {
        return Err(DnsError::parse(
            line,
            format!("expected at least 5 fields, found {}", tokens.len()),
        ));
    }

    let name = validate_name("name", &tokens[0].text)
        .map_err(|e| DnsError::parse(line, e.to_string()))?;
    let ttl = tokens[1]
        .text
        .parse::<u32>()
        .map_err(|_| DnsError::parse(line, format!("bad ttl `{}`", tokens[1].text)))?;
    let class = tokens[2].text.to_ascii_uppercase();
    let kind = tokens[3]
        .text
        .parse::<RecordKind>()
        .map_err(|e| DnsError::parse(line, e.to_string()))?;
    let data =
        Payload::from_tokens(kind, &tokens[4..]).map_err(|e| DnsError::parse(line, e.to_string()))?;

    Ok(AnswerLine {
        name,
        ttl,
        class,
        kind,
        data,
        line: line.to_string(),
    })
}

/// Extract the answer section from `dig`-style output.
///
/// Lines after the delimiter are read up to the first blank line or `;;`
/// comment. Output without the delimiter is an empty answer when the header
/// reports `ANSWER: 0`, and an error otherwise.
pub fn parse_answer_section(output: &str) -> Result<Vec<AnswerLine>, DnsError> {
    let mut lines = output.lines();
    let found = lines
        .by_ref()
        .any(|line| line.trim() == ANSWER_SECTION_DELIMITER);

    if !found {
        if output.contains("ANSWER: 0,") {
            return Ok(Vec::new());
        }
        let first = output.lines().next().unwrap_or_default();
        return Err(DnsError::parse(first, "no answer section in output"));
    }

    let mut answers = Vec::new();
    for line in lines {
        let line = line.trim();
        if line.is_empty() || line.starts_with(";;") {
            break;
        }
        if line.starts_with(';') {
            continue;
        }
        answers.push(parse_answer_line(line)?);
    }
    Ok(answers)
}

/// Why a key failed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MismatchReason {
    /// The answer differs from the expected records.
    Records {
        /// Expected records absent from the answer.
        missing: Vec<String>,
        /// Answer records that were not expected.
        unexpected: Vec<String>,
    },
    /// The query tool did not finish in time.
    Timeout(Duration),
    /// The query tool failed.
    Tool(String),
    /// The tool output could not be parsed.
    Parse(String),
}

/// A failed (name, type) check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    /// The query as issued.
    pub query: String,
    /// Queried name.
    pub name: String,
    /// Queried type.
    pub kind: RecordKind,
    /// Raw answer lines (or raw output when it could not be parsed).
    pub found: Vec<String>,
    /// Expected records in presentation form.
    pub expected: Vec<String>,
    /// What went wrong.
    pub reason: MismatchReason,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" yielded bad record", self.query)?;
        match &self.reason {
            MismatchReason::Records {
                missing,
                unexpected,
            } => {
                for record in missing {
                    write!(f, "\n  Missing: {record}")?;
                }
                for record in unexpected {
                    write!(f, "\n  Unexpected: {record}")?;
                }
            }
            MismatchReason::Timeout(timeout) => write!(f, "\n  Timed out after {timeout:?}")?,
            MismatchReason::Tool(reason) => write!(f, "\n  Query failed: {reason}")?,
            MismatchReason::Parse(reason) => write!(f, "\n  Unparseable output: {reason}")?,
        }
        f.write_str("\n  Found:")?;
        for line in &self.found {
            write!(f, "\n    {line}")?;
        }
        f.write_str("\n  Expected:")?;
        for line in &self.expected {
            write!(f, "\n    {line}")?;
        }
        Ok(())
    }
}

/// Outcome of verifying one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    /// The group's record to resolve.
    pub group: String,
    /// True when every key matched.
    pub pass: bool,
    /// Number of (name, type) keys checked.
    pub checked: usize,
    /// One entry per failing key.
    pub mismatches: Vec<Mismatch>,
}

/// Split `found` against `expected` as multisets. Returns (missing, unexpected).
fn multiset_diff(expected: &[String], found: &[String]) -> (Vec<String>, Vec<String>) {
    let mut remaining: Vec<&String> = found.iter().collect();
    let mut missing = Vec::new();
    for record in expected {
        match remaining.iter().position(|candidate| *candidate == record) {
            Some(index) => {
                remaining.remove(index);
            }
            None => missing.push(record.clone()),
        }
    }
    // Surplus copies only, in `found` order.
    let unexpected = remaining.into_iter().cloned().collect();
    (missing, unexpected)
}

/// Checks fixture groups against live answers.
pub struct Verifier {
    tool: Arc<dyn QueryTool>,
    timeout: Duration,
    concurrency: usize,
}

impl Verifier {
    /// Create a verifier with a 5 second timeout and 8 queries in flight.
    pub fn new(tool: Arc<dyn QueryTool>) -> Self {
        Self {
            tool,
            timeout: Duration::from_secs(5),
            concurrency: 8,
        }
    }

    /// Create a verifier from configuration.
    pub fn from_config(tool: Arc<dyn QueryTool>, config: &VerifyConfig) -> Self {
        Self::new(tool)
            .with_timeout(config.timeout())
            .with_concurrency(config.concurrency)
    }

    /// Set the per-query timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the maximum number of queries in flight. Zero is treated as one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Verify every (name, type) key of `group`.
    pub async fn verify(&self, group: &RecordGroup) -> VerificationResult {
        let keys = group.keys();
        let checked = keys.len();

        let checks = keys.into_iter().map(|(name, kind)| {
            let expected = group
                .records_for(&name, kind)
                .into_iter()
                .map(|record| record.presentation())
                .collect();
            self.check_key(name, kind, expected)
        });

        let mismatches: Vec<Mismatch> = stream::iter(checks)
            .buffered(self.concurrency)
            .filter_map(|outcome| async move { outcome })
            .collect()
            .await;

        let pass = mismatches.is_empty();
        if pass {
            info!(group = %group.base_name(), checked, "group verified");
        } else {
            warn!(
                group = %group.base_name(),
                checked,
                failed = mismatches.len(),
                "group failed verification"
            );
        }

        VerificationResult {
            group: group.base_name().to_string(),
            pass,
            checked,
            mismatches,
        }
    }

    /// Verify groups one after another.
    pub async fn verify_all(&self, groups: &[RecordGroup]) -> Vec<VerificationResult> {
        let mut results = Vec::with_capacity(groups.len());
        for group in groups {
            results.push(self.verify(group).await);
        }
        results
    }

    async fn check_key(
        &self,
        name: String,
        kind: RecordKind,
        expected: Vec<String>,
    ) -> Option<Mismatch> {
        let query = self.tool.describe(kind, &name);
        let mismatch = |found: Vec<String>, reason: MismatchReason| Mismatch {
            query: query.clone(),
            name: name.clone(),
            kind,
            found,
            expected: expected.clone(),
            reason,
        };

        let output = match tokio::time::timeout(self.timeout, self.tool.query(kind, &name)).await {
            Ok(Ok(output)) => output,
            Ok(Err(error)) => {
                warn!(query = %query, %error, "query tool failed");
                metrics::record_verification(kind.as_str(), VerifyOutcome::Error);
                return Some(mismatch(Vec::new(), MismatchReason::Tool(error.to_string())));
            }
            Err(_) => {
                let error = DnsError::QueryTimeout {
                    query: query.clone(),
                    timeout: self.timeout,
                };
                warn!(%error, "query timed out");
                metrics::record_verification(kind.as_str(), VerifyOutcome::Timeout);
                return Some(mismatch(Vec::new(), MismatchReason::Timeout(self.timeout)));
            }
        };

        let answers = match parse_answer_section(&output) {
            Ok(answers) => answers,
            Err(error) => {
                warn!(query = %query, %error, "unparseable query output");
                metrics::record_verification(kind.as_str(), VerifyOutcome::Error);
                let raw = output.lines().map(str::to_string).collect();
                return Some(mismatch(raw, MismatchReason::Parse(error.to_string())));
            }
        };

        let canonical: Vec<String> = answers.iter().map(AnswerLine::canonical).collect();
        let (missing, unexpected) = multiset_diff(&expected, &canonical);
        if missing.is_empty() && unexpected.is_empty() {
            debug!(query = %query, records = answers.len(), "answer matched");
            metrics::record_verification(kind.as_str(), VerifyOutcome::Match);
            return None;
        }

        let found = answers.into_iter().map(|answer| answer.line).collect();
        let mismatch = mismatch(
            found,
            MismatchReason::Records {
                missing,
                unexpected,
            },
        );
        warn!("{}", mismatch);
        metrics::record_verification(kind.as_str(), VerifyOutcome::Mismatch);
        Some(mismatch)
    }
}
