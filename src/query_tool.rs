//! `dig` as the live query collaborator.

use std::net::SocketAddr;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::trace;

use crate::config::VerifyConfig;
use crate::error::DnsError;
use crate::record::RecordKind;
use crate::verify::QueryTool;

/// Runs `dig [@server -p port] TYPE NAME` and returns its stdout.
#[derive(Debug, Clone)]
pub struct DigQueryTool {
    dig_path: String,
    server: Option<SocketAddr>,
}

impl DigQueryTool {
    /// Query through `dig_path`, against `server` or the system resolver.
    pub fn new(dig_path: impl Into<String>, server: Option<SocketAddr>) -> Self {
        Self {
            dig_path: dig_path.into(),
            server,
        }
    }

    /// Create a tool from configuration.
    pub fn from_config(config: &VerifyConfig) -> Self {
        Self::new(config.dig_path.clone(), config.server)
    }

    /// Arguments passed to `dig` for one query.
    pub fn args(&self, kind: RecordKind, name: &str) -> Vec<String> {
        let mut args = Vec::with_capacity(5);
        if let Some(server) = self.server {
            args.push(format!("@{}", server.ip()));
            args.push("-p".to_string());
            args.push(server.port().to_string());
        }
        args.push(kind.to_string());
        args.push(name.to_string());
        args
    }
}

#[async_trait]
impl QueryTool for DigQueryTool {
    async fn query(&self, kind: RecordKind, name: &str) -> Result<String, DnsError> {
        let mut command = Command::new(&self.dig_path);
        command
            .args(self.args(kind, name))
            .stdin(Stdio::null())
            .kill_on_drop(true);
        trace!(command = ?command, "running query tool");

        let output = command.output().await.map_err(|e| DnsError::QueryTool {
            query: self.describe(kind, name),
            reason: e.to_string(),
        })?;

        if !output.status.success() {
            return Err(DnsError::QueryTool {
                query: self.describe(kind, name),
                reason: format!(
                    "{}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn describe(&self, kind: RecordKind, name: &str) -> String {
        let mut parts = vec![self.dig_path.clone()];
        parts.extend(self.args(kind, name));
        parts.join(" ")
    }
}
