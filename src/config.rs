//! Configuration types for fixture-dns.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// DNS server configuration.
    #[serde(default)]
    pub dns: DnsConfig,

    /// Fixture generation parameters.
    #[serde(default)]
    pub fixtures: FixtureConfig,

    /// Live verification parameters.
    #[serde(default)]
    pub verify: VerifyConfig,

    /// Telemetry configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// DNS server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsConfig {
    /// Address for DNS server to listen on (UDP and TCP).
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Zone origin served authoritatively (e.g. "test.grpctestingexp.").
    #[serde(default = "default_zone")]
    pub zone: String,

    /// Also serve over TCP.
    #[serde(default = "default_true")]
    pub tcp: bool,

    /// Idle timeout for TCP connections in seconds.
    #[serde(default = "default_tcp_timeout_secs")]
    pub tcp_timeout_secs: u64,

    /// Fixture file to serve. Re-read on SIGHUP.
    #[serde(default)]
    pub fixture_path: Option<PathBuf>,

    /// SOA record configuration.
    #[serde(default)]
    pub soa: SoaConfig,
}

impl DnsConfig {
    /// TCP idle timeout.
    pub fn tcp_timeout(&self) -> Duration {
        Duration::from_secs(self.tcp_timeout_secs)
    }
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            zone: default_zone(),
            tcp: true,
            tcp_timeout_secs: default_tcp_timeout_secs(),
            fixture_path: None,
            soa: SoaConfig::default(),
        }
    }
}

/// Parameters for the stock fixture builders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureConfig {
    /// TTL for every generated record in seconds.
    #[serde(default = "default_ttl")]
    pub ttl: u32,

    /// Port carried by generated SRV records.
    #[serde(default = "default_srv_port")]
    pub srv_port: u16,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            ttl: default_ttl(),
            srv_port: default_srv_port(),
        }
    }
}

/// Live verification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyConfig {
    /// Nameserver to query. The system resolver when unset.
    #[serde(default)]
    pub server: Option<SocketAddr>,

    /// Path of the `dig` executable.
    #[serde(default = "default_dig_path")]
    pub dig_path: String,

    /// Per-query timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum queries in flight.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl VerifyConfig {
    /// Per-query timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            server: None,
            dig_path: default_dig_path(),
            timeout_secs: default_timeout_secs(),
            concurrency: default_concurrency(),
        }
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level filter (e.g., "info", "debug", "fixture_dns=debug,warn").
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log line format.
    #[serde(default)]
    pub log_format: LogFormat,

    /// Prometheus metrics exporter address.
    #[serde(default)]
    pub prometheus_addr: Option<SocketAddr>,
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable lines.
    #[default]
    Fmt,
    /// One JSON object per line.
    Json,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            prometheus_addr: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// SOA (Start of Authority) record configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoaConfig {
    /// Primary nameserver hostname (e.g., "ns1.example.com").
    pub mname: String,

    /// Admin email in DNS format (e.g., "admin.example.com" for admin@example.com).
    pub rname: String,

    /// Refresh interval in seconds.
    #[serde(default = "default_refresh")]
    pub refresh: u32,

    /// Retry interval in seconds.
    #[serde(default = "default_retry")]
    pub retry: u32,

    /// Expire time in seconds.
    #[serde(default = "default_expire")]
    pub expire: u32,

    /// Minimum TTL in seconds.
    #[serde(default = "default_minimum")]
    pub minimum: u32,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 5353))
}

fn default_zone() -> String {
    "test.grpctestingexp.".to_string()
}

fn default_true() -> bool {
    true
}

fn default_tcp_timeout_secs() -> u64 {
    5
}

fn default_ttl() -> u32 {
    2100
}

fn default_srv_port() -> u16 {
    1234
}

fn default_dig_path() -> String {
    "dig".to_string()
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_concurrency() -> usize {
    8
}

fn default_refresh() -> u32 {
    3600
}

fn default_retry() -> u32 {
    600
}

fn default_expire() -> u32 {
    604800
}

fn default_minimum() -> u32 {
    60
}

impl Default for SoaConfig {
    fn default() -> Self {
        Self {
            mname: "ns1.example.com".to_string(),
            rname: "admin.example.com".to_string(),
            refresh: default_refresh(),
            retry: default_retry(),
            expire: default_expire(),
            minimum: default_minimum(),
        }
    }
}
