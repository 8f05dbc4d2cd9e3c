//! Fixture DNS - DNS test fixtures for client name-resolution tests.
//!
//! This crate builds groups of DNS records describing naming scenarios
//! (single and multi target hosts, SRV load balancer indirection, TXT encoded
//! service config), serves them from an authoritative DNS server, and checks
//! that a live deployment actually answers with them.
//!
//! ## Features
//!
//! - Fixture builders that compute the addresses a correct client resolves
//! - A lossless JSON fixture format
//! - Authoritative UDP/TCP serving with atomic zone swaps (SIGHUP reload)
//! - `dig`-driven verification with order-insensitive matching
//! - Record set planning for managed zones
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          fixture-dns                             │
//! │                                                                  │
//! │  ┌──────────────────┐    ┌──────────────────┐                    │
//! │  │ FixtureGenerator │───▶│  RecordGroups    │──▶ fixtures.json   │
//! │  └──────────────────┘    └────────┬─────────┘                    │
//! │                                   │                              │
//! │               ┌───────────────────┼───────────────────┐          │
//! │               ▼                   ▼                   ▼          │
//! │      ┌────────────────┐  ┌────────────────┐  ┌────────────────┐  │
//! │      │ Zone / DnsState│  │    Verifier    │  │   zone_plan    │  │
//! │      └───────┬────────┘  │  (dig, multiset│  │ (record sets)  │  │
//! │              ▼           │   matching)    │  └────────────────┘  │
//! │      ┌────────────────┐  └────────────────┘                      │
//! │      │  Hickory DNS   │◀── UDP/TCP                               │
//! │      │  Server        │                                          │
//! │      └────────────────┘                                          │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## SRV Resolution
//!
//! ```text
//! srv-ipv4-multi-target.test.grpctestingexp.
//!   → SRV _grpclb._tcp.srv-ipv4-multi-target.test.grpctestingexp.
//!       0 0 1234 ipv4-multi-target.test.grpctestingexp.
//!   → A ipv4-multi-target.test.grpctestingexp.
//!   → 1.2.3.5:1234, 1.2.3.6:1234, 1.2.3.7:1234
//! ```
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use fixture_dns::{DnsConfig, DnsServer, FixtureGenerator, Zone};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let groups = FixtureGenerator::new("test.grpctestingexp.", 2100, 1234)
//!         .standard_groups()
//!         .unwrap();
//!
//!     let config = DnsConfig {
//!         listen_addr: "127.0.0.1:5353".parse().unwrap(),
//!         ..DnsConfig::default()
//!     };
//!
//!     let server = DnsServer::new(config, Zone::from_groups(&groups));
//!     server.run(CancellationToken::new()).await.unwrap();
//! }
//! ```

#![warn(missing_docs)]

pub mod authority;
pub mod config;
pub mod error;
pub mod fixture;
pub mod fixture_format;
pub mod metrics;
pub mod query_tool;
pub mod record;
pub mod resolver;
pub mod server;
pub mod service_config;
pub mod state;
pub mod telemetry;
pub mod verify;
pub mod zone;
pub mod zone_plan;

// Re-export main types
pub use config::{
    Config, DnsConfig, FixtureConfig, LogFormat, SoaConfig, TelemetryConfig, VerifyConfig,
};
pub use error::DnsError;
pub use fixture::{FixtureGenerator, GroupBuild, RecordGroup};
pub use record::{Payload, RecordKind, ResourceRecord};
pub use resolver::{resolve, resolve_expected, Answer, Query};
pub use server::DnsServer;
pub use service_config::ServiceConfig;
pub use state::DnsState;
pub use verify::{Mismatch, QueryTool, VerificationResult, Verifier};
pub use zone::Zone;
