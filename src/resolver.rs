//! Answer computation over a [`Zone`].
//!
//! [`resolve`] is what the server answers for a single question.
//! [`resolve_expected`] is the client-side reference algorithm: the
//! addresses a correct resolver must produce for a fixture group.

use std::net::{IpAddr, SocketAddr};

use tracing::trace;

use crate::fixture::RecordGroup;
use crate::record::{normalize_name, Payload, RecordKind, ResourceRecord};
use crate::zone::Zone;

/// Service prefix under which load balancer SRV records are published.
pub const SRV_SERVICE_PREFIX: &str = "_grpclb._tcp.";

/// Port assumed when a name is addressed without SRV indirection.
pub const TLS_DEFAULT_PORT: u16 = 443;

/// A single question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// Message id the answer echoes.
    pub id: u16,
    /// Queried name.
    pub name: String,
    /// Queried type.
    pub kind: RecordKind,
}

impl Query {
    /// Question for `name`/`kind` with id 0.
    pub fn new(name: &str, kind: RecordKind) -> Self {
        Self {
            id: 0,
            name: normalize_name(name),
            kind,
        }
    }

    /// Set the message id.
    pub fn with_id(mut self, id: u16) -> Self {
        self.id = id;
        self
    }
}

/// The answer to a [`Query`]. Empty records is a valid "no such data" answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    /// Id of the query this answers.
    pub query_id: u16,
    /// Always true: the zone is served authoritatively.
    pub authoritative: bool,
    /// Matching records in zone order.
    pub records: Vec<ResourceRecord>,
}

/// Look up the records matching `query` exactly (no recursion, no referral).
pub fn resolve(zone: &Zone, query: &Query) -> Answer {
    let records = zone.lookup(&query.name, query.kind).to_vec();
    trace!(name = %query.name, kind = %query.kind, count = records.len(), "resolved");
    Answer {
        query_id: query.id,
        authoritative: true,
        records,
    }
}

/// Name holding the SRV records for `name`.
pub fn srv_query_name(name: &str) -> String {
    format!("{SRV_SERVICE_PREFIX}{}", normalize_name(name))
}

/// `ip:port`, with IPv6 addresses bracketed.
pub fn format_host_port(ip: IpAddr, port: u16) -> String {
    SocketAddr::new(ip, port).to_string()
}

fn addresses_of<'z>(zone: &'z Zone, name: &str) -> impl Iterator<Item = IpAddr> + 'z {
    zone.lookup(name, RecordKind::A)
        .iter()
        .chain(zone.lookup(name, RecordKind::AAAA))
        .filter_map(ResourceRecord::address)
}

/// Addresses a correct client resolves for `group` against `zone`.
///
/// If `_grpclb._tcp.<name>` has SRV records, each SRV target's A then AAAA
/// records are emitted with that SRV record's port, in SRV order. Otherwise
/// the name's own A then AAAA records are emitted with port 443. A name with
/// no records at all yields an empty list.
pub fn resolve_expected(group: &RecordGroup, zone: &Zone) -> Vec<String> {
    let name = group.base_name();
    let srv_records = zone.lookup(&srv_query_name(name), RecordKind::SRV);

    if !srv_records.is_empty() {
        return srv_records
            .iter()
            .filter_map(|record| match record.data() {
                Payload::Srv { port, target, .. } => Some((*port, target.as_str())),
                _ => None,
            })
            .flat_map(|(port, target)| {
                addresses_of(zone, target).map(move |ip| format_host_port(ip, port))
            })
            .collect();
    }

    addresses_of(zone, name)
        .map(|ip| format_host_port(ip, TLS_DEFAULT_PORT))
        .collect()
}
