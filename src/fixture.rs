//! Fixture record groups and the builders that produce them.
//!
//! A [`RecordGroup`] is one self-contained resolution scenario: the records to
//! publish plus the addresses (and service config choice) a correct client
//! should end up with when it resolves the group's name.
//!
//! Naming convention for a host label `h` in zone `z`:
//!
//! ```text
//! h.z                      A/AAAA records, TXT service config
//! _grpclb._tcp.srv-h.z     SRV 0 0 <srv_port> h.z
//! ```
//!
//! SRV-only groups resolve `srv-h.z`, so a client finds the SRV record at
//! `_grpclb._tcp.srv-h.z` and uses the SRV port. Service config groups
//! resolve `h.z` directly and use port 443.

use std::collections::HashSet;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::FixtureConfig;
use crate::error::DnsError;
use crate::fixture_format::GroupDocument;
use crate::record::{normalize_name, validate_name, Payload, RecordKind, ResourceRecord};
use crate::resolver::{format_host_port, srv_query_name, TLS_DEFAULT_PORT};
use crate::service_config::{encode_service_configs, method_config_for, ServiceConfig};

/// One resolution scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "GroupDocument", into = "GroupDocument")]
pub struct RecordGroup {
    base_name: String,
    records: Vec<ResourceRecord>,
    expected_addresses: Vec<String>,
    expected_service_config_index: Option<usize>,
    expected_lb_policy: Option<String>,
}

impl RecordGroup {
    /// Assemble and validate a group.
    ///
    /// Records are deduplicated and reordered so that records sharing an
    /// owner name are adjacent (owners in first-appearance order). All
    /// records must share one TTL and every SRV target must have at least one
    /// A/AAAA record inside the group.
    pub fn new(
        base_name: &str,
        records: Vec<ResourceRecord>,
        expected_addresses: Vec<String>,
        expected_service_config_index: Option<usize>,
        expected_lb_policy: Option<String>,
    ) -> Result<Self, DnsError> {
        let base_name = validate_name("recordToResolve", base_name)?;

        let Some(ttl) = records.first().map(ResourceRecord::ttl) else {
            return Err(DnsError::invalid("records", "group has no records"));
        };
        if let Some(odd) = records.iter().find(|r| r.ttl() != ttl) {
            return Err(DnsError::invalid(
                "ttl",
                format!("{} has ttl {}, group uses {ttl}", odd.name(), odd.ttl()),
            ));
        }

        let records = group_by_owner(records);

        for record in &records {
            if let Payload::Srv { target, .. } = record.data() {
                let resolvable = records
                    .iter()
                    .any(|r| r.kind().is_address() && r.name() == target);
                if !resolvable {
                    return Err(DnsError::IncompleteFixture {
                        group: base_name,
                        target: target.clone(),
                    });
                }
            }
        }

        Ok(Self {
            base_name,
            records,
            expected_addresses,
            expected_service_config_index,
            expected_lb_policy,
        })
    }

    /// The name a client resolves for this scenario.
    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// All records, grouped by owner name.
    pub fn records(&self) -> &[ResourceRecord] {
        &self.records
    }

    /// `host:port` strings a correct client ends up with.
    pub fn expected_addresses(&self) -> &[String] {
        &self.expected_addresses
    }

    /// Index of the service config document the client should pick.
    pub fn expected_service_config_index(&self) -> Option<usize> {
        self.expected_service_config_index
    }

    /// Load balancing policy of the expected service config.
    pub fn expected_lb_policy(&self) -> Option<&str> {
        self.expected_lb_policy.as_deref()
    }

    /// TTL shared by every record in the group.
    pub fn ttl(&self) -> u32 {
        self.records[0].ttl()
    }

    /// Distinct (name, type) keys in record order.
    pub fn keys(&self) -> Vec<(String, RecordKind)> {
        let mut seen = HashSet::new();
        self.records
            .iter()
            .map(|r| (r.name().to_string(), r.kind()))
            .filter(|key| seen.insert(key.clone()))
            .collect()
    }

    /// Records under one (name, type) key.
    pub fn records_for(&self, name: &str, kind: RecordKind) -> Vec<&ResourceRecord> {
        let name = normalize_name(name);
        self.records
            .iter()
            .filter(|r| r.kind() == kind && r.name() == name)
            .collect()
    }
}

fn group_by_owner(records: Vec<ResourceRecord>) -> Vec<ResourceRecord> {
    let mut owners: Vec<String> = Vec::new();
    let mut unique: Vec<ResourceRecord> = Vec::with_capacity(records.len());
    for record in records {
        if unique.contains(&record) {
            continue;
        }
        if !owners.iter().any(|o| o == record.name()) {
            owners.push(record.name().to_string());
        }
        unique.push(record);
    }

    owners
        .iter()
        .flat_map(|owner| unique.iter().filter(move |r| r.name() == owner).cloned())
        .collect()
}

/// A built group plus the input records that were rejected along the way.
#[derive(Debug)]
pub struct GroupBuild {
    /// The group.
    pub group: RecordGroup,
    /// Records skipped because they failed validation.
    pub rejected: Vec<DnsError>,
}

impl GroupBuild {
    /// Discard the rejection report.
    pub fn into_group(self) -> RecordGroup {
        self.group
    }
}

/// Builds record groups in one zone.
#[derive(Debug, Clone)]
pub struct FixtureGenerator {
    zone: String,
    ttl: u32,
    srv_port: u16,
}

impl FixtureGenerator {
    /// Create a generator for `zone` (e.g. `test.grpctestingexp.`).
    pub fn new(zone: &str, ttl: u32, srv_port: u16) -> Self {
        Self {
            zone: normalize_name(zone),
            ttl,
            srv_port,
        }
    }

    /// Create a generator from configuration.
    pub fn from_config(zone: &str, config: &FixtureConfig) -> Self {
        Self::new(zone, config.ttl, config.srv_port)
    }

    /// Zone suffix, normalized.
    pub fn zone(&self) -> &str {
        &self.zone
    }

    /// Port published in SRV records.
    pub fn srv_port(&self) -> u16 {
        self.srv_port
    }

    fn qualify(&self, label: &str) -> String {
        if self.zone == "." {
            format!("{label}.")
        } else {
            format!("{label}.{}", self.zone)
        }
    }

    /// `<label>.<zone>`: owner of address and TXT records.
    pub fn host_name(&self, label: &str) -> String {
        self.qualify(label)
    }

    /// `srv-<label>.<zone>`: the name SRV-only groups resolve.
    pub fn srv_target_name(&self, label: &str) -> String {
        self.qualify(&format!("srv-{label}"))
    }

    /// `_grpclb._tcp.srv-<label>.<zone>`: owner of the SRV record.
    pub fn srv_record_name(&self, label: &str) -> String {
        srv_query_name(&self.srv_target_name(label))
    }

    /// Address records for `addresses`, skipping duplicates.
    ///
    /// With `family` unset the record type follows each literal's family.
    /// IPv4 records come first; each family keeps input order.
    fn address_records(
        &self,
        host: &str,
        addresses: &[&str],
        family: Option<RecordKind>,
        rejected: &mut Vec<DnsError>,
    ) -> Vec<(ResourceRecord, IpAddr)> {
        let mut out: Vec<(ResourceRecord, IpAddr)> = Vec::with_capacity(addresses.len());
        for address in addresses {
            let kind = match family {
                Some(kind) => kind,
                None => match address.trim().parse::<IpAddr>() {
                    Ok(ip) => RecordKind::for_address(&ip),
                    Err(_) => {
                        let err = DnsError::invalid(
                            "address",
                            format!("`{address}` is not an IP address"),
                        );
                        warn!(host, error = %err, "skipping address");
                        rejected.push(err);
                        continue;
                    }
                },
            };

            match ResourceRecord::new_address(kind, host, self.ttl, address) {
                Ok(record) => {
                    let Some(ip) = record.address() else {
                        continue;
                    };
                    if out.iter().any(|(_, seen)| *seen == ip) {
                        debug!(host, %ip, "duplicate address ignored");
                        continue;
                    }
                    out.push((record, ip));
                }
                Err(err) => {
                    warn!(host, error = %err, "skipping address");
                    rejected.push(err);
                }
            }
        }
        // A before AAAA, input order within each family, as resolution emits them.
        out.sort_by_key(|(_, ip)| ip.is_ipv6());
        out
    }

    /// Address records for `host_label` plus an SRV record pointing at them.
    ///
    /// Expected addresses use the SRV port, in input order.
    pub fn address_and_srv_group(
        &self,
        host_label: &str,
        addresses: &[&str],
        family: RecordKind,
    ) -> Result<GroupBuild, DnsError> {
        if !family.is_address() {
            return Err(DnsError::invalid(
                "type",
                format!("{family} is not an address family"),
            ));
        }

        let host = self.host_name(host_label);
        let base_name = self.srv_target_name(host_label);
        let mut rejected = Vec::new();
        let addressed = self.address_records(&host, addresses, Some(family), &mut rejected);
        if addressed.is_empty() {
            return Err(DnsError::IncompleteFixture {
                group: base_name,
                target: host,
            });
        }

        let expected = addressed
            .iter()
            .map(|(_, ip)| format_host_port(*ip, self.srv_port))
            .collect();
        let mut records: Vec<ResourceRecord> = addressed.into_iter().map(|(r, _)| r).collect();
        records.push(ResourceRecord::new_srv(
            &self.srv_record_name(host_label),
            self.ttl,
            0,
            0,
            self.srv_port,
            &host,
        )?);

        let group = RecordGroup::new(&base_name, records, expected, None, None)?;
        debug!(group = %group.base_name(), records = group.records().len(), "built SRV group");
        Ok(GroupBuild { group, rejected })
    }

    /// Address, SRV and service config TXT records for `host_label`.
    ///
    /// The group resolves the host name itself, so the client addresses the
    /// hosts on port 443 rather than the SRV port.
    pub fn address_srv_and_config_group(
        &self,
        host_label: &str,
        addresses: &[&str],
        configs: &[ServiceConfig],
        expected_config_index: Option<usize>,
    ) -> Result<GroupBuild, DnsError> {
        self.config_group(host_label, addresses, configs, expected_config_index, true)
    }

    /// Address and service config TXT records for `host_label`, no SRV.
    pub fn address_and_config_group(
        &self,
        host_label: &str,
        addresses: &[&str],
        configs: &[ServiceConfig],
        expected_config_index: Option<usize>,
    ) -> Result<GroupBuild, DnsError> {
        self.config_group(host_label, addresses, configs, expected_config_index, false)
    }

    fn config_group(
        &self,
        host_label: &str,
        addresses: &[&str],
        configs: &[ServiceConfig],
        expected_config_index: Option<usize>,
        with_srv: bool,
    ) -> Result<GroupBuild, DnsError> {
        let expected_lb_policy = match expected_config_index {
            Some(index) => match configs.get(index) {
                Some(config) => config.load_balancing_policy.clone(),
                None => {
                    return Err(DnsError::invalid(
                        "expectedChosenServiceConfigIndex",
                        format!("index {index} but only {} documents", configs.len()),
                    ))
                }
            },
            None => None,
        };

        let host = self.host_name(host_label);
        let mut rejected = Vec::new();
        let addressed = self.address_records(&host, addresses, None, &mut rejected);
        if addressed.is_empty() {
            if with_srv {
                return Err(DnsError::IncompleteFixture {
                    group: host.clone(),
                    target: host,
                });
            }
            return Err(rejected
                .into_iter()
                .next()
                .unwrap_or_else(|| DnsError::invalid("address", "no addresses given")));
        }

        let expected = addressed
            .iter()
            .map(|(_, ip)| format_host_port(*ip, TLS_DEFAULT_PORT))
            .collect();
        let mut records: Vec<ResourceRecord> = addressed.into_iter().map(|(r, _)| r).collect();
        if with_srv {
            records.push(ResourceRecord::new_srv(
                &self.srv_record_name(host_label),
                self.ttl,
                0,
                0,
                self.srv_port,
                &host,
            )?);
        }
        records.push(ResourceRecord::new_txt(
            &host,
            self.ttl,
            encode_service_configs(configs)?,
        )?);

        let group = RecordGroup::new(
            &host,
            records,
            expected,
            expected_config_index,
            expected_lb_policy,
        )?;
        debug!(group = %group.base_name(), records = group.records().len(), "built service config group");
        Ok(GroupBuild { group, rejected })
    }

    /// The stock scenario catalogue.
    pub fn standard_groups(&self) -> Result<Vec<RecordGroup>, DnsError> {
        let round_robin = |service: &str| ServiceConfig::round_robin(method_config_for(service));

        let builds = [
            self.address_and_srv_group("ipv4-single-target", &["1.2.3.4"], RecordKind::A)?,
            self.address_and_srv_group(
                "ipv4-multi-target",
                &["1.2.3.5", "1.2.3.6", "1.2.3.7"],
                RecordKind::A,
            )?,
            self.address_and_srv_group(
                "ipv6-single-target",
                &["2607:f8b0:400a:801::1001"],
                RecordKind::AAAA,
            )?,
            self.address_and_srv_group(
                "ipv6-multi-target",
                &[
                    "2607:f8b0:400a:801::1002",
                    "2607:f8b0:400a:801::1003",
                    "2607:f8b0:400a:801::1004",
                ],
                RecordKind::AAAA,
            )?,
            self.address_srv_and_config_group(
                "ipv4-simple-service-config",
                &["1.2.3.4"],
                &[round_robin("SimpleService")],
                Some(0),
            )?,
            self.address_and_config_group(
                "ipv4-no-srv-simple-service-config",
                &["1.2.3.4"],
                &[round_robin("NoSrvSimpleService")],
                Some(0),
            )?,
            self.address_and_config_group(
                "ipv4-second-language-is-cpp",
                &["1.2.3.4"],
                &[
                    round_robin("GoService").with_client_language(["go"]),
                    round_robin("CppService").with_client_language(["c++"]),
                ],
                None,
            )?,
            self.address_and_config_group(
                "ipv4-no-config-for-cpp",
                &["1.2.3.4"],
                &[round_robin("PythonService").with_client_language(["python"])],
                None,
            )?,
            self.address_and_config_group(
                "ipv4-config-with-percentages",
                &["1.2.3.4"],
                &[
                    round_robin("NeverPickedService").with_percentage(0),
                    round_robin("AlwaysPickedService").with_percentage(100),
                ],
                Some(1),
            )?,
            self.address_and_config_group(
                "ipv4-cpp-config-has-zero-percentage",
                &["1.2.3.4"],
                &[round_robin("CppService").with_percentage(0)],
                None,
            )?,
        ];

        Ok(builds.into_iter().map(GroupBuild::into_group).collect())
    }
}
