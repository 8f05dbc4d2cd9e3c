//! Declarative fixture file format.
//!
//! A fixture file is a JSON array of groups:
//!
//! ```json
//! [{
//!   "recordToResolve": "srv-ipv4-single-target.grpc.com.",
//!   "ttl": 2100,
//!   "records": {
//!     "ipv4-single-target.grpc.com.": [{"A": "1.2.3.4"}],
//!     "_grpclb._tcp.srv-ipv4-single-target.grpc.com.": [{"SRV": "0 0 1234 ipv4-single-target.grpc.com."}]
//!   },
//!   "expectedAddrs": ["1.2.3.4:1234"],
//!   "expectedChosenServiceConfigIndex": null,
//!   "expectedLbPolicy": null
//! }]
//! ```
//!
//! TXT data is the raw payload; every other type uses presentation rdata.
//! Owner order in `records` is preserved in both directions.

use std::fmt;
use std::path::Path;

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::DnsError;
use crate::fixture::RecordGroup;
use crate::record::{Payload, RecordKind, ResourceRecord};

/// Wire shape of one [`RecordGroup`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupDocument {
    record_to_resolve: String,
    ttl: u32,
    records: OwnerRecords,
    expected_addrs: Vec<String>,
    #[serde(default)]
    expected_chosen_service_config_index: Option<usize>,
    #[serde(default)]
    expected_lb_policy: Option<String>,
}

/// `owner -> [{TYPE: data}, ...]`, in owner order.
#[derive(Debug, Clone, Default)]
struct OwnerRecords(Vec<(String, Vec<TypedData>)>);

/// A single-key `{TYPE: data}` object.
#[derive(Debug, Clone)]
struct TypedData {
    kind: RecordKind,
    data: String,
}

impl From<RecordGroup> for GroupDocument {
    fn from(group: RecordGroup) -> Self {
        let mut owners: Vec<(String, Vec<TypedData>)> = Vec::new();
        for record in group.records() {
            let data = match record.data() {
                Payload::Text(text) => text.clone(),
                other => other.rdata(),
            };
            let entry = TypedData {
                kind: record.kind(),
                data,
            };
            match owners.last_mut() {
                Some((owner, entries)) if owner == record.name() => entries.push(entry),
                _ => owners.push((record.name().to_string(), vec![entry])),
            }
        }

        Self {
            record_to_resolve: group.base_name().to_string(),
            ttl: group.ttl(),
            records: OwnerRecords(owners),
            expected_addrs: group.expected_addresses().to_vec(),
            expected_chosen_service_config_index: group.expected_service_config_index(),
            expected_lb_policy: group.expected_lb_policy().map(str::to_string),
        }
    }
}

impl TryFrom<GroupDocument> for RecordGroup {
    type Error = DnsError;

    fn try_from(doc: GroupDocument) -> Result<Self, Self::Error> {
        let mut records = Vec::new();
        for (owner, entries) in doc.records.0 {
            for entry in entries {
                let payload = match entry.kind {
                    RecordKind::TXT => Payload::Text(entry.data),
                    kind => Payload::parse(kind, &entry.data)?,
                };
                records.push(ResourceRecord::new(&owner, entry.kind, doc.ttl, payload)?);
            }
        }

        RecordGroup::new(
            &doc.record_to_resolve,
            records,
            doc.expected_addrs,
            doc.expected_chosen_service_config_index,
            doc.expected_lb_policy,
        )
    }
}

impl Serialize for TypedData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.kind.as_str(), &self.data)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for TypedData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TypedDataVisitor;

        impl<'de> Visitor<'de> for TypedDataVisitor {
            type Value = TypedData;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a single-key object mapping a record type to its data")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<TypedData, A::Error> {
                let Some((kind, data)) = map.next_entry::<String, String>()? else {
                    return Err(de::Error::custom("record object is empty"));
                };
                if map.next_key::<de::IgnoredAny>()?.is_some() {
                    return Err(de::Error::custom("record object has more than one key"));
                }
                let kind = kind.parse::<RecordKind>().map_err(de::Error::custom)?;
                Ok(TypedData { kind, data })
            }
        }

        deserializer.deserialize_map(TypedDataVisitor)
    }
}

impl Serialize for OwnerRecords {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (owner, entries) in &self.0 {
            map.serialize_entry(owner, entries)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for OwnerRecords {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OwnerRecordsVisitor;

        impl<'de> Visitor<'de> for OwnerRecordsVisitor {
            type Value = OwnerRecords;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map from owner name to a list of records")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<OwnerRecords, A::Error> {
                let mut owners: Vec<(String, Vec<TypedData>)> = Vec::new();
                while let Some((owner, entries)) = map.next_entry::<String, Vec<TypedData>>()? {
                    match owners.iter_mut().find(|(o, _)| *o == owner) {
                        Some((_, existing)) => existing.extend(entries),
                        None => owners.push((owner, entries)),
                    }
                }
                Ok(OwnerRecords(owners))
            }
        }

        deserializer.deserialize_map(OwnerRecordsVisitor)
    }
}

/// Serialize groups as a pretty-printed fixture document.
pub fn to_json(groups: &[RecordGroup]) -> Result<String, DnsError> {
    Ok(serde_json::to_string_pretty(groups)?)
}

/// Parse a fixture document.
pub fn from_json(text: &str) -> Result<Vec<RecordGroup>, DnsError> {
    Ok(serde_json::from_str(text)?)
}

/// Read and parse a fixture file.
pub async fn load(path: &Path) -> Result<Vec<RecordGroup>, DnsError> {
    let text = tokio::fs::read_to_string(path).await?;
    from_json(&text)
}

/// Write groups to a fixture file.
pub async fn save(path: &Path, groups: &[RecordGroup]) -> Result<(), DnsError> {
    tokio::fs::write(path, to_json(groups)?).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::FixtureGenerator;
    use crate::service_config::ServiceConfig;
    use proptest::prelude::*;
    use serde_json::{Map, Value};

    fn address_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            any::<[u8; 4]>().prop_map(|o| std::net::Ipv4Addr::from(o).to_string()),
            any::<[u16; 8]>().prop_map(|s| std::net::Ipv6Addr::from(s).to_string()),
        ]
    }

    fn service_config_strategy() -> impl Strategy<Value = ServiceConfig> {
        (
            prop::option::of("[a-z_]{1,12}"),
            prop::option::of(0u8..=100),
            prop::collection::btree_map("x-[a-z]{1,8}", "[ -~]{0,20}", 0..3),
            "[A-Za-z]{1,10}",
        )
            .prop_map(|(policy, percentage, extra, service)| {
                let mut config =
                    ServiceConfig::round_robin(crate::service_config::method_config_for(&service));
                config.load_balancing_policy = policy;
                config.percentage = percentage;
                config.extra = extra
                    .into_iter()
                    .map(|(k, v)| (k, Value::String(v)))
                    .collect::<Map<String, Value>>();
                config
            })
    }

    #[test]
    fn test_round_trip_standard_groups() {
        let groups = FixtureGenerator::new("test.grpctestingexp.", 2100, 1234)
            .standard_groups()
            .unwrap();
        let text = to_json(&groups).unwrap();
        assert_eq!(from_json(&text).unwrap(), groups);
    }

    proptest! {
        #[test]
        fn test_round_trip_generated_groups(
            label in "[a-z][a-z0-9-]{0,15}",
            ttl in 1u32..=86400,
            srv_port in any::<u16>(),
            v4 in prop::collection::vec(any::<[u8; 4]>(), 1..5),
            addresses in prop::collection::vec(address_strategy(), 1..6),
            configs in prop::collection::vec(service_config_strategy(), 0..4),
            pick in any::<prop::sample::Index>(),
        ) {
            let generator = FixtureGenerator::new("test.grpctestingexp.", ttl, srv_port);
            let v4: Vec<String> = v4.iter().map(|o| std::net::Ipv4Addr::from(*o).to_string()).collect();
            let v4: Vec<&str> = v4.iter().map(String::as_str).collect();
            let addresses: Vec<&str> = addresses.iter().map(String::as_str).collect();
            let index = (!configs.is_empty()).then(|| pick.index(configs.len()));

            let groups = vec![
                generator.address_and_srv_group(&label, &v4, RecordKind::A).unwrap().group,
                generator
                    .address_and_config_group(&label, &addresses, &configs, index)
                    .unwrap()
                    .group,
                generator
                    .address_srv_and_config_group(&format!("{label}-srv"), &addresses, &configs, index)
                    .unwrap()
                    .group,
            ];

            let text = to_json(&groups).unwrap();
            prop_assert_eq!(from_json(&text).unwrap(), groups);
        }
    }

    #[test]
    fn test_document_shape() {
        let group = FixtureGenerator::new("grpc.com.", 2100, 1234)
            .address_and_srv_group("ipv4-single-target", &["1.2.3.4"], RecordKind::A)
            .unwrap()
            .into_group();
        let value = serde_json::to_value(&group).unwrap();

        assert_eq!(value["recordToResolve"], "srv-ipv4-single-target.grpc.com.");
        assert_eq!(value["ttl"], 2100);
        assert_eq!(
            value["records"]["ipv4-single-target.grpc.com."][0]["A"],
            "1.2.3.4"
        );
        assert_eq!(
            value["records"]["_grpclb._tcp.srv-ipv4-single-target.grpc.com."][0]["SRV"],
            "0 0 1234 ipv4-single-target.grpc.com."
        );
        assert_eq!(value["expectedAddrs"][0], "1.2.3.4:1234");
        assert!(value["expectedChosenServiceConfigIndex"].is_null());
    }

    #[test]
    fn test_parse_hand_written_group() {
        let text = r#"[{
            "recordToResolve": "IPv4-No-Srv.Grpc.Com",
            "ttl": 300,
            "records": {
                "ipv4-no-srv.grpc.com.": [
                    {"A": "1.2.3.4"},
                    {"TXT": "grpc_config=[{\"loadBalancingPolicy\":\"round_robin\",\"methodConfig\":[]}]"}
                ]
            },
            "expectedAddrs": ["1.2.3.4:443"],
            "expectedChosenServiceConfigIndex": 0,
            "expectedLbPolicy": "round_robin"
        }]"#;

        let groups = from_json(text).unwrap();
        assert_eq!(groups.len(), 1);
        let group = &groups[0];
        assert_eq!(group.base_name(), "ipv4-no-srv.grpc.com.");
        assert_eq!(group.ttl(), 300);
        assert_eq!(group.records().len(), 2);
        assert_eq!(group.expected_lb_policy(), Some("round_robin"));
    }

    #[test]
    fn test_multi_key_record_rejected() {
        let text = r#"[{
            "recordToResolve": "h.grpc.com.",
            "ttl": 300,
            "records": {"h.grpc.com.": [{"A": "1.2.3.4", "AAAA": "::1"}]},
            "expectedAddrs": []
        }]"#;
        assert!(matches!(from_json(text), Err(DnsError::Json(_))));
    }

    #[test]
    fn test_dangling_srv_rejected_on_load() {
        let text = r#"[{
            "recordToResolve": "srv-h.grpc.com.",
            "ttl": 300,
            "records": {"_grpclb._tcp.srv-h.grpc.com.": [{"SRV": "0 0 1234 h.grpc.com."}]},
            "expectedAddrs": []
        }]"#;
        let err = from_json(text).unwrap_err();
        assert!(err.to_string().contains("h.grpc.com."));
    }

    #[tokio::test]
    async fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixtures.json");
        let groups = FixtureGenerator::new("grpc.com.", 60, 1234)
            .standard_groups()
            .unwrap();

        save(&path, &groups).await.unwrap();
        assert_eq!(load(&path).await.unwrap(), groups);
    }
}
