//! In-memory record store keyed by (name, type).

use std::collections::{BTreeSet, HashMap};

use tracing::trace;

use crate::fixture::RecordGroup;
use crate::record::{normalize_name, RecordKind, ResourceRecord};

/// An authoritative set of records.
///
/// Each (name, type) key maps to an insertion-ordered set of records. A zone
/// is built once and then shared read-only; see [`crate::state::DnsState`] for
/// the swappable serving handle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Zone {
    sets: HashMap<(String, RecordKind), Vec<ResourceRecord>>,
    /// Owner names in first-insertion order.
    names: Vec<String>,
    len: usize,
}

impl Zone {
    /// Create an empty zone.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a zone holding every record of every group.
    pub fn from_groups<'a>(groups: impl IntoIterator<Item = &'a RecordGroup>) -> Self {
        let mut zone = Self::new();
        for group in groups {
            for record in group.records() {
                zone.insert(record.clone());
            }
        }
        zone
    }

    /// Add a record to the set for its (name, type). Returns false if an
    /// identical record was already present.
    pub fn insert(&mut self, record: ResourceRecord) -> bool {
        let key = (record.name().to_string(), record.kind());
        if !self.names.contains(&key.0) {
            self.names.push(key.0.clone());
        }

        let set = self.sets.entry(key).or_default();
        if set.contains(&record) {
            trace!(record = %record, "duplicate record ignored");
            return false;
        }
        set.push(record);
        self.len += 1;
        true
    }

    /// Records for (name, type), in insertion order. Empty if absent.
    pub fn lookup(&self, name: &str, kind: RecordKind) -> &[ResourceRecord] {
        self.sets
            .get(&(normalize_name(name), kind))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Whether any record is owned by `name`.
    pub fn contains_name(&self, name: &str) -> bool {
        let name = normalize_name(name);
        self.names.iter().any(|n| *n == name)
    }

    /// Whether `name` owns records or sits above a name that does.
    ///
    /// Empty non-terminals such as `_tcp.<host>` exist in the DNS sense and
    /// answer NODATA rather than NXDOMAIN.
    pub fn name_exists(&self, name: &str) -> bool {
        let name = normalize_name(name);
        let suffix = format!(".{name}");
        self.names
            .iter()
            .any(|owner| *owner == name || owner.ends_with(&suffix))
    }

    /// All owner names.
    pub fn all_names(&self) -> BTreeSet<String> {
        self.names.iter().cloned().collect()
    }

    /// Every record, grouped by owner name in insertion order.
    pub fn records(&self) -> impl Iterator<Item = &ResourceRecord> {
        self.names.iter().flat_map(move |name| {
            RecordKind::ALL
                .into_iter()
                .flat_map(move |kind| self.lookup(name, kind).iter())
        })
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the zone holds no records.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of distinct owner names.
    pub fn names_count(&self) -> usize {
        self.names.len()
    }
}

impl FromIterator<ResourceRecord> for Zone {
    fn from_iter<T: IntoIterator<Item = ResourceRecord>>(iter: T) -> Self {
        let mut zone = Zone::new();
        for record in iter {
            zone.insert(record);
        }
        zone
    }
}
