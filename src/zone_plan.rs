//! Record set changes for populating a managed DNS zone.
//!
//! Managed zone APIs take whole record sets: one owner, one type, one TTL
//! and a list of rdata strings. [`record_set_changes`] folds the records of
//! every group into that shape; a [`ZoneManager`] applies them.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::DnsError;
use crate::fixture::RecordGroup;
use crate::record::RecordKind;

/// One record set upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSetChange {
    /// Managed zone identifier (not the DNS suffix).
    pub zone_name: String,
    /// Owner name of the set.
    pub owner_name: String,
    /// Record type of the set.
    pub kind: RecordKind,
    /// TTL shared by the set.
    pub ttl: u32,
    /// Presentation rdata of each record.
    pub data: Vec<String>,
}

/// Group all records of `groups` by (owner, type), in first-seen order.
///
/// Records repeated across groups are listed once. A set whose records
/// disagree on TTL is rejected.
pub fn record_set_changes(
    zone_name: &str,
    groups: &[RecordGroup],
) -> Result<Vec<RecordSetChange>, DnsError> {
    let mut changes: Vec<RecordSetChange> = Vec::new();

    for record in groups.iter().flat_map(RecordGroup::records) {
        let rdata = record.data().rdata();
        let existing = changes
            .iter_mut()
            .find(|c| c.owner_name == record.name() && c.kind == record.kind());

        match existing {
            Some(change) => {
                if change.ttl != record.ttl() {
                    return Err(DnsError::invalid(
                        "ttl",
                        format!(
                            "{} {} has ttl {} and {}",
                            change.owner_name,
                            change.kind,
                            change.ttl,
                            record.ttl()
                        ),
                    ));
                }
                if !change.data.contains(&rdata) {
                    change.data.push(rdata);
                }
            }
            None => changes.push(RecordSetChange {
                zone_name: zone_name.to_string(),
                owner_name: record.name().to_string(),
                kind: record.kind(),
                ttl: record.ttl(),
                data: vec![rdata],
            }),
        }
    }

    debug!(zone = zone_name, sets = changes.len(), "planned record set changes");
    Ok(changes)
}

/// External zone-management collaborator. Upserts must be idempotent.
#[async_trait]
pub trait ZoneManager: Send + Sync {
    /// Create or replace one record set.
    async fn apply_record_set(&self, change: &RecordSetChange) -> Result<(), DnsError>;
}

/// Apply every change in order, stopping at the first failure.
pub async fn apply_all(
    manager: &dyn ZoneManager,
    changes: &[RecordSetChange],
) -> Result<usize, DnsError> {
    for change in changes {
        manager.apply_record_set(change).await?;
        debug!(owner = %change.owner_name, kind = %change.kind, "applied record set");
    }
    info!(sets = changes.len(), "zone populated");
    Ok(changes.len())
}

fn gcloud(args: &[&str], zone_name: &str) -> Vec<String> {
    let mut command = vec!["gcloud".to_string(), "dns".to_string(), "record-sets".to_string()];
    command.extend(args.iter().map(|a| a.to_string()));
    command.push(format!("-z={zone_name}"));
    command
}

/// `gcloud dns` commands populating a managed zone in one transaction.
pub fn gcloud_transaction(zone_name: &str, changes: &[RecordSetChange]) -> Vec<Vec<String>> {
    let mut commands = vec![gcloud(&["transaction", "start"], zone_name)];

    for change in changes {
        let mut command = gcloud(&["transaction", "add"], zone_name);
        command.push(format!("--name={}", change.owner_name));
        command.push(format!("--type={}", change.kind));
        command.push(format!("--ttl={}", change.ttl));
        command.extend(change.data.iter().cloned());
        commands.push(command);
    }

    commands.push(gcloud(&["transaction", "describe"], zone_name));
    commands.push(gcloud(&["transaction", "execute"], zone_name));
    commands.push(gcloud(&["list"], zone_name));
    commands
}
