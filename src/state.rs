//! Serving snapshot of the zone.
//!
//! The server reads the current zone through [`DnsState`]. A rebuild
//! constructs a complete new [`Zone`] off to the side and swaps it in with
//! [`DnsState::replace`]; queries that already loaded the previous snapshot
//! keep using it until they finish.

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

use crate::metrics;
use crate::zone::Zone;

/// Thread-safe handle to the zone currently being served.
#[derive(Debug, Clone)]
pub struct DnsState {
    inner: Arc<RwLock<DnsStateInner>>,
}

#[derive(Debug)]
struct DnsStateInner {
    /// Current read-only zone.
    zone: Arc<Zone>,

    /// Serial number for SOA (incremented on every swap)
    serial: u32,
}

impl Default for DnsState {
    fn default() -> Self {
        Self::new(Zone::new())
    }
}

impl DnsState {
    /// Create a state serving `zone` with serial 1.
    pub fn new(zone: Zone) -> Self {
        Self {
            inner: Arc::new(RwLock::new(DnsStateInner {
                zone: Arc::new(zone),
                serial: 1,
            })),
        }
    }

    /// The current snapshot. Holding the returned `Arc` pins that snapshot.
    pub fn load(&self) -> Arc<Zone> {
        self.inner.read().zone.clone()
    }

    /// Atomically replace the served zone. Returns the new serial.
    pub fn replace(&self, zone: Zone) -> u32 {
        let zone = Arc::new(zone);
        let mut inner = self.inner.write();
        inner.zone = zone;
        inner.serial = inner.serial.wrapping_add(1);
        debug!(
            serial = inner.serial,
            records = inner.zone.len(),
            "swapped zone snapshot"
        );
        metrics::record_zone_reload();
        inner.serial
    }

    /// Get current SOA serial.
    pub fn serial(&self) -> u32 {
        self.inner.read().serial
    }

    /// Get count of records in the current snapshot.
    pub fn records_count(&self) -> usize {
        self.inner.read().zone.len()
    }

    /// Get count of owner names in the current snapshot.
    pub fn names_count(&self) -> usize {
        self.inner.read().zone.names_count()
    }

    /// Emit current state metrics.
    pub fn emit_metrics(&self) {
        let inner = self.inner.read();
        metrics::record_zone_counts(inner.zone.names_count(), inner.zone.len());
        metrics::record_serial(inner.serial);
    }
}
