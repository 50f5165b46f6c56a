use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::sync::watch;

use super::device::GpuDevice;
use super::process::GpuProcess;

/// One collection cycle's worth of monitoring data.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Snapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    #[serde(rename = "gpus")]
    pub devices: Vec<GpuDevice>,
    pub processes: Vec<GpuProcess>,
    /// Set when the cycle failed; devices and processes are then empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Snapshot {
    pub fn collected(timestamp: f64, devices: Vec<GpuDevice>, processes: Vec<GpuProcess>) -> Self {
        Snapshot {
            timestamp: Some(timestamp),
            devices,
            processes,
            error: None,
        }
    }

    pub fn failed(timestamp: f64, error: impl Into<String>) -> Self {
        Snapshot {
            timestamp: Some(timestamp),
            devices: Vec::new(),
            processes: Vec::new(),
            error: Some(error.into()),
        }
    }

    pub fn device(&self, index: u32) -> Option<&GpuDevice> {
        self.devices.iter().find(|d| d.index == index)
    }
}

/// Seconds since the epoch with sub-second precision.
pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

/// The single shared snapshot slot.
///
/// The collector publishes whole snapshots; readers get an `Arc` to
/// whichever snapshot was current, so a reader never sees parts of two
/// cycles.
#[derive(Clone, Debug)]
pub struct SnapshotStore {
    tx: Arc<watch::Sender<Arc<Snapshot>>>,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Arc::new(Snapshot::default()));
        SnapshotStore { tx: Arc::new(tx) }
    }

    pub fn publish(&self, snapshot: Snapshot) {
        self.tx.send_replace(Arc::new(snapshot));
    }

    pub fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&self.tx.borrow())
    }

    /// Receiver notified on every publish.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::device::parse_devices;

    #[test]
    fn store_starts_empty() {
        let store = SnapshotStore::new();
        let snapshot = store.current();
        assert_eq!(snapshot.timestamp, None);
        assert!(snapshot.devices.is_empty());
        assert!(snapshot.processes.is_empty());
        assert_eq!(snapshot.error, None);
    }

    #[test]
    fn publish_replaces_wholesale() {
        let store = SnapshotStore::new();
        let devices = parse_devices("0, Test GPU, 45, 10, 5, 512, 2048, 20.0").unwrap();
        store.publish(Snapshot::collected(10.0, devices, Vec::new()));
        assert_eq!(store.current().devices.len(), 1);

        store.publish(Snapshot::failed(11.0, "nvidia-smi not found"));
        let current = store.current();
        assert_eq!(current.timestamp, Some(11.0));
        assert!(current.devices.is_empty());
        assert_eq!(current.error.as_deref(), Some("nvidia-smi not found"));
    }

    #[test]
    fn readers_keep_their_snapshot_after_publish() {
        let store = SnapshotStore::new();
        store.publish(Snapshot::failed(1.0, "first"));
        let held = store.current();
        store.publish(Snapshot::failed(2.0, "second"));
        assert_eq!(held.error.as_deref(), Some("first"));
        assert_eq!(store.current().error.as_deref(), Some("second"));
    }

    #[test]
    fn empty_snapshot_serializes_without_timestamp() {
        let json = serde_json::to_string(&Snapshot::default()).unwrap();
        assert_eq!(json, r#"{"gpus":[],"processes":[]}"#);
    }

    #[test]
    fn device_lookup_by_index() {
        let devices = parse_devices(
            "1, Second, 40, 1, 1, 1, 10, 1\n0, First, 40, 1, 1, 1, 10, 1\n",
        )
        .unwrap();
        let snapshot = Snapshot::collected(1.0, devices, Vec::new());
        assert_eq!(snapshot.device(0).map(|d| d.name.as_str()), Some("First"));
        assert!(snapshot.device(7).is_none());
    }
}
