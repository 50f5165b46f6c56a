use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::device::{DeviceParseError, GpuDevice, parse_devices};
use super::platform::ProcessInspector;
use super::process::{GpuProcess, NameRules, UsedMemory, compute_memory_for, parse_compute_apps};
use super::smi::{SmiError, SmiSource};
use super::snapshot::{Snapshot, SnapshotStore, unix_now};

/// Why a whole cycle failed.
#[derive(Debug)]
pub enum CollectError {
    Command(SmiError),
    Parse(DeviceParseError),
}

impl fmt::Display for CollectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectError::Command(err) => write!(f, "{err}"),
            CollectError::Parse(err) => write!(f, "unexpected nvidia-smi output: {err}"),
        }
    }
}

impl std::error::Error for CollectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CollectError::Command(err) => Some(err),
            CollectError::Parse(err) => Some(err),
        }
    }
}

impl From<SmiError> for CollectError {
    fn from(err: SmiError) -> Self {
        CollectError::Command(err)
    }
}

impl From<DeviceParseError> for CollectError {
    fn from(err: DeviceParseError) -> Self {
        CollectError::Parse(err)
    }
}

/// Builds one [`Snapshot`] per call from the tool and the process table.
#[derive(Clone)]
pub struct Collector {
    smi: Arc<dyn SmiSource>,
    inspector: Arc<dyn ProcessInspector>,
    driver_marker: String,
    names: NameRules,
}

impl Collector {
    pub fn new(
        smi: Arc<dyn SmiSource>,
        inspector: Arc<dyn ProcessInspector>,
        driver_marker: impl Into<String>,
        names: NameRules,
    ) -> Self {
        Collector {
            smi,
            inspector,
            driver_marker: driver_marker.into(),
            names,
        }
    }

    /// Run one cycle. Never fails: a broken cycle yields an error snapshot.
    pub fn collect(&self) -> Snapshot {
        let _span = tracing::debug_span!("collector.cycle").entered();

        match self.devices() {
            Ok(devices) => {
                let processes = self.discover_processes(&devices);
                debug!(
                    devices = devices.len(),
                    processes = processes.len(),
                    "cycle complete"
                );
                Snapshot::collected(unix_now(), devices, processes)
            }
            Err(err) => {
                warn!(%err, "collection cycle failed");
                Snapshot::failed(unix_now(), err.to_string())
            }
        }
    }

    fn devices(&self) -> Result<Vec<GpuDevice>, CollectError> {
        let output = self.smi.query_gpus()?;
        Ok(parse_devices(&output)?)
    }

    /// Processes found through the compute-apps query, or through the
    /// driver-mapping scan when the query reports none.
    pub fn discover_processes(&self, devices: &[GpuDevice]) -> Vec<GpuProcess> {
        let processes = self.compute_app_processes(devices);
        if !processes.is_empty() {
            return processes;
        }
        self.driver_mapped_processes(devices)
    }

    fn compute_app_processes(&self, devices: &[GpuDevice]) -> Vec<GpuProcess> {
        let output = match self.smi.query_compute_apps() {
            Ok(output) => output,
            Err(err) => {
                warn!(%err, "compute-apps query failed");
                return Vec::new();
            }
        };

        parse_compute_apps(&output)
            .into_iter()
            .map(|app| {
                let process_name = self.display_name(&app.pid).unwrap_or_else(|| {
                    debug!(pid = %app.pid, "command line unavailable, using reported name");
                    app.process_name.clone()
                });
                let gpu_name = devices
                    .first()
                    .map(|d| d.name.clone())
                    .unwrap_or_else(|| app.gpu_id.clone());
                GpuProcess {
                    pid: app.pid,
                    process_name,
                    gpu_name,
                    used_memory: app.used_memory,
                }
            })
            .collect()
    }

    fn driver_mapped_processes(&self, devices: &[GpuDevice]) -> Vec<GpuProcess> {
        let pids = self.inspector.pids_mapping(&self.driver_marker);
        if pids.is_empty() {
            return Vec::new();
        }
        debug!(count = pids.len(), marker = %self.driver_marker, "falling back to mapped pids");

        let gpu_name = devices
            .first()
            .map(|d| d.name.clone())
            .unwrap_or_else(|| "Unknown".to_string());

        // One query serves every pid of this cycle.
        let tool_memory = match self.smi.query_compute_memory() {
            Ok(output) => Some(output),
            Err(err) => {
                debug!(%err, "per-pid memory query failed");
                None
            }
        };

        pids.into_iter()
            .filter_map(|pid| {
                let Some(process_name) = self.display_name(&pid) else {
                    debug!(%pid, "skipping mapped pid without a readable command line");
                    return None;
                };
                let used_memory = tool_memory
                    .as_deref()
                    .and_then(|output| compute_memory_for(output, &pid))
                    .or_else(|| {
                        self.inspector
                            .resident_memory_kib(&pid)
                            .map(UsedMemory::from_rss_kib)
                    })
                    .unwrap_or(UsedMemory::Unknown);
                Some(GpuProcess {
                    pid,
                    process_name,
                    gpu_name: gpu_name.clone(),
                    used_memory,
                })
            })
            .collect()
    }

    fn display_name(&self, pid: &str) -> Option<String> {
        let argv = self.inspector.command_line(pid)?;
        self.names.display_name(argv.as_slice())
    }

    /// Collect forever, publishing each snapshot then sleeping `interval`.
    ///
    /// Cycles run on the blocking pool since they wait on child processes
    /// and file reads. They never overlap.
    pub async fn run(self, store: SnapshotStore, interval: Duration) {
        info!(interval_ms = interval.as_millis() as u64, "collector started");
        loop {
            let collector = self.clone();
            let snapshot = match tokio::task::spawn_blocking(move || collector.collect()).await {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    warn!(%err, "collection cycle aborted");
                    Snapshot::failed(unix_now(), format!("collection cycle aborted: {err}"))
                }
            };
            store.publish(snapshot);
            tokio::time::sleep(interval).await;
        }
    }
}
