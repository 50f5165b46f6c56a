use std::sync::Arc;

pub mod procfs;
pub mod sysinfo_backed;

pub use procfs::ProcFs;
pub use sysinfo_backed::SysinfoInspector;

/// Operating-system process inspection used to name GPU processes.
///
/// Pids are passed as text, the way the tool reports them. Every lookup is
/// best effort: `None`/empty means "not available", never an error.
pub trait ProcessInspector: Send + Sync {
    /// Command line arguments, `None` when unreadable or empty.
    fn command_line(&self, pid: &str) -> Option<Vec<String>>;

    /// Resident set size in KiB.
    fn resident_memory_kib(&self, pid: &str) -> Option<u64>;

    /// Pids whose memory mappings mention `marker`, ascending.
    fn pids_mapping(&self, marker: &str) -> Vec<String>;
}

#[cfg(target_os = "linux")]
pub fn native() -> Arc<dyn ProcessInspector> {
    Arc::new(ProcFs::new())
}

#[cfg(not(target_os = "linux"))]
pub fn native() -> Arc<dyn ProcessInspector> {
    Arc::new(SysinfoInspector::new())
}
