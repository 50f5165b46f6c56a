use std::str::FromStr;
use std::sync::Mutex;

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};

use super::ProcessInspector;

/// Process inspection via `sysinfo` for hosts without procfs.
///
/// There is no portable way to list which processes map a driver library,
/// so [`ProcessInspector::pids_mapping`] always comes back empty here.
pub struct SysinfoInspector {
    sys: Mutex<System>,
}

impl Default for SysinfoInspector {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoInspector {
    pub fn new() -> Self {
        SysinfoInspector {
            sys: Mutex::new(System::new()),
        }
    }

    fn with_process<T>(&self, pid: &str, read: impl FnOnce(&sysinfo::Process) -> T) -> Option<T> {
        let pid = Pid::from_str(pid).ok()?;
        let mut sys = self.sys.lock().ok()?;
        sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing()
                .with_cmd(UpdateKind::Always)
                .with_memory(),
        );
        sys.process(pid).map(read)
    }
}

impl ProcessInspector for SysinfoInspector {
    fn command_line(&self, pid: &str) -> Option<Vec<String>> {
        let args = self.with_process(pid, |process| {
            process
                .cmd()
                .iter()
                .map(|arg| arg.to_string_lossy().to_string())
                .collect::<Vec<_>>()
        })?;
        (!args.is_empty()).then_some(args)
    }

    fn resident_memory_kib(&self, pid: &str) -> Option<u64> {
        self.with_process(pid, |process| process.memory() / 1024)
    }

    fn pids_mapping(&self, _marker: &str) -> Vec<String> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_process_is_visible() {
        let inspector = SysinfoInspector::new();
        let pid = std::process::id().to_string();
        assert!(inspector.command_line(&pid).is_some());
        assert!(inspector.resident_memory_kib(&pid).unwrap_or(0) > 0);
    }

    #[test]
    fn invalid_pid_is_none() {
        let inspector = SysinfoInspector::new();
        assert_eq!(inspector.command_line("not-a-pid"), None);
    }
}
