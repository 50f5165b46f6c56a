use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use super::ProcessInspector;

/// Process inspection through a procfs mount.
///
/// The root is configurable so tests can point it at a fabricated tree.
#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcFs {
    pub fn new() -> Self {
        Self::with_root("/proc")
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn pid_file(&self, pid: &str, name: &str) -> Option<PathBuf> {
        // Reject anything that is not a bare pid so it cannot escape the root.
        if !is_pid(pid) {
            return None;
        }
        Some(self.root.join(pid).join(name))
    }
}

impl ProcessInspector for ProcFs {
    fn command_line(&self, pid: &str) -> Option<Vec<String>> {
        let raw = fs::read(self.pid_file(pid, "cmdline")?).ok()?;
        let args: Vec<String> = raw
            .split(|b| *b == 0)
            .filter(|arg| !arg.is_empty())
            .map(|arg| String::from_utf8_lossy(arg).into_owned())
            .collect();
        // Kernel threads and zombies have an empty cmdline.
        (!args.is_empty()).then_some(args)
    }

    fn resident_memory_kib(&self, pid: &str) -> Option<u64> {
        let contents = fs::read_to_string(self.pid_file(pid, "status")?).ok()?;
        // "VmRSS:\t  123456 kB"
        contents
            .lines()
            .find_map(|line| line.strip_prefix("VmRSS:"))
            .and_then(|rest| rest.split_whitespace().next())
            .and_then(|kib| kib.parse().ok())
    }

    fn pids_mapping(&self, marker: &str) -> Vec<String> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::debug!(root = %self.root.display(), %err, "cannot list procfs");
                return Vec::new();
            }
        };

        let mut pids: Vec<u64> = entries
            .flatten()
            .filter_map(|entry| entry.file_name().to_str()?.parse::<u64>().ok())
            .filter(|pid| maps_contain(&self.root.join(pid.to_string()).join("maps"), marker))
            .collect();
        pids.sort_unstable();
        pids.dedup();
        pids.into_iter().map(|pid| pid.to_string()).collect()
    }
}

// Unreadable maps (permissions, process exited) count as no match.
fn maps_contain(path: &Path, marker: &str) -> bool {
    let Ok(file) = File::open(path) else {
        return false;
    };
    BufReader::new(file)
        .lines()
        .map_while(Result::ok)
        .any(|line| line.contains(marker))
}

fn is_pid(pid: &str) -> bool {
    !pid.is_empty() && pid.bytes().all(|b| b.is_ascii_digit())
}
