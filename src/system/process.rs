use std::fmt;

use serde::{Serialize, Serializer};

use super::smi::csv_rows;
use crate::format::format_mib;

/// A process found holding GPU resources.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GpuProcess {
    /// Kept as text, it is only ever redisplayed.
    pub pid: String,
    pub process_name: String,
    pub gpu_name: String,
    pub used_memory: UsedMemory,
}

/// GPU memory attributed to a process, whole MiB.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UsedMemory {
    Mib(u64),
    Unknown,
}

impl UsedMemory {
    /// Parse the tool's `used_memory` column (MiB, `nounits`).
    pub fn from_tool(raw: &str) -> Self {
        match raw.trim().parse::<f64>() {
            Ok(mib) if mib.is_finite() && mib >= 0.0 => UsedMemory::Mib(mib.round() as u64),
            _ => UsedMemory::Unknown,
        }
    }

    /// Resident set size from `/proc/<pid>/status`, truncated to MiB.
    pub fn from_rss_kib(kib: u64) -> Self {
        UsedMemory::Mib(kib / 1024)
    }
}

impl fmt::Display for UsedMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsedMemory::Mib(mib) => f.write_str(&format_mib(*mib)),
            UsedMemory::Unknown => f.write_str("Unknown"),
        }
    }
}

impl Serialize for UsedMemory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One row of the `--query-compute-apps` output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComputeApp {
    pub pid: String,
    pub process_name: String,
    pub gpu_id: String,
    pub used_memory: UsedMemory,
}

pub fn parse_compute_apps(output: &str) -> Vec<ComputeApp> {
    csv_rows(output)
        .filter(|fields| fields.len() >= 4)
        .map(|fields| ComputeApp {
            pid: fields[0].to_string(),
            process_name: fields[1].to_string(),
            gpu_id: fields[2].to_string(),
            used_memory: UsedMemory::from_tool(fields[3]),
        })
        .collect()
}

/// Look up one pid in `pid, used_memory` output. Matches the pid exactly.
pub fn compute_memory_for(output: &str, pid: &str) -> Option<UsedMemory> {
    csv_rows(output)
        .filter(|fields| fields.len() >= 2 && fields[0] == pid)
        .map(|fields| UsedMemory::from_tool(fields[1]))
        .find(|mem| *mem != UsedMemory::Unknown)
}

/// Rules for turning a command line into a short display name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NameRules {
    pub interpreters: Vec<String>,
    pub script_extensions: Vec<String>,
}

impl Default for NameRules {
    fn default() -> Self {
        NameRules {
            interpreters: vec!["python".to_string(), "python3".to_string()],
            script_extensions: vec![".py".to_string()],
        }
    }
}

impl NameRules {
    /// Display name for a command line: the executable's basename, plus the
    /// script basename when the executable is an interpreter.
    ///
    /// Arguments are re-split on whitespace since some programs rewrite
    /// their argv into a single space-joined string.
    pub fn display_name<S: AsRef<str>>(&self, argv: &[S]) -> Option<String> {
        let mut tokens = argv.iter().flat_map(|arg| arg.as_ref().split_whitespace());
        let program = basename(tokens.next()?);
        if program.is_empty() {
            return None;
        }

        if self.interpreters.iter().any(|i| i == program)
            && let Some(script) = tokens.find(|t| self.is_script(t))
        {
            return Some(format!("{program} {}", basename(script)));
        }

        Some(program.to_string())
    }

    fn is_script(&self, token: &str) -> bool {
        self.script_extensions
            .iter()
            .any(|ext| token.len() > ext.len() && token.ends_with(ext.as_str()))
    }
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
