//! Invocation of the `nvidia-smi` command line tool.
//!
//! Every query asks for `csv,noheader,nounits` output so rows are plain
//! comma-separated values. Parsing lives next to the types it produces
//! (`device` and `process`); this module only runs commands and splits rows.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

pub const GPU_QUERY: &str = "--query-gpu=index,name,temperature.gpu,utilization.gpu,utilization.memory,memory.used,memory.total,power.draw";
pub const COMPUTE_APPS_QUERY: &str = "--query-compute-apps=pid,process_name,gpu_uuid,used_memory";
pub const COMPUTE_MEMORY_QUERY: &str = "--query-compute-apps=pid,used_memory";
const CSV_FORMAT: &str = "--format=csv,noheader,nounits";

#[derive(Debug)]
pub enum SmiError {
    /// The binary could not be found on `PATH` (or at the configured path).
    NotFound(String),
    Spawn { program: String, source: io::Error },
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
}

impl fmt::Display for SmiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SmiError::NotFound(program) => write!(f, "{program} not found"),
            SmiError::Spawn { program, source } => write!(f, "failed to run {program}: {source}"),
            SmiError::Failed {
                program,
                code: Some(code),
                stderr,
            } if !stderr.is_empty() => write!(f, "{program} exited with status {code}: {stderr}"),
            SmiError::Failed {
                program,
                code: Some(code),
                ..
            } => write!(f, "{program} exited with status {code}"),
            SmiError::Failed { program, .. } => write!(f, "{program} was terminated by a signal"),
        }
    }
}

impl std::error::Error for SmiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SmiError::Spawn { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Source of raw `nvidia-smi` output.
///
/// The collector and the health probe only talk to the tool through this
/// trait so tests can feed canned output.
pub trait SmiSource: Send + Sync {
    /// Per-device rows for [`GPU_QUERY`].
    fn query_gpus(&self) -> Result<String, SmiError>;

    /// Per-process rows for [`COMPUTE_APPS_QUERY`].
    fn query_compute_apps(&self) -> Result<String, SmiError>;

    /// `pid, used_memory` rows for [`COMPUTE_MEMORY_QUERY`].
    fn query_compute_memory(&self) -> Result<String, SmiError>;

    /// Availability check; succeeds when `--version` exits cleanly.
    fn probe_version(&self) -> Result<(), SmiError>;

    /// The tool's default human-readable report.
    fn summary(&self) -> Result<String, SmiError>;
}

#[derive(Debug, Clone)]
pub struct NvidiaSmi {
    program: PathBuf,
}

impl Default for NvidiaSmi {
    fn default() -> Self {
        Self::new("nvidia-smi")
    }
}

impl NvidiaSmi {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn run(&self, args: &[&str]) -> Result<String, SmiError> {
        let program = self.program.display().to_string();
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|source| match source.kind() {
                io::ErrorKind::NotFound => SmiError::NotFound(program.clone()),
                _ => SmiError::Spawn {
                    program: program.clone(),
                    source,
                },
            })?;

        if !output.status.success() {
            return Err(SmiError::Failed {
                program,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl SmiSource for NvidiaSmi {
    fn query_gpus(&self) -> Result<String, SmiError> {
        self.run(&[GPU_QUERY, CSV_FORMAT])
    }

    fn query_compute_apps(&self) -> Result<String, SmiError> {
        self.run(&[COMPUTE_APPS_QUERY, CSV_FORMAT])
    }

    fn query_compute_memory(&self) -> Result<String, SmiError> {
        self.run(&[COMPUTE_MEMORY_QUERY, CSV_FORMAT])
    }

    fn probe_version(&self) -> Result<(), SmiError> {
        self.run(&["--version"]).map(|_| ())
    }

    fn summary(&self) -> Result<String, SmiError> {
        self.run(&[])
    }
}

/// Non-blank rows of csv output, each split into trimmed fields.
pub fn csv_rows(output: &str) -> impl Iterator<Item = Vec<&str>> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.split(',').map(str::trim).collect())
}
