//! One-shot troubleshooting report for hosts where the dashboard shows no
//! processes. Nothing here touches the shared snapshot.

use std::io::{self, Write};

use crate::format::truncate_display;
use crate::system::platform::ProcessInspector;
use crate::system::smi::SmiSource;

const MAX_LISTED_PIDS: usize = 10;
const COMMAND_WIDTH: usize = 120;

pub fn run<W: Write>(
    smi: &dyn SmiSource,
    inspector: &dyn ProcessInspector,
    driver_marker: &str,
    out: &mut W,
) -> io::Result<()> {
    writeln!(out, "=== GPU Diagnostics ===")?;

    writeln!(out, "\n1. Default nvidia-smi output:")?;
    match smi.summary() {
        Ok(summary) => writeln!(out, "{}", summary.trim_end())?,
        Err(err) => writeln!(out, "Error: {err}")?,
    }

    writeln!(out, "\n2. Compute processes reported by nvidia-smi:")?;
    match smi.query_compute_apps() {
        Ok(output) if output.trim().is_empty() => writeln!(out, "No output returned")?,
        Ok(output) => writeln!(out, "{}", output.trim_end())?,
        Err(err) => writeln!(out, "Error: {err}")?,
    }

    writeln!(out, "\n3. Processes mapping {driver_marker:?}:")?;
    let pids = inspector.pids_mapping(driver_marker);
    writeln!(out, "Found {} processes with {driver_marker} libraries", pids.len())?;
    for pid in pids.iter().take(MAX_LISTED_PIDS) {
        match inspector.command_line(pid) {
            Some(argv) => writeln!(out, "{pid:>7} {}", truncate_display(&argv.join(" "), COMMAND_WIDTH))?,
            None => writeln!(out, "{pid:>7} - Unable to get details")?,
        }
    }

    writeln!(out, "\n=== End of Diagnostics ===")
}
