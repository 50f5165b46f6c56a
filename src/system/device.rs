use std::fmt;

use serde::Serialize;

use super::smi::csv_rows;

/// Number of columns requested by [`super::smi::GPU_QUERY`].
pub const GPU_FIELD_COUNT: usize = 8;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GpuDevice {
    pub index: u32,
    pub name: String,
    /// Degrees Celsius.
    pub temperature: Option<f64>,
    pub gpu_utilization: Option<f64>,
    /// Memory controller utilization as reported by the tool.
    pub memory_utilization_reported: Option<f64>,
    /// MiB.
    pub memory_used: f64,
    /// MiB.
    pub memory_total: f64,
    /// Watts.
    pub power_draw: Option<f64>,
    /// Share of framebuffer memory in use, see [`memory_utilization`].
    pub memory_utilization_computed: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceParseError {
    pub field: &'static str,
    pub value: String,
}

impl fmt::Display for DeviceParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {} value {:?}", self.field, self.value)
    }
}

impl std::error::Error for DeviceParseError {}

/// `used / total` as a percentage rounded to one decimal, 0 when total is 0.
pub fn memory_utilization(used: f64, total: f64) -> f64 {
    if total > 0.0 {
        (used / total * 1000.0).round() / 10.0
    } else {
        0.0
    }
}

/// Parse the whole `--query-gpu` output.
///
/// Short rows are skipped; unparseable index or memory figures fail the
/// whole batch since they mean the tool's output format is not what we asked
/// for.
pub fn parse_devices(output: &str) -> Result<Vec<GpuDevice>, DeviceParseError> {
    let mut devices = Vec::new();
    for fields in csv_rows(output) {
        if fields.len() < GPU_FIELD_COUNT {
            tracing::debug!(row = ?fields, "skipping short device row");
            continue;
        }
        devices.push(parse_device_fields(&fields)?);
    }
    Ok(devices)
}

fn parse_device_fields(fields: &[&str]) -> Result<GpuDevice, DeviceParseError> {
    let memory_used = required(fields[5], "memory.used")?;
    let memory_total = required(fields[6], "memory.total")?;

    Ok(GpuDevice {
        index: fields[0].parse().map_err(|_| DeviceParseError {
            field: "index",
            value: fields[0].to_string(),
        })?,
        name: fields[1].to_string(),
        temperature: optional(fields[2]),
        gpu_utilization: optional(fields[3]),
        memory_utilization_reported: optional(fields[4]),
        memory_used,
        memory_total,
        power_draw: optional(fields[7]),
        memory_utilization_computed: memory_utilization(memory_used, memory_total),
    })
}

fn required(raw: &str, field: &'static str) -> Result<f64, DeviceParseError> {
    raw.parse().map_err(|_| DeviceParseError {
        field,
        value: raw.to_string(),
    })
}

// Unsupported sensors come back as "[N/A]" or "[Not Supported]".
fn optional(raw: &str) -> Option<f64> {
    raw.parse().ok()
}
