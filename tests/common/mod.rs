#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use gpu_monitor::system::smi::{SmiError, SmiSource};

pub const ONE_GPU: &str = "0, Test GPU, 45, 10, 5, 512, 2048, 20.0\n";

/// Canned `nvidia-smi`. `None` outputs behave like a missing binary.
#[derive(Default)]
pub struct FakeSmi {
    pub gpus: Option<String>,
    pub compute_apps: Option<String>,
    pub compute_memory: Option<String>,
    pub summary: Option<String>,
    pub available: bool,
    pub gpu_queries: AtomicUsize,
}

impl FakeSmi {
    pub fn with_gpus(gpus: &str) -> Self {
        FakeSmi {
            gpus: Some(gpus.to_string()),
            compute_apps: Some(String::new()),
            compute_memory: Some(String::new()),
            available: true,
            ..FakeSmi::default()
        }
    }

    pub fn missing() -> Self {
        FakeSmi::default()
    }

    pub fn gpu_query_count(&self) -> usize {
        self.gpu_queries.load(Ordering::SeqCst)
    }
}

fn canned(output: &Option<String>) -> Result<String, SmiError> {
    output
        .clone()
        .ok_or_else(|| SmiError::NotFound("nvidia-smi".to_string()))
}

impl SmiSource for FakeSmi {
    fn query_gpus(&self) -> Result<String, SmiError> {
        self.gpu_queries.fetch_add(1, Ordering::SeqCst);
        canned(&self.gpus)
    }

    fn query_compute_apps(&self) -> Result<String, SmiError> {
        canned(&self.compute_apps)
    }

    fn query_compute_memory(&self) -> Result<String, SmiError> {
        canned(&self.compute_memory)
    }

    fn probe_version(&self) -> Result<(), SmiError> {
        if self.available {
            Ok(())
        } else {
            Err(SmiError::NotFound("nvidia-smi".to_string()))
        }
    }

    fn summary(&self) -> Result<String, SmiError> {
        canned(&self.summary)
    }
}

pub fn shared(smi: FakeSmi) -> Arc<FakeSmi> {
    Arc::new(smi)
}

/// A throwaway procfs tree under the temp dir.
pub struct FakeProc {
    pub root: PathBuf,
}

impl FakeProc {
    pub fn new(name: &str) -> Self {
        let root = std::env::temp_dir().join(format!(
            "gpu_monitor_it_{name}_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(&root).expect("create fake proc root");
        FakeProc { root }
    }

    pub fn cmdline(&self, pid: &str, argv: &[&str]) -> &Self {
        let mut raw = Vec::new();
        for arg in argv {
            raw.extend_from_slice(arg.as_bytes());
            raw.push(0);
        }
        self.write(pid, "cmdline", &raw)
    }

    pub fn maps_driver(&self, pid: &str) -> &Self {
        self.write(
            pid,
            "maps",
            b"7f2a1c000000-7f2a1c200000 r-xp 00000000 08:01 42 /usr/lib/x86_64-linux-gnu/libnvidia-ml.so.535.104.05\n",
        )
    }

    pub fn maps_plain(&self, pid: &str) -> &Self {
        self.write(
            pid,
            "maps",
            b"7f2a1c000000-7f2a1c200000 r-xp 00000000 08:01 7 /usr/lib/x86_64-linux-gnu/libc.so.6\n",
        )
    }

    pub fn rss_kib(&self, pid: &str, kib: u64) -> &Self {
        let status = format!("Name:\tproc{pid}\nState:\tS (sleeping)\nVmRSS:\t{kib:>8} kB\n");
        self.write(pid, "status", status.as_bytes())
    }

    fn write(&self, pid: &str, name: &str, contents: &[u8]) -> &Self {
        let dir = self.root.join(pid);
        fs::create_dir_all(&dir).expect("create fake pid dir");
        fs::write(dir.join(name), contents).expect("write fake proc file");
        self
    }
}

impl Drop for FakeProc {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}
