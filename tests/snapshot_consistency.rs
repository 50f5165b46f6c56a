use std::thread;

use gpu_monitor::system::device::GpuDevice;
use gpu_monitor::system::process::{GpuProcess, UsedMemory};
use gpu_monitor::system::snapshot::{Snapshot, SnapshotStore};

const CYCLES: usize = 2_000;
const READERS: usize = 4;

fn device(index: u32) -> GpuDevice {
    GpuDevice {
        index,
        name: format!("GPU {index}"),
        temperature: Some(40.0),
        gpu_utilization: Some(0.0),
        memory_utilization_reported: Some(0.0),
        memory_used: 0.0,
        memory_total: 1024.0,
        power_draw: None,
        memory_utilization_computed: 0.0,
    }
}

/// Cycle `n` has `n % 4` devices and processes, all tagged with `n`.
fn cycle(n: usize) -> Snapshot {
    let count = n % 4;
    Snapshot::collected(
        n as f64,
        (0..count as u32).map(device).collect(),
        (0..count)
            .map(|i| GpuProcess {
                pid: format!("{n}-{i}"),
                process_name: "worker".into(),
                gpu_name: "GPU 0".into(),
                used_memory: UsedMemory::Mib(n as u64),
            })
            .collect(),
    )
}

#[test]
fn readers_never_see_a_mixed_snapshot() {
    let store = SnapshotStore::new();

    thread::scope(|scope| {
        for _ in 0..READERS {
            let store = store.clone();
            scope.spawn(move || {
                let mut last_seen = -1.0;
                while last_seen < (CYCLES - 1) as f64 {
                    let snapshot = store.current();
                    let Some(ts) = snapshot.timestamp else {
                        continue;
                    };
                    let n = ts as usize;
                    assert_eq!(snapshot.devices.len(), n % 4);
                    assert_eq!(snapshot.processes.len(), n % 4);
                    for process in &snapshot.processes {
                        assert_eq!(process.used_memory, UsedMemory::Mib(n as u64));
                        assert!(process.pid.starts_with(&format!("{n}-")));
                    }
                    assert!(ts >= last_seen, "snapshots went backwards");
                    last_seen = ts;
                }
            });
        }

        for n in 0..CYCLES {
            store.publish(cycle(n));
        }
    });

    assert_eq!(store.current().timestamp, Some((CYCLES - 1) as f64));
}
