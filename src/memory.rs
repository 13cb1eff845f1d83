//! Process memory sampling
//!
//! Sessions record resident memory at start and stop (and optionally in
//! between) to report a memory delta and a peak. The sampler is a trait so
//! tests and embedders without `/proc` can plug in their own source.

use parking_lot::Mutex;
use sysinfo::{Pid, System};
use tracing::debug;

/// Source of resident-set-size samples, in bytes
pub trait MemorySampler: Send + Sync + std::fmt::Debug {
    fn resident_bytes(&self) -> u64;
}

/// Samples the current process via `/proc/self/status` on Linux, falling back
/// to `sysinfo` elsewhere or when procfs is unavailable.
#[derive(Debug)]
pub struct ProcessMemorySampler {
    pid: Pid,
    system: Mutex<System>,
}

impl ProcessMemorySampler {
    pub fn new() -> Self {
        Self {
            pid: Pid::from_u32(std::process::id()),
            system: Mutex::new(System::new()),
        }
    }

    #[cfg(target_os = "linux")]
    fn read_proc_status() -> Option<u64> {
        let status = std::fs::read_to_string("/proc/self/status").ok()?;
        parse_vm_rss_kb(&status).map(|kb| kb * 1024)
    }

    #[cfg(not(target_os = "linux"))]
    fn read_proc_status() -> Option<u64> {
        None
    }

    fn read_sysinfo(&self) -> u64 {
        let mut system = self.system.lock();
        if !system.refresh_process(self.pid) {
            debug!("sysinfo could not refresh pid {}", self.pid);
            return 0;
        }
        system.process(self.pid).map(|p| p.memory()).unwrap_or(0)
    }
}

impl Default for ProcessMemorySampler {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySampler for ProcessMemorySampler {
    fn resident_bytes(&self) -> u64 {
        Self::read_proc_status().unwrap_or_else(|| self.read_sysinfo())
    }
}

/// Sampler that always reports zero; used when memory tracking is disabled
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMemorySampler;

impl MemorySampler for NullMemorySampler {
    fn resident_bytes(&self) -> u64 {
        0
    }
}

/// Extract the `VmRSS:` value (in kB) from a `/proc/<pid>/status` body
fn parse_vm_rss_kb(status: &str) -> Option<u64> {
    status
        .lines()
        .find(|line| line.starts_with("VmRSS:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|value| value.parse::<u64>().ok())
}
