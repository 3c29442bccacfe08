//! Host machine facts for reports

use drowse_common::ProbeError;
use sysinfo::System;

/// CPU identification strings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuIdentity {
    pub model: String,
    pub vendor: String,
}

/// Capability to look up host machine facts
pub trait HostProbe: Send + Sync {
    fn cpu_identity(&self) -> Result<CpuIdentity, ProbeError>;

    /// Logical cores of the host
    fn system_cores(&self) -> Result<usize, ProbeError>;

    /// Total memory in bytes
    fn total_memory(&self) -> Result<u64, ProbeError>;

    /// Cores this process may use
    fn dedicated_cores(&self) -> usize {
        num_cpus::get()
    }
}

/// Host facts from `sysinfo`, read once at construction
pub struct SysinfoHost {
    system: System,
}

impl Default for SysinfoHost {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoHost {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu();
        system.refresh_memory();
        Self { system }
    }
}

impl HostProbe for SysinfoHost {
    fn cpu_identity(&self) -> Result<CpuIdentity, ProbeError> {
        let cpu = self
            .system
            .cpus()
            .first()
            .ok_or_else(|| ProbeError::Unavailable("no cpu reported".to_string()))?;

        // Some platforms leave the brand empty but still name the cpu
        let model = if cpu.brand().trim().is_empty() {
            cpu.name().to_string()
        } else {
            cpu.brand().trim().to_string()
        };

        Ok(CpuIdentity {
            model,
            vendor: cpu.vendor_id().to_string(),
        })
    }

    fn system_cores(&self) -> Result<usize, ProbeError> {
        match self.system.cpus().len() {
            0 => Err(ProbeError::Unavailable("no cpu reported".to_string())),
            n => Ok(n),
        }
    }

    fn total_memory(&self) -> Result<u64, ProbeError> {
        match self.system.total_memory() {
            0 => Err(ProbeError::Unavailable("total memory unknown".to_string())),
            bytes => Ok(bytes),
        }
    }
}
