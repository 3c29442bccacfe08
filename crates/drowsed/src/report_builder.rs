//! Report assembly
//!
//! Builds the collector request from configuration, the current segment,
//! host facts and managed server facts. Host lookups may fail; each failing
//! field gets its sentinel and the build still succeeds.

use crate::host::{CpuIdentity, HostProbe};
use crate::server::ServerStatus;
use drowse_common::{
    log_error, DrowseConfig, InstanceSection, MachineSection, SegmentReport, SegmentStats,
    ServerSection, SharedSegment, TelemetryError, TelemetryRequest, PROTOCOL_VERSION,
    UNKNOWN_COUNT, VERSION,
};
use std::sync::Arc;
use std::time::Instant;

pub struct ReportBuilder {
    config: Arc<DrowseConfig>,
    segment: SharedSegment,
    host: Box<dyn HostProbe>,
    server: Arc<dyn ServerStatus>,
    started: Instant,
}

impl ReportBuilder {
    pub fn new(
        config: Arc<DrowseConfig>,
        segment: SharedSegment,
        host: Box<dyn HostProbe>,
        server: Arc<dyn ServerStatus>,
    ) -> Self {
        Self {
            config,
            segment,
            host,
            server,
            started: Instant::now(),
        }
    }

    /// Assemble a report of the current segment. `pre_term` marks a report
    /// sent while shutting down.
    pub fn build(&self, pre_term: bool) -> TelemetryRequest {
        self.build_for(self.segment.snapshot(), pre_term)
    }

    /// Assemble a report of a segment already taken out of the shared one
    pub fn build_for(&self, stats: SegmentStats, pre_term: bool) -> TelemetryRequest {
        TelemetryRequest {
            protv: PROTOCOL_VERSION,
            instance: InstanceSection {
                id: self.config.instance.id.clone(),
                version: VERSION.to_string(),
                uptime: self.started.elapsed().as_secs(),
                allow_suspend: self.config.instance.allow_suspend,
                sgm: SegmentReport {
                    stats,
                    pre_term,
                },
            },
            machine: self.machine_section(),
            server: ServerSection {
                uptime: self.server.uptime_secs(),
                version: self.config.server.version.clone(),
                protocol: self.config.server.protocol,
            },
        }
    }

    fn machine_section(&self) -> MachineSection {
        let cpu = self.host.cpu_identity().unwrap_or_else(|e| {
            Self::non_blocking("cpu_info", e.to_string());
            CpuIdentity {
                model: String::new(),
                vendor: String::new(),
            }
        });

        let cores_sys = match self.host.system_cores() {
            Ok(cores) => cores as i64,
            Err(e) => {
                Self::non_blocking("cores", e.to_string());
                UNKNOWN_COUNT
            }
        };

        let mem = match self.host.total_memory() {
            Ok(bytes) => i64::try_from(bytes).unwrap_or(i64::MAX),
            Err(e) => {
                Self::non_blocking("memory", e.to_string());
                UNKNOWN_COUNT
            }
        };

        MachineSection {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            javav: self.config.server.java_version.clone(),
            cpu_model: cpu.model,
            cpu_vendor: cpu.vendor,
            cores_dedicated: self.host.dedicated_cores() as i64,
            cores_sys,
            mem,
        }
    }

    fn non_blocking(field: &'static str, reason: String) {
        log_error("build", &TelemetryError::HostLookup { field, reason });
    }
}
