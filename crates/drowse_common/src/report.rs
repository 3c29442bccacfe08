//! Collector wire types
//!
//! The request mirrors what the collector expects on its report endpoint.
//! The response shape is owned by the collector; only the fields below are
//! recognized, anything else is ignored.

use crate::segment::SegmentStats;
use serde::{Deserialize, Serialize};

/// Collector protocol version
pub const PROTOCOL_VERSION: i32 = 2;

/// Sentinel for numeric host facts that could not be looked up
pub const UNKNOWN_COUNT: i64 = -1;

/// Full report sent to the collector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRequest {
    pub protv: i32,
    pub instance: InstanceSection,
    pub machine: MachineSection,
    pub server: ServerSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSection {
    pub id: String,
    pub version: String,
    /// Seconds since this daemon started
    pub uptime: u64,
    pub allow_suspend: bool,
    pub sgm: SegmentReport,
}

/// Segment snapshot as sent on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentReport {
    #[serde(flatten)]
    pub stats: SegmentStats,
    /// Sent as part of a shutdown sequence
    pub pre_term: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineSection {
    pub os: String,
    pub arch: String,
    pub javav: String,
    /// Empty when the CPU could not be identified
    pub cpu_model: String,
    /// Empty when the CPU could not be identified
    pub cpu_vendor: String,
    /// Cores available to this process
    pub cores_dedicated: i64,
    /// Logical cores of the host, `UNKNOWN_COUNT` on failure
    pub cores_sys: i64,
    /// Total memory in bytes, `UNKNOWN_COUNT` on failure
    pub mem: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSection {
    /// Seconds the managed server has been running
    pub uptime: u64,
    pub version: String,
    pub protocol: i32,
}

/// Collector reply
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryResponse {
    pub result: String,
    pub version: VersionInfo,
    pub messages: Vec<String>,
}

/// Latest releases advertised by the collector
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionInfo {
    pub official: String,
    pub dev: String,
}

impl TelemetryResponse {
    /// Result value of an accepted report
    pub const RESULT_SUCCESS: &'static str = "success";

    pub fn is_success(&self) -> bool {
        self.result == Self::RESULT_SUCCESS
    }

    /// True when the collector advertises an official release other than `current`
    pub fn update_available(&self, current: &str) -> bool {
        let official = self.version.official.trim_start_matches('v');
        !official.is_empty() && official != current.trim_start_matches('v')
    }
}
