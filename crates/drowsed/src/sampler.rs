//! Process tree resource sampling
//!
//! Sums CPU and memory usage over the whole tree rooted at this process.
//! Any read failure abandons the sample and the stored segment averages
//! are returned instead, so one transient OS error never skews the trend.

use crate::process_tree::{walk, ProcessSource, SysinfoSource};
use drowse_common::{log_error, SharedSegment, TelemetryError};
use tracing::trace;

/// Samples the resource usage of this process and its descendants
pub struct ResourceSampler<S: ProcessSource> {
    source: S,
}

impl ResourceSampler<SysinfoSource> {
    /// Sampler over the live OS process table
    pub fn from_system() -> Self {
        Self::new(SysinfoSource::new())
    }
}

impl<S: ProcessSource> ResourceSampler<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Tree-wide `(cpu, mem)` totals, or the segment averages if any read fails.
    ///
    /// Totals are sums over every process, not averages.
    pub fn sample(&mut self, segment: &SharedSegment) -> (f64, f64) {
        let fallback = segment.averages();

        self.source.refresh();
        match self.tree_totals() {
            Ok(totals) => totals,
            Err(e) => {
                log_error("sample", &e);
                fallback
            }
        }
    }

    fn tree_totals(&self) -> Result<(f64, f64), TelemetryError> {
        let root = self
            .source
            .current_pid()
            .map_err(|e| TelemetryError::RootProcess(e.to_string()))?;

        let mut cpu = 0.0;
        let mut mem = 0.0;
        for handle in walk(&self.source, root) {
            cpu += self
                .source
                .cpu_percent(handle.pid)
                .map_err(|e| TelemetryError::ProcessRead(e.to_string()))?;
            mem += self
                .source
                .mem_percent(handle.pid)
                .map_err(|e| TelemetryError::ProcessRead(e.to_string()))?;
        }

        trace!("[SAMPLE] tree cpu={:.2}% mem={:.2}%", cpu, mem);
        Ok((cpu, mem))
    }
}
