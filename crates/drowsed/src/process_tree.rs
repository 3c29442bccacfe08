//! Process tree walking
//!
//! Enumerates a root process and its live descendants. The tree changes
//! while it is being walked, so every branch that can not be enumerated is
//! replaced by [`ProcessHandle::SENTINEL`] instead of failing the walk.

use drowse_common::ProbeError;
use std::collections::{HashMap, HashSet};
use sysinfo::{Pid, System};
use tracing::trace;

/// Reference to one OS process, valid for a single walk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessHandle {
    pub pid: i64,
}

impl ProcessHandle {
    /// Marks a branch whose enumeration failed
    pub const SENTINEL: ProcessHandle = ProcessHandle { pid: -1 };

    pub fn new(pid: i64) -> Self {
        Self { pid }
    }

    pub fn is_sentinel(&self) -> bool {
        self.pid < 0
    }
}

/// Capability to inspect OS processes
pub trait ProcessSource {
    /// Take a fresh snapshot of the process table
    fn refresh(&mut self) {}

    /// Pid of the current process
    fn current_pid(&self) -> Result<i64, ProbeError>;

    /// Direct children of `pid`
    fn children(&self, pid: i64) -> Result<Vec<i64>, ProbeError>;

    /// Instantaneous CPU usage of `pid`, 100 per fully used core
    fn cpu_percent(&self, pid: i64) -> Result<f64, ProbeError>;

    /// Resident memory of `pid` as a percentage of host memory
    fn mem_percent(&self, pid: i64) -> Result<f64, ProbeError>;
}

/// Walk `root` and its descendants depth-first, root first.
///
/// A node whose children can not be listed is emitted as the sentinel and
/// its subtree is skipped. A node without children is not a failure.
pub fn walk<S: ProcessSource + ?Sized>(source: &S, root: i64) -> Vec<ProcessHandle> {
    let mut tree = Vec::new();
    let mut visited = HashSet::new();
    let mut pending = vec![root];

    while let Some(pid) = pending.pop() {
        // pid reuse can make a process show up twice
        if !visited.insert(pid) {
            continue;
        }

        match source.children(pid) {
            Ok(children) => {
                tree.push(ProcessHandle::new(pid));
                // reversed so the first reported child is walked first
                pending.extend(children.into_iter().rev());
            }
            Err(ProbeError::NoChildren(_)) => tree.push(ProcessHandle::new(pid)),
            Err(e) => {
                trace!("[TREE] Branch at pid {} dropped: {}", pid, e);
                tree.push(ProcessHandle::SENTINEL);
            }
        }
    }

    tree
}

/// Parent pid to child pids, built from `(pid, parent)` pairs
pub fn children_index<I>(entries: I) -> HashMap<i64, Vec<i64>>
where
    I: IntoIterator<Item = (i64, Option<i64>)>,
{
    let mut index: HashMap<i64, Vec<i64>> = HashMap::new();
    for (pid, parent) in entries {
        if let Some(parent) = parent {
            index.entry(parent).or_default().push(pid);
        }
    }
    index
}

/// Process source backed by `sysinfo`
pub struct SysinfoSource {
    system: System,
    /// Children per parent, rebuilt on every refresh
    children: HashMap<i64, Vec<i64>>,
}

impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoSource {
    pub fn new() -> Self {
        let mut source = Self {
            system: System::new(),
            children: HashMap::new(),
        };
        source.refresh();
        source
    }

    fn reindex(&mut self) {
        self.children = children_index(self.system.processes().iter().map(|(pid, process)| {
            (
                pid.as_u32() as i64,
                process.parent().map(|parent| parent.as_u32() as i64),
            )
        }));
    }

    fn to_pid(pid: i64) -> Result<Pid, ProbeError> {
        u32::try_from(pid)
            .map(Pid::from_u32)
            .map_err(|_| ProbeError::Vanished(pid))
    }

    fn process(&self, pid: i64) -> Result<&sysinfo::Process, ProbeError> {
        let sys_pid = Self::to_pid(pid)?;
        self.system.process(sys_pid).ok_or(ProbeError::Vanished(pid))
    }
}

/// On Linux the process table also lists threads, parented to their process
#[cfg(target_os = "linux")]
fn is_thread_of(parent: i64, candidate: i64) -> bool {
    std::path::Path::new("/proc")
        .join(parent.to_string())
        .join("task")
        .join(candidate.to_string())
        .exists()
}

#[cfg(not(target_os = "linux"))]
fn is_thread_of(_parent: i64, _candidate: i64) -> bool {
    false
}

impl ProcessSource for SysinfoSource {
    fn refresh(&mut self) {
        self.system.refresh_memory();
        self.system.refresh_processes();
        self.reindex();
    }

    fn current_pid(&self) -> Result<i64, ProbeError> {
        sysinfo::get_current_pid()
            .map(|pid| pid.as_u32() as i64)
            .map_err(|e| ProbeError::Unavailable(e.to_string()))
    }

    fn children(&self, pid: i64) -> Result<Vec<i64>, ProbeError> {
        self.process(pid)?;

        let children: Vec<i64> = self
            .children
            .get(&pid)
            .map(|children| {
                children
                    .iter()
                    .copied()
                    .filter(|&child| !is_thread_of(pid, child))
                    .collect()
            })
            .unwrap_or_default();

        if children.is_empty() {
            return Err(ProbeError::NoChildren(pid));
        }
        Ok(children)
    }

    fn cpu_percent(&self, pid: i64) -> Result<f64, ProbeError> {
        Ok(self.process(pid)?.cpu_usage() as f64)
    }

    fn mem_percent(&self, pid: i64) -> Result<f64, ProbeError> {
        let total = self.system.total_memory();
        if total == 0 {
            return Err(ProbeError::Unreadable {
                pid,
                reason: "total memory unknown".to_string(),
            });
        }
        let used = self.process(pid)?.memory();
        Ok(used as f64 / total as f64 * 100.0)
    }
}
