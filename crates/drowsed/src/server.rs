//! Managed server status as seen by the telemetry core

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Read-only view of the managed server, provided by the lifecycle controller
pub trait ServerStatus: Send + Sync {
    /// Seconds since the server was started, 0 while stopped
    fn uptime_secs(&self) -> u64;

    fn is_running(&self) -> bool;

    /// Players currently connected
    fn online_players(&self) -> u64 {
        0
    }
}

/// In-process server status, updated by whoever starts and stops the server
#[derive(Debug, Default)]
pub struct ServerClock {
    started: Mutex<Option<Instant>>,
    players: AtomicU64,
}

impl ServerClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_started(&self) {
        *self.lock() = Some(Instant::now());
    }

    pub fn mark_stopped(&self) {
        *self.lock() = None;
        self.players.store(0, Ordering::Relaxed);
    }

    pub fn set_players(&self, players: u64) {
        self.players.store(players, Ordering::Relaxed);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Instant>> {
        self.started.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn uptime(&self) -> Duration {
        self.lock().map(|start| start.elapsed()).unwrap_or_default()
    }
}

impl ServerStatus for ServerClock {
    fn uptime_secs(&self) -> u64 {
        self.uptime().as_secs()
    }

    fn is_running(&self) -> bool {
        self.lock().is_some()
    }

    fn online_players(&self) -> u64 {
        self.players.load(Ordering::Relaxed)
    }
}
