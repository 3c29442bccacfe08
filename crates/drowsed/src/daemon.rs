//! Daemon loop
//!
//! Ticks the segment on the sampling interval, sends a report on the report
//! interval and a final pre-termination report on Ctrl-C.

use crate::client::{TelemetryClient, REQUEST_TIMEOUT};
use crate::host::SysinfoHost;
use crate::process_tree::ProcessSource;
use crate::report_builder::ReportBuilder;
use crate::reporter::Reporter;
use crate::sampler::ResourceSampler;
use crate::server::{ServerClock, ServerStatus};
use crate::signal::{report_sent_channel, ReportSentListener};
use anyhow::Result;
use drowse_common::{log_error, DrowseConfig, SharedSegment, TelemetryResponse};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Interval whose first tick comes one `period` from now.
///
/// Process CPU usage is measured between two refreshes, so the first
/// sample needs a full period after the sampler took its initial snapshot.
pub fn ticker(period: Duration) -> Interval {
    let mut tick = interval_at(Instant::now() + period, period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tick
}

pub struct Daemon {
    config: Arc<DrowseConfig>,
    segment: SharedSegment,
    clock: Arc<ServerClock>,
    reporter: Arc<Reporter>,
    listener: Option<ReportSentListener>,
}

impl Daemon {
    pub fn new(config: DrowseConfig) -> Self {
        let config = Arc::new(config);
        let segment = SharedSegment::new();
        let clock = Arc::new(ServerClock::new());
        let (notifier, listener) = report_sent_channel();

        let builder = ReportBuilder::new(
            config.clone(),
            segment.clone(),
            Box::new(SysinfoHost::new()),
            clock.clone(),
        );
        let client = TelemetryClient::new(notifier);
        let reporter = Arc::new(Reporter::new(
            builder,
            client,
            config.telemetry.endpoint.clone(),
            segment.clone(),
        ));

        Self {
            config,
            segment,
            clock,
            reporter,
            listener: Some(listener),
        }
    }

    /// Hand the "report sent" listener to its consumer. Only the first call gets it.
    pub fn take_report_listener(&mut self) -> Option<ReportSentListener> {
        self.listener.take()
    }

    /// Status handle for the server lifecycle controller
    pub fn clock(&self) -> Arc<ServerClock> {
        self.clock.clone()
    }

    pub fn segment(&self) -> SharedSegment {
        self.segment.clone()
    }

    /// Account `secs` seconds of the current segment
    pub fn account<S: ProcessSource>(&self, sampler: &mut ResourceSampler<S>, secs: u64) {
        if self.clock.is_running() {
            let (cpu, mem) = sampler.sample(&self.segment);
            let players = self.clock.online_players();
            self.segment.update(|s| {
                s.record_awake(secs, cpu, mem);
                s.add_player_seconds(players, secs);
            });
        } else {
            self.segment.update(|s| s.record_hibernating(secs));
        }
    }

    /// Send a single report
    pub async fn report_once(&self) -> Result<TelemetryResponse> {
        Ok(self.reporter.report(false).await?)
    }

    /// Run until Ctrl-C
    pub async fn run(self) -> Result<()> {
        let telemetry = &self.config.telemetry;
        let enabled = telemetry.enabled;
        let sample_secs = telemetry.effective_sample_interval();
        let report_secs = telemetry.effective_report_interval();

        info!(
            "[DAEMON] Sampling every {}s, reporting every {}s to {}{}",
            sample_secs,
            report_secs,
            self.reporter.endpoint(),
            if enabled { "" } else { " (disabled)" }
        );

        let mut sampler = ResourceSampler::from_system();
        let mut sample_tick = ticker(Duration::from_secs(sample_secs));
        let mut report_tick = ticker(Duration::from_secs(report_secs));

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = sample_tick.tick() => self.account(&mut sampler, sample_secs),
                _ = report_tick.tick(), if enabled => self.spawn_report(false),
                res = &mut shutdown => {
                    if let Err(e) = res {
                        warn!("[DAEMON] Signal handler failed: {}", e);
                    }
                    break;
                }
            }
        }

        if enabled {
            self.send_pre_term().await;
        }
        info!("[DAEMON] Shutting down");
        Ok(())
    }

    fn spawn_report(&self, pre_term: bool) {
        let reporter = self.reporter.clone();
        tokio::spawn(async move {
            if let Err(e) = reporter.report(pre_term).await {
                log_error("report", &e);
            }
        });
    }

    /// Send the shutdown report and wait for its outcome, bounded by the
    /// request timeout. Returns true when the collector replied.
    pub async fn send_pre_term(&self) -> bool {
        debug!("[DAEMON] Sending pre-termination report");
        let bound = REQUEST_TIMEOUT + Duration::from_secs(1);
        match tokio::time::timeout(bound, self.reporter.report(true)).await {
            Ok(Ok(_)) => {
                info!("[DAEMON] Pre-termination report sent");
                true
            }
            Ok(Err(e)) => {
                log_error("pre-termination report", &e);
                false
            }
            Err(_) => {
                warn!("[DAEMON] Pre-termination report not finished after {:?}", bound);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process_tree::fake::FakeSource;
    use approx::assert_relative_eq;

    fn daemon() -> Daemon {
        let mut config = DrowseConfig::default();
        config.telemetry.endpoint = "http://127.0.0.1:9/report".to_string();
        Daemon::new(config)
    }

    #[test]
    fn test_account_hibernating_while_stopped() {
        let daemon = daemon();
        let mut sampler = ResourceSampler::new(FakeSource::with_tree(1, &[]));
        daemon.account(&mut sampler, 1);
        daemon.account(&mut sampler, 2);

        let stats = daemon.segment().snapshot();
        assert_eq!(stats.seconds, 0);
        assert_eq!(stats.seconds_hibe, 3);
    }

    #[test]
    fn test_account_awake_samples_tree() {
        let daemon = daemon();
        daemon.clock().mark_started();
        daemon.clock().set_players(2);

        let mut source = FakeSource::with_tree(1, &[(1, 2)]);
        source.set_usage(1, 5.0, 1.0);
        source.set_usage(2, 15.0, 3.0);
        let mut sampler = ResourceSampler::new(source);

        daemon.account(&mut sampler, 1);
        daemon.account(&mut sampler, 1);

        let stats = daemon.segment().snapshot();
        assert_eq!(stats.seconds, 2);
        assert_eq!(stats.player_sec, 4);
        assert_relative_eq!(stats.cpu_usage, 20.0);
        assert_relative_eq!(stats.mem_usage, 4.0);
    }

    #[test]
    fn test_failed_sample_keeps_average() {
        let daemon = daemon();
        daemon.clock().mark_started();

        let mut source = FakeSource::with_tree(1, &[]);
        source.set_usage(1, 10.0, 2.0);
        let mut sampler = ResourceSampler::new(source);
        daemon.account(&mut sampler, 1);

        let mut broken = FakeSource::with_tree(1, &[]);
        broken.vanished.insert(1);
        let mut sampler = ResourceSampler::new(broken);
        daemon.account(&mut sampler, 1);

        let stats = daemon.segment().snapshot();
        assert_eq!(stats.seconds, 2);
        assert_relative_eq!(stats.cpu_usage, 10.0);
        assert_relative_eq!(stats.mem_usage, 2.0);
    }

    #[tokio::test]
    async fn test_report_once_unreachable_endpoint() {
        let daemon = daemon();
        daemon.segment().update(|s| s.record_hibernating(10));
        let err = daemon.report_once().await.unwrap_err();
        assert!(err.to_string().contains("HTTP transport error") || err.to_string().contains("timed out"));
        // undelivered reports keep the segment
        assert_eq!(daemon.segment().snapshot().seconds_hibe, 10);
    }

    #[tokio::test]
    async fn test_pre_term_failure_is_reported_as_failure() {
        let daemon = daemon();
        daemon.segment().update(|s| s.record_hibernating(7));
        assert!(!daemon.send_pre_term().await);
        assert_eq!(daemon.segment().snapshot().seconds_hibe, 7);
    }

    #[test]
    fn test_report_listener_taken_once() {
        let mut daemon = daemon();
        assert!(daemon.take_report_listener().is_some());
        assert!(daemon.take_report_listener().is_none());
    }

    #[tokio::test]
    async fn test_ticker_skips_immediate_tick() {
        let period = Duration::from_millis(200);
        let mut tick = ticker(period);
        let start = std::time::Instant::now();
        tick.tick().await;
        assert!(start.elapsed() >= Duration::from_millis(150));
    }
}
