//! One report cycle: build, send, read, roll the segment over.

use crate::client::TelemetryClient;
use crate::report_builder::ReportBuilder;
use crate::response::read_response;
use drowse_common::{SharedSegment, TelemetryError, TelemetryRequest, TelemetryResponse, VERSION};
use tracing::{info, warn};

pub struct Reporter {
    builder: ReportBuilder,
    client: TelemetryClient,
    endpoint: String,
    segment: SharedSegment,
}

impl Reporter {
    pub fn new(
        builder: ReportBuilder,
        client: TelemetryClient,
        endpoint: impl Into<String>,
        segment: SharedSegment,
    ) -> Self {
        Self {
            builder,
            client,
            endpoint: endpoint.into(),
            segment,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Run one report cycle.
    ///
    /// The segment is taken when the report is built, so seconds accounted
    /// during the exchange land in the next segment. An undelivered segment
    /// is merged back.
    pub async fn report(&self, pre_term: bool) -> Result<TelemetryResponse, TelemetryError> {
        let window = self.segment.take();
        let request = self.builder.build_for(window.stats, pre_term);

        let reply = match self.exchange(&request).await {
            Ok(reply) => reply,
            Err(e) => {
                self.segment.restore(window);
                return Err(e);
            }
        };

        let finished = window.stats;
        info!(
            "[REPORT] Segment reported: {}s span since {}, {}s awake, {}s hibernating, cpu {:.1}%, mem {:.1}%",
            window.elapsed_secs(),
            window.started_at.format("%Y-%m-%d %H:%M:%S"),
            finished.seconds,
            finished.seconds_hibe,
            finished.cpu_usage,
            finished.mem_usage
        );

        Self::handle_reply(&reply);
        Ok(reply)
    }

    async fn exchange(&self, request: &TelemetryRequest) -> Result<TelemetryResponse, TelemetryError> {
        let response = self.client.send(&self.endpoint, request).await?;
        read_response(response).await
    }

    fn handle_reply(reply: &TelemetryResponse) {
        if !reply.is_success() {
            warn!("[REPORT] Collector result: {:?}", reply.result);
        }
        if reply.update_available(VERSION) {
            info!(
                "[UPDATE] drowse {} is available (running {})",
                reply.version.official, VERSION
            );
        }
        for message in &reply.messages {
            info!("[COLLECTOR] {}", message);
        }
    }
}
