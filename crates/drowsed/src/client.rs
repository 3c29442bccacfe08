//! Collector HTTP client
//!
//! Posts a report as JSON with a bounded timeout. Every call publishes a
//! "report sent" notification when it returns, whatever the outcome.

use crate::signal::ReportSentNotifier;
use drowse_common::{TelemetryError, TelemetryRequest, SOFTWARE_NAME, VERSION};
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use std::time::Duration;
use tracing::{debug, trace};

/// Upper bound for one report exchange
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(4);

/// Identifying client header, e.g. `drowse/2.5.0 (linux) x86_64`
pub fn user_agent() -> String {
    format!(
        "{}/{} ({}) {}",
        SOFTWARE_NAME,
        VERSION,
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// Publishes on drop so every exit path of `send` notifies
struct NotifyOnDrop<'a>(&'a ReportSentNotifier);

impl Drop for NotifyOnDrop<'_> {
    fn drop(&mut self) {
        self.0.notify();
    }
}

pub struct TelemetryClient {
    client: reqwest::Client,
    timeout: Duration,
    notifier: ReportSentNotifier,
}

impl TelemetryClient {
    pub fn new(notifier: ReportSentNotifier) -> Self {
        Self {
            client: Self::build_client(REQUEST_TIMEOUT),
            timeout: REQUEST_TIMEOUT,
            notifier,
        }
    }

    /// Create with custom timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self.client = Self::build_client(timeout);
        self
    }

    fn build_client(timeout: Duration) -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// POST `request` to `endpoint`
    pub async fn send(
        &self,
        endpoint: &str,
        request: &TelemetryRequest,
    ) -> Result<reqwest::Response, TelemetryError> {
        let _sent = NotifyOnDrop(&self.notifier);

        debug!("[REPORT] Sending report to {}", endpoint);

        let body = serde_json::to_vec(request)
            .map_err(|e| TelemetryError::Serialize(e.to_string()))?;
        trace!("[REPORT] drowse --> collector: {}", String::from_utf8_lossy(&body));

        self.client
            .post(endpoint)
            .header(USER_AGENT, user_agent())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| self.classify(e))
    }

    fn classify(&self, err: reqwest::Error) -> TelemetryError {
        if err.is_timeout() {
            TelemetryError::Timeout(self.timeout)
        } else {
            TelemetryError::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::report_sent_channel;

    #[test]
    fn test_user_agent_format() {
        let ua = user_agent();
        assert!(ua.starts_with(&format!("drowse/{} (", VERSION)));
        assert!(ua.contains(&format!("({})", std::env::consts::OS)));
        assert!(ua.ends_with(std::env::consts::ARCH));
    }

    #[test]
    fn test_default_timeout() {
        let (notifier, _listener) = report_sent_channel();
        let client = TelemetryClient::new(notifier);
        assert_eq!(client.timeout(), Duration::from_secs(4));

        let client = client.with_timeout(Duration::from_millis(250));
        assert_eq!(client.timeout(), Duration::from_millis(250));
    }
}
