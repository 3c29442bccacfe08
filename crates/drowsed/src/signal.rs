//! "Report sent" notification
//!
//! A single-slot channel. At most one notification is pending; while the
//! slot is full further notifications are dropped. Publishing never waits.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::trace;

/// Create a connected notifier/listener pair
pub fn report_sent_channel() -> (ReportSentNotifier, ReportSentListener) {
    let (tx, rx) = mpsc::channel(1);
    (ReportSentNotifier { tx }, ReportSentListener { rx })
}

/// Publishing side, cheap to clone
#[derive(Debug, Clone)]
pub struct ReportSentNotifier {
    tx: mpsc::Sender<()>,
}

impl ReportSentNotifier {
    /// Publish without waiting. Returns false when the notification was dropped.
    pub fn notify(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(())) => {
                trace!("[SIGNAL] Report sent notification dropped, slot full");
                false
            }
            Err(TrySendError::Closed(())) => {
                trace!("[SIGNAL] Report sent notification dropped, no listener");
                false
            }
        }
    }
}

/// Consuming side, one per channel
#[derive(Debug)]
pub struct ReportSentListener {
    rx: mpsc::Receiver<()>,
}

impl ReportSentListener {
    /// Wait for the next notification. False once every notifier is gone.
    pub async fn recv(&mut self) -> bool {
        self.rx.recv().await.is_some()
    }

    /// Wait for the next notification for at most `timeout`
    pub async fn recv_timeout(&mut self, timeout: Duration) -> bool {
        matches!(tokio::time::timeout(timeout, self.rx.recv()).await, Ok(Some(())))
    }
}
