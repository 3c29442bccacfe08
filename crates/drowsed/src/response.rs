//! Collector response reading

use drowse_common::{TelemetryError, TelemetryResponse};
use tracing::{debug, trace};

/// Read and parse a collector reply.
///
/// Takes the response by value: the body and its connection are released
/// on every return path.
pub async fn read_response(response: reqwest::Response) -> Result<TelemetryResponse, TelemetryError> {
    debug!("[REPORT] Reading response ({})", response.status());

    let body = response
        .bytes()
        .await
        .map_err(|e| TelemetryError::ReadBody(e.to_string()))?;
    trace!("[REPORT] collector --> drowse: {}", String::from_utf8_lossy(&body));

    parse_response(&body)
}

/// Parse a collector reply body
pub fn parse_response(body: &[u8]) -> Result<TelemetryResponse, TelemetryError> {
    serde_json::from_slice(body).map_err(|e| TelemetryError::Parse(e.to_string()))
}
