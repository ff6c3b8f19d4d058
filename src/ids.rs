use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Deterministic identifier for an alert event. Two evaluations of the same
/// device/metric/direction at the same millisecond yield the same id.
pub(crate) fn alert_event_id(
    device_code: &str,
    metric: &str,
    direction: &str,
    at: DateTime<Utc>,
) -> String {
    let payload = [
        device_code.trim(),
        metric,
        direction,
        &at.timestamp_millis().to_string(),
    ]
    .join("|");

    let digest = Sha256::digest(payload.as_bytes());
    let hex = format!("{digest:x}");
    hex.chars().take(24).collect()
}
