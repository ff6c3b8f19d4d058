use serde_json::json;
use tokio::sync::broadcast;

use crate::services::readings::EnrichedReading;
use crate::services::thresholds::AlertEvent;

/// Fan-out capability handed to the ingestion pipeline. Every open dashboard
/// connection holds a subscription; a send with no subscribers is not an
/// error, and lagging or closed receivers are skipped on their own side.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    tx: broadcast::Sender<String>,
}

impl Broadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(16));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn broadcast_reading(&self, reading: &EnrichedReading) {
        self.send(json!({ "type": "weather_data", "data": reading }).to_string());
    }

    pub fn broadcast_alert(&self, alert: &AlertEvent) {
        self.send(json!({ "type": "weather_alert", "data": alert }).to_string());
    }

    fn send(&self, frame: String) {
        // Err means no subscriber is currently connected.
        let _ = self.tx.send(frame);
    }
}
