use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;

use crate::services::thresholds::AlertEvent;

#[derive(Debug, Clone)]
struct SeenAlert {
    alert_id: String,
    seen_at: DateTime<Utc>,
}

/// Windowed alert deduplication, scoped per device. An alert for the same
/// device/metric/direction inside the window is suppressed even when its
/// timestamp-derived id differs. Check-and-record holds the lock across both
/// steps, so concurrent messages for the same device cannot double-broadcast.
#[derive(Debug)]
pub struct AlertDedup {
    window: Duration,
    // device code -> alert kind (metric + direction) -> last occurrence
    inner: Mutex<HashMap<String, HashMap<String, SeenAlert>>>,
}

impl AlertDedup {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Returns true when the event is new for this device and records it;
    /// false when an equivalent alert was already seen inside the window.
    pub fn check_and_record(&self, device_code: &str, event: &AlertEvent, now: DateTime<Utc>) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let device_entries = inner.entry(device_code.to_string()).or_default();

        if let Some(seen) = device_entries.get(&event.kind) {
            if seen.alert_id == event.id || now - seen.seen_at < self.window {
                return false;
            }
        }

        device_entries.insert(
            event.kind.clone(),
            SeenAlert {
                alert_id: event.id.clone(),
                seen_at: now,
            },
        );
        true
    }

    /// Drops entries older than the window. Returns how many were removed.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let mut removed = 0usize;
        inner.retain(|_, device_entries| {
            let before = device_entries.len();
            device_entries.retain(|_, seen| now - seen.seen_at < self.window);
            removed += before - device_entries.len();
            !device_entries.is_empty()
        });
        removed
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Background sweep keeping the dedup store bounded over long uptimes.
pub struct DedupSweepService {
    dedup: Arc<AlertDedup>,
    interval: std::time::Duration,
}

impl DedupSweepService {
    pub fn new(dedup: Arc<AlertDedup>, interval: std::time::Duration) -> Self {
        Self { dedup, interval }
    }

    pub fn start(self, cancel: CancellationToken) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        let removed = self.dedup.sweep(Utc::now());
                        if removed > 0 {
                            tracing::debug!(removed, "pruned expired alert dedup entries");
                        }
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::readings::ReadingValues;
    use crate::services::thresholds::evaluate;
    use chrono::TimeZone;

    fn window() -> Duration {
        Duration::seconds(300)
    }

    fn hot_alert(device_code: &str, now: DateTime<Utc>) -> AlertEvent {
        let values = ReadingValues {
            temperatura: Some(45.0),
            ..ReadingValues::default()
        };
        evaluate(device_code, &values, "Sensor 1", "Bancal A", now).remove(0)
    }

    #[test]
    fn second_alert_in_window_is_suppressed() {
        let dedup = AlertDedup::new(window());
        let now = Utc.with_ymd_and_hms(2026, 8, 28, 12, 0, 0).unwrap();

        assert!(dedup.check_and_record("S1", &hot_alert("S1", now), now));
        // later breach, different timestamp hence different id
        let later = now + Duration::seconds(30);
        assert!(!dedup.check_and_record("S1", &hot_alert("S1", later), later));
    }

    #[test]
    fn identical_id_is_suppressed() {
        let dedup = AlertDedup::new(window());
        let now = Utc.with_ymd_and_hms(2026, 8, 28, 12, 0, 0).unwrap();
        let alert = hot_alert("S1", now);

        assert!(dedup.check_and_record("S1", &alert, now));
        assert!(!dedup.check_and_record("S1", &alert, now));
    }

    #[test]
    fn devices_do_not_collide() {
        let dedup = AlertDedup::new(window());
        let now = Utc.with_ymd_and_hms(2026, 8, 28, 12, 0, 0).unwrap();

        assert!(dedup.check_and_record("S1", &hot_alert("S1", now), now));
        assert!(dedup.check_and_record("S2", &hot_alert("S2", now), now));
        assert_eq!(dedup.len(), 2);
    }

    #[test]
    fn alert_fires_again_after_window() {
        let dedup = AlertDedup::new(window());
        let now = Utc.with_ymd_and_hms(2026, 8, 28, 12, 0, 0).unwrap();

        assert!(dedup.check_and_record("S1", &hot_alert("S1", now), now));
        let later = now + window() + Duration::seconds(1);
        assert!(dedup.check_and_record("S1", &hot_alert("S1", later), later));
    }

    #[test]
    fn sweep_prunes_expired_entries() {
        let dedup = AlertDedup::new(window());
        let now = Utc.with_ymd_and_hms(2026, 8, 28, 12, 0, 0).unwrap();

        dedup.check_and_record("S1", &hot_alert("S1", now), now);
        dedup.check_and_record("S2", &hot_alert("S2", now), now);
        assert_eq!(dedup.len(), 2);

        assert_eq!(dedup.sweep(now + Duration::seconds(10)), 0);
        assert_eq!(dedup.sweep(now + window() + Duration::seconds(1)), 2);
        assert!(dedup.is_empty());
    }
}
