use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::ids::alert_event_id;
use crate::services::readings::ReadingValues;

/// Tag identifying the originating data stream on every alert event.
pub const ALERT_SOURCE: &str = "estacion_meteorologica";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Below,
    Above,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Below => "below",
            Direction::Above => "above",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AlertEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub timestamp: String,
    pub device_code: String,
    pub source: &'static str,
}

struct ThresholdRule {
    metric: &'static str,
    label: &'static str,
    min: f64,
    max: f64,
    value: fn(&ReadingValues) -> Option<f64>,
}

/// Inclusive bounds are valid; only values strictly outside are breaches.
const RULES: [ThresholdRule; 7] = [
    ThresholdRule {
        metric: "temperatura",
        label: "Temperatura",
        min: 0.0,
        max: 40.0,
        value: |values| values.temperatura,
    },
    ThresholdRule {
        metric: "humedad_ambiente",
        label: "Humedad ambiente",
        min: 20.0,
        max: 90.0,
        value: |values| values.humedad_ambiente,
    },
    ThresholdRule {
        metric: "luminosidad",
        label: "Luminosidad",
        min: 100.0,
        max: 10_000.0,
        value: |values| values.luminosidad,
    },
    ThresholdRule {
        metric: "lluvia",
        label: "Lluvia",
        min: 0.0,
        max: 50.0,
        value: |values| values.lluvia,
    },
    ThresholdRule {
        metric: "velocidad_viento",
        label: "Velocidad del viento",
        min: 0.0,
        max: 20.0,
        value: |values| values.velocidad_viento,
    },
    ThresholdRule {
        metric: "humedad_suelo",
        label: "Humedad del suelo",
        min: 10.0,
        max: 80.0,
        value: |values| values.humedad_suelo,
    },
    ThresholdRule {
        metric: "ph_suelo",
        label: "pH del suelo",
        min: 5.5,
        max: 7.5,
        value: |values| values.ph_suelo,
    },
];

/// Maps a reading onto zero or more alert events against the static rule
/// table. Pure: no side effects, `now` is injected by the caller.
pub fn evaluate(
    device_code: &str,
    values: &ReadingValues,
    sensor_nombre: &str,
    bancal_nombre: &str,
    now: DateTime<Utc>,
) -> Vec<AlertEvent> {
    let mut alerts: Vec<AlertEvent> = Vec::new();

    for rule in &RULES {
        let Some(value) = (rule.value)(values) else {
            continue;
        };
        if !value.is_finite() {
            continue;
        }

        let direction = if value < rule.min {
            Direction::Below
        } else if value > rule.max {
            Direction::Above
        } else {
            continue;
        };

        let message = match direction {
            Direction::Below => format!(
                "Alerta de {sensor_nombre}: {} en {bancal_nombre} registró {value}, por debajo del mínimo {}",
                rule.label, rule.min
            ),
            Direction::Above => format!(
                "Alerta de {sensor_nombre}: {} en {bancal_nombre} registró {value}, por encima del máximo {}",
                rule.label, rule.max
            ),
        };

        alerts.push(AlertEvent {
            id: alert_event_id(device_code, rule.metric, direction.as_str(), now),
            kind: format!("{}_{}_threshold", rule.metric, direction.as_str()),
            message,
            timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            device_code: device_code.to_string(),
            source: ALERT_SOURCE,
        });
    }

    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at_noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 28, 12, 0, 0).unwrap()
    }

    #[test]
    fn in_range_values_produce_no_alerts() {
        let values = ReadingValues {
            temperatura: Some(25.0),
            humedad_ambiente: Some(55.0),
            luminosidad: Some(5_000.0),
            humedad_suelo: Some(40.0),
            lluvia: Some(10.0),
            ph_suelo: Some(6.5),
            direccion_viento: Some(180.0),
            velocidad_viento: Some(5.0),
        };
        assert!(evaluate("S1", &values, "Sensor 1", "Bancal A", at_noon()).is_empty());
    }

    #[test]
    fn inclusive_bounds_are_valid() {
        let values = ReadingValues {
            temperatura: Some(40.0),
            humedad_ambiente: Some(20.0),
            ph_suelo: Some(7.5),
            ..ReadingValues::default()
        };
        assert!(evaluate("S1", &values, "Sensor 1", "Bancal A", at_noon()).is_empty());
    }

    #[test]
    fn value_above_max_produces_exactly_one_above_alert() {
        let values = ReadingValues {
            temperatura: Some(45.0),
            ..ReadingValues::default()
        };
        let alerts = evaluate("S1", &values, "Sensor 1", "Bancal A", at_noon());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, "temperatura_above_threshold");
        assert!(alerts[0].message.contains("Bancal A"));
        assert!(alerts[0].message.contains("45"));
        assert_eq!(alerts[0].device_code, "S1");
        assert_eq!(alerts[0].source, ALERT_SOURCE);
    }

    #[test]
    fn value_below_min_produces_exactly_one_below_alert() {
        let values = ReadingValues {
            ph_suelo: Some(4.2),
            ..ReadingValues::default()
        };
        let alerts = evaluate("S1", &values, "Sensor 1", "Bancal A", at_noon());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, "ph_suelo_below_threshold");
        assert!(alerts[0].message.contains("por debajo del mínimo 5.5"));
    }

    #[test]
    fn multiple_breaches_produce_one_alert_per_metric() {
        let values = ReadingValues {
            temperatura: Some(-3.0),
            velocidad_viento: Some(35.0),
            lluvia: Some(12.0),
            ..ReadingValues::default()
        };
        let alerts = evaluate("S1", &values, "Sensor 1", "Bancal A", at_noon());
        let kinds: Vec<&str> = alerts.iter().map(|alert| alert.kind.as_str()).collect();
        assert_eq!(
            kinds,
            vec![
                "temperatura_below_threshold",
                "velocidad_viento_above_threshold"
            ]
        );
    }

    #[test]
    fn absent_metrics_are_skipped() {
        let alerts = evaluate(
            "S1",
            &ReadingValues::default(),
            "Sensor 1",
            "Bancal A",
            at_noon(),
        );
        assert!(alerts.is_empty());
    }

    #[test]
    fn wind_direction_carries_no_rule() {
        let values = ReadingValues {
            direccion_viento: Some(359.0),
            ..ReadingValues::default()
        };
        assert!(evaluate("S1", &values, "Sensor 1", "Bancal A", at_noon()).is_empty());
    }

    #[test]
    fn same_instant_evaluations_yield_identical_ids() {
        let values = ReadingValues {
            temperatura: Some(45.0),
            ..ReadingValues::default()
        };
        let now = at_noon();
        let first = evaluate("S1", &values, "Sensor 1", "Bancal A", now);
        let second = evaluate("S1", &values, "Sensor 1", "Bancal A", now);
        assert_eq!(first[0].id, second[0].id);
    }
}
