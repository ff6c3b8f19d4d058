use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};

/// Metric values carried by one inbound reading. Absent metrics stay `None`
/// and are persisted as NULL.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReadingValues {
    pub temperatura: Option<f64>,
    pub humedad_ambiente: Option<f64>,
    pub luminosidad: Option<f64>,
    pub humedad_suelo: Option<f64>,
    pub lluvia: Option<f64>,
    pub ph_suelo: Option<f64>,
    pub direccion_viento: Option<f64>,
    pub velocidad_viento: Option<f64>,
}

#[derive(Debug, Clone, FromRow)]
pub struct StoredReading {
    pub id: i32,
    pub fecha: DateTime<Utc>,
}

/// Reading as broadcast to dashboards and echoed back to the sender,
/// enriched with the resolved sensor and bancal names.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichedReading {
    pub id: i32,
    pub sensor_id: i32,
    pub sensor_nombre: String,
    pub bancal_id: Option<i32>,
    pub bancal_nombre: String,
    #[serde(flatten)]
    pub values: ReadingValues,
    pub fecha: DateTime<Utc>,
}

pub async fn insert_reading(
    pool: &PgPool,
    sensor_id: i32,
    bancal_id: Option<i32>,
    values: &ReadingValues,
) -> Result<Option<StoredReading>> {
    let stored: Option<StoredReading> = sqlx::query_as(
        r#"
        INSERT INTO lecturas_sensor (
            sensor_id,
            bancal_id,
            temperatura,
            humedad_ambiente,
            luminosidad,
            humedad_suelo,
            lluvia,
            ph_suelo,
            direccion_viento,
            velocidad_viento,
            fecha
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW())
        RETURNING id, fecha
        "#,
    )
    .bind(sensor_id)
    .bind(bancal_id)
    .bind(values.temperatura)
    .bind(values.humedad_ambiente)
    .bind(values.luminosidad)
    .bind(values.humedad_suelo)
    .bind(values.lluvia)
    .bind(values.ph_suelo)
    .bind(values.direccion_viento)
    .bind(values.velocidad_viento)
    .fetch_optional(pool)
    .await?;

    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn enriched_reading_serializes_flat_with_null_metrics() {
        let reading = EnrichedReading {
            id: 7,
            sensor_id: 3,
            sensor_nombre: "Estación 1".to_string(),
            bancal_id: None,
            bancal_nombre: "desconocido".to_string(),
            values: ReadingValues {
                temperatura: Some(21.5),
                ..ReadingValues::default()
            },
            fecha: Utc.with_ymd_and_hms(2026, 8, 28, 12, 0, 0).unwrap(),
        };

        let encoded = serde_json::to_value(&reading).unwrap();
        assert_eq!(encoded["id"], 7);
        assert_eq!(encoded["temperatura"], 21.5);
        assert_eq!(encoded["humedad_ambiente"], serde_json::Value::Null);
        assert_eq!(encoded["bancal_id"], serde_json::Value::Null);
        assert_eq!(encoded["bancal_nombre"], "desconocido");
        assert!(encoded["fecha"].as_str().unwrap().starts_with("2026-08-28T12:00:00"));
    }
}
