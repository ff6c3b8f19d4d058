use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value as JsonValue};
use sqlx::PgPool;
use std::future::Future;

use crate::services::alert_dedup::AlertDedup;
use crate::services::broadcast::Broadcaster;
use crate::services::readings::{self, EnrichedReading, ReadingValues, StoredReading};
use crate::services::registry::{self, SensorRow};
use crate::services::thresholds;

pub(crate) const MSG_SAVED: &str = "Datos registrados";
pub(crate) const MSG_DEVICE_REQUIRED: &str = "El device_code es requerido";
pub(crate) const MSG_NOT_SAVED: &str = "No se pudo guardar la lectura";
pub(crate) const MSG_SYSTEM_ERROR: &str = "Error en el sistema";
pub(crate) const UNKNOWN_BANCAL: &str = "desconocido";

/// Persistence collaborators consumed by the pipeline. The Postgres
/// implementation is the production path; tests substitute stub stores.
pub trait IngestStore: Send + Sync {
    fn find_active_sensor(
        &self,
        device_code: &str,
    ) -> impl Future<Output = Result<Option<SensorRow>>> + Send;

    fn bancal_nombre(&self, bancal_id: i32) -> impl Future<Output = Result<Option<String>>> + Send;

    fn insert_reading(
        &self,
        sensor_id: i32,
        bancal_id: Option<i32>,
        values: &ReadingValues,
    ) -> impl Future<Output = Result<Option<StoredReading>>> + Send;
}

#[derive(Debug, Clone)]
pub struct PgIngestStore {
    pool: PgPool,
}

impl PgIngestStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl IngestStore for PgIngestStore {
    async fn find_active_sensor(&self, device_code: &str) -> Result<Option<SensorRow>> {
        registry::find_active_sensor(&self.pool, device_code).await
    }

    async fn bancal_nombre(&self, bancal_id: i32) -> Result<Option<String>> {
        registry::bancal_nombre(&self.pool, bancal_id).await
    }

    async fn insert_reading(
        &self,
        sensor_id: i32,
        bancal_id: Option<i32>,
        values: &ReadingValues,
    ) -> Result<Option<StoredReading>> {
        readings::insert_reading(&self.pool, sensor_id, bancal_id, values).await
    }
}

/// Outcome delivered back to the submitting connection only.
#[derive(Debug, Clone)]
pub enum IngestReply {
    Accepted(EnrichedReading),
    Rejected(String),
}

impl IngestReply {
    pub fn to_frame(&self) -> String {
        match self {
            IngestReply::Accepted(reading) => {
                json!({ "message": MSG_SAVED, "data": reading }).to_string()
            }
            IngestReply::Rejected(message) => json!({ "message": message }).to_string(),
        }
    }
}

/// One inbound text frame end to end: parse, validate, resolve the sensor,
/// persist, evaluate thresholds, dedup, broadcast. Unexpected failures are
/// logged and answered with the generic system-error message; they never
/// tear down the connection.
pub async fn process_frame<S: IngestStore>(
    store: &S,
    dedup: &AlertDedup,
    broadcaster: &Broadcaster,
    text: &str,
    now: DateTime<Utc>,
) -> IngestReply {
    match run_pipeline(store, dedup, broadcaster, text, now).await {
        Ok(reply) => reply,
        Err(err) => {
            tracing::error!(error = %err, "reading ingestion failed");
            IngestReply::Rejected(MSG_SYSTEM_ERROR.to_string())
        }
    }
}

async fn run_pipeline<S: IngestStore>(
    store: &S,
    dedup: &AlertDedup,
    broadcaster: &Broadcaster,
    text: &str,
    now: DateTime<Utc>,
) -> Result<IngestReply> {
    let parsed: JsonValue = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(err) => {
            tracing::debug!(error = %err, "malformed reading frame");
            return Ok(IngestReply::Rejected(MSG_SYSTEM_ERROR.to_string()));
        }
    };
    let Some(obj) = parsed.as_object() else {
        return Ok(IngestReply::Rejected(MSG_SYSTEM_ERROR.to_string()));
    };

    let Some(device_code) = obj
        .get("device_code")
        .and_then(|value| value.as_str())
        .map(str::trim)
        .filter(|value| !value.is_empty())
    else {
        return Ok(IngestReply::Rejected(MSG_DEVICE_REQUIRED.to_string()));
    };

    let Some(sensor) = store.find_active_sensor(device_code).await? else {
        return Ok(IngestReply::Rejected(format!(
            "Sensor con {device_code} no existe o está inactivo"
        )));
    };

    let bancal_nombre = match sensor.bancal_id {
        Some(bancal_id) => store
            .bancal_nombre(bancal_id)
            .await?
            .unwrap_or_else(|| UNKNOWN_BANCAL.to_string()),
        None => UNKNOWN_BANCAL.to_string(),
    };

    let values = parse_values(obj);
    let Some(stored) = store
        .insert_reading(sensor.id, sensor.bancal_id, &values)
        .await?
    else {
        return Ok(IngestReply::Rejected(MSG_NOT_SAVED.to_string()));
    };

    let alerts = thresholds::evaluate(device_code, &values, &sensor.nombre, &bancal_nombre, now);

    let enriched = EnrichedReading {
        id: stored.id,
        sensor_id: sensor.id,
        sensor_nombre: sensor.nombre,
        bancal_id: sensor.bancal_id,
        bancal_nombre,
        values,
        fecha: stored.fecha,
    };

    broadcaster.broadcast_reading(&enriched);
    for alert in &alerts {
        if dedup.check_and_record(device_code, alert, now) {
            broadcaster.broadcast_alert(alert);
        }
    }

    Ok(IngestReply::Accepted(enriched))
}

fn parse_values(obj: &Map<String, JsonValue>) -> ReadingValues {
    ReadingValues {
        temperatura: metric_f64(obj, "temperatura"),
        humedad_ambiente: metric_f64(obj, "humedad_ambiente"),
        luminosidad: metric_f64(obj, "luminosidad"),
        humedad_suelo: metric_f64(obj, "humedad_suelo"),
        lluvia: metric_f64(obj, "lluvia"),
        ph_suelo: metric_f64(obj, "ph_suelo"),
        direccion_viento: metric_f64(obj, "direccion_viento"),
        velocidad_viento: metric_f64(obj, "velocidad_viento"),
    }
}

// Values that fail numeric parsing are skipped, not treated as breaches.
fn metric_f64(obj: &Map<String, JsonValue>, key: &str) -> Option<f64> {
    let value = obj.get(key)?;
    if let Some(number) = value.as_f64() {
        return Some(number);
    }
    value
        .as_str()
        .and_then(|raw| raw.trim().parse::<f64>().ok())
}
