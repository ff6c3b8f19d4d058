use anyhow::Result;
use sqlx::{FromRow, PgPool};

/// Sensor metadata resolved from a device code. Only active sensors resolve.
#[derive(Debug, Clone, FromRow)]
pub struct SensorRow {
    pub id: i32,
    pub nombre: String,
    pub bancal_id: Option<i32>,
}

pub async fn find_active_sensor(pool: &PgPool, device_code: &str) -> Result<Option<SensorRow>> {
    let row: Option<SensorRow> = sqlx::query_as(
        r#"
        SELECT id, nombre, bancal_id
        FROM sensores
        WHERE device_code = $1
          AND activo = TRUE
        "#,
    )
    .bind(device_code.trim())
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub async fn bancal_nombre(pool: &PgPool, bancal_id: i32) -> Result<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as(
        r#"
        SELECT nombre
        FROM bancales
        WHERE id = $1
        "#,
    )
    .bind(bancal_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(nombre,)| nombre))
}
