use anyhow::Result;
use sqlx::PgPool;

use crate::domain::{Device, DeviceRow};

/// All devices with their type and parent site, in dashboard order.
pub async fn list_devices(pool: &PgPool) -> Result<Vec<Device>> {
    let rows = sqlx::query_as::<_, DeviceRow>(
        r#"
        SELECT
            d.id,
            d.name,
            d.vendor        AS vendor_id,
            t.type          AS device_type,
            d.parent_id     AS site_id,
            o.name          AS site_name,
            d.active,
            d.sort_id::int8 AS sort_id
        FROM device d
        LEFT JOIN device_type t ON t.id = d.device_type_id
        LEFT JOIN objects o     ON o.id = d.parent_id
        ORDER BY d.sort_id NULLS LAST, d.id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Device::from).collect())
}

/// Raw plate info JSON of a vendor model, if the record exists and has one.
pub async fn vendor_plate_info(pool: &PgPool, vendor_model_id: i64) -> Result<Option<String>> {
    let raw: Option<Option<String>> = sqlx::query_scalar(
        r#"
        SELECT plate_info::text
        FROM vendor_models
        WHERE _id = $1
        "#,
    )
    .bind(vendor_model_id)
    .fetch_optional(pool)
    .await?;

    Ok(raw.flatten())
}

/// Average configured scan interval in milliseconds over devices that set one.
pub async fn average_scan_interval_ms(pool: &PgPool) -> Result<Option<f64>> {
    let avg: Option<f64> = sqlx::query_scalar(
        r#"
        SELECT AVG(scan_interval)::float8
        FROM device_setting
        WHERE scan_interval > 0
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(avg)
}
