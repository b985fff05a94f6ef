use std::time::Duration;

use meter_client::{
    db::{consumption_queries, device_queries, reading_queries},
    domain::{DateRange, Device, DeviceClass, Reading},
};
use sqlx::postgres::PgPool;
use time::{Date, PrimitiveDateTime};

use super::{DeviceDirectory, ReadingStore, RollupStore, StoreError};

/// Store backed by the dashboard's PostgreSQL database.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl DeviceDirectory for PgStore {
    async fn list_devices(&self) -> Result<Vec<Device>, StoreError> {
        Ok(device_queries::list_devices(&self.pool).await?)
    }

    async fn vendor_descriptor(&self, vendor_id: i64) -> Result<Option<String>, StoreError> {
        Ok(device_queries::vendor_plate_info(&self.pool, vendor_id).await?)
    }

    async fn average_scan_interval(&self) -> Result<Option<Duration>, StoreError> {
        let avg = device_queries::average_scan_interval_ms(&self.pool).await?;
        Ok(avg
            .filter(|ms| ms.is_finite() && *ms > 0.0)
            .map(|ms| Duration::from_millis(ms.round() as u64)))
    }
}

#[async_trait::async_trait]
impl ReadingStore for PgStore {
    async fn latest_reading(
        &self,
        device_id: i64,
        class: DeviceClass,
    ) -> Result<Option<Reading>, StoreError> {
        let reading = match class {
            DeviceClass::Electrical => {
                reading_queries::latest_electricity_reading(&self.pool, device_id)
                    .await?
                    .map(Reading::Electrical)
            }
            DeviceClass::Gas => reading_queries::latest_gas_reading(&self.pool, device_id)
                .await?
                .map(Reading::Gas),
            DeviceClass::Other => None,
        };
        Ok(reading)
    }
}

#[async_trait::async_trait]
impl RollupStore for PgStore {
    async fn daily_values(
        &self,
        device_id: i64,
        range: DateRange,
    ) -> Result<Vec<(Date, f64)>, StoreError> {
        let rows = consumption_queries::daily_values(&self.pool, device_id, range).await?;
        Ok(rows.into_iter().map(|r| (r.dt, r.value)).collect())
    }

    async fn latest_today_value(
        &self,
        device_id: i64,
        as_of: PrimitiveDateTime,
    ) -> Result<Option<f64>, StoreError> {
        let row = consumption_queries::latest_today_value(&self.pool, device_id, as_of).await?;
        Ok(row.map(|r| r.value))
    }
}
