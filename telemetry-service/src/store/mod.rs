//! Read-only access to devices, readings and consumption rollups.
//!
//! The engine only talks to the traits below; `PgStore` backs them with the
//! dashboard database and `memory::InMemoryStore` backs them in tests.

use std::time::Duration;

use meter_client::domain::{DateRange, Device, DeviceClass, Reading};
use time::{Date, PrimitiveDateTime};

pub mod postgres;

#[cfg(test)]
pub mod memory;

pub use postgres::PgStore;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// The store could not be reached at all; nothing else in the cycle will succeed.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store query failed: {0}")]
    Query(String),
}

impl StoreError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => Self::Unavailable(e.to_string()),
            other => Self::Query(other.to_string()),
        }
    }
}

impl From<anyhow::Error> for StoreError {
    fn from(e: anyhow::Error) -> Self {
        match e.downcast::<sqlx::Error>() {
            Ok(sql) => sql.into(),
            Err(other) => Self::Query(format!("{other:#}")),
        }
    }
}

#[async_trait::async_trait]
pub trait DeviceDirectory: Send + Sync {
    async fn list_devices(&self) -> Result<Vec<Device>, StoreError>;

    /// Raw plate info JSON for a vendor model; `None` when there is no record.
    async fn vendor_descriptor(&self, vendor_id: i64) -> Result<Option<String>, StoreError>;

    /// Mean of the positive per-device scan intervals, if any device sets one.
    async fn average_scan_interval(&self) -> Result<Option<Duration>, StoreError>;
}

#[async_trait::async_trait]
pub trait ReadingStore: Send + Sync {
    async fn latest_reading(
        &self,
        device_id: i64,
        class: DeviceClass,
    ) -> Result<Option<Reading>, StoreError>;
}

#[async_trait::async_trait]
pub trait RollupStore: Send + Sync {
    async fn daily_values(
        &self,
        device_id: i64,
        range: DateRange,
    ) -> Result<Vec<(Date, f64)>, StoreError>;

    /// Newest cumulative today-bucket value at or before `as_of`, on `as_of`'s date.
    async fn latest_today_value(
        &self,
        device_id: i64,
        as_of: PrimitiveDateTime,
    ) -> Result<Option<f64>, StoreError>;
}
