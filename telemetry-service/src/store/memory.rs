use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    time::Duration,
};

use meter_client::domain::{
    DailyConsumption, DateRange, Device, DeviceClass, Reading, TodayConsumption,
};
use time::{Date, PrimitiveDateTime};

use super::{DeviceDirectory, ReadingStore, RollupStore, StoreError};

/// Store fixture holding everything in memory.
#[derive(Default)]
pub struct InMemoryStore {
    pub devices: Vec<Device>,
    pub descriptors: HashMap<i64, String>,
    pub readings: HashMap<i64, Reading>,
    pub daily: Vec<DailyConsumption>,
    pub today: Vec<TodayConsumption>,
    pub scan_interval: Option<Duration>,
    /// Device ids whose reading lookup fails with a query error.
    pub broken_readings: Vec<i64>,
    /// Device ids whose rollup lookups fail with a query error.
    pub broken_rollups: Vec<i64>,
    unavailable: AtomicBool,
    descriptor_lookups: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(mut self, device: Device) -> Self {
        self.devices.push(device);
        self
    }

    pub fn with_reading(mut self, reading: Reading) -> Self {
        self.readings.insert(reading.device_id(), reading);
        self
    }

    pub fn with_descriptor(mut self, vendor_id: i64, json: &str) -> Self {
        self.descriptors.insert(vendor_id, json.to_string());
        self
    }

    pub fn with_daily(mut self, device_id: i64, dt: Date, value: f64) -> Self {
        self.daily.push(DailyConsumption { device_id, dt, value });
        self
    }

    pub fn with_today(mut self, device_id: i64, dt: PrimitiveDateTime, value: f64) -> Self {
        self.today.push(TodayConsumption { device_id, dt, value });
        self
    }

    pub fn set_unavailable(&self, down: bool) {
        self.unavailable.store(down, Ordering::SeqCst);
    }

    pub fn descriptor_lookups(&self) -> usize {
        self.descriptor_lookups.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("connection refused".to_string()))
        } else {
            Ok(())
        }
    }

    fn check_rollup(&self, device_id: i64) -> Result<(), StoreError> {
        if self.broken_rollups.contains(&device_id) {
            Err(StoreError::Query("cannot decode rollup row".to_string()))
        } else {
            Ok(())
        }
    }
}

pub fn device(id: i64, class: DeviceClass, active: bool) -> Device {
    Device {
        id,
        name: Some(format!("Meter {id}")),
        vendor_id: None,
        class,
        site_id: 1,
        site_name: Some("Main building".to_string()),
        active,
        sort_id: Some(id),
    }
}

#[async_trait::async_trait]
impl DeviceDirectory for InMemoryStore {
    async fn list_devices(&self) -> Result<Vec<Device>, StoreError> {
        self.check()?;
        Ok(self.devices.clone())
    }

    async fn vendor_descriptor(&self, vendor_id: i64) -> Result<Option<String>, StoreError> {
        self.check()?;
        self.descriptor_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.descriptors.get(&vendor_id).cloned())
    }

    async fn average_scan_interval(&self) -> Result<Option<Duration>, StoreError> {
        self.check()?;
        Ok(self.scan_interval)
    }
}

#[async_trait::async_trait]
impl ReadingStore for InMemoryStore {
    async fn latest_reading(
        &self,
        device_id: i64,
        class: DeviceClass,
    ) -> Result<Option<Reading>, StoreError> {
        self.check()?;
        if self.broken_readings.contains(&device_id) {
            return Err(StoreError::Query(format!("cannot decode reading of {device_id}")));
        }
        Ok(self
            .readings
            .get(&device_id)
            .filter(|r| r.class() == class)
            .cloned())
    }
}

#[async_trait::async_trait]
impl RollupStore for InMemoryStore {
    async fn daily_values(
        &self,
        device_id: i64,
        range: DateRange,
    ) -> Result<Vec<(Date, f64)>, StoreError> {
        self.check()?;
        self.check_rollup(device_id)?;
        Ok(self
            .daily
            .iter()
            .filter(|r| r.device_id == device_id && range.contains(r.dt))
            .map(|r| (r.dt, r.value))
            .collect())
    }

    async fn latest_today_value(
        &self,
        device_id: i64,
        as_of: PrimitiveDateTime,
    ) -> Result<Option<f64>, StoreError> {
        self.check()?;
        self.check_rollup(device_id)?;
        Ok(self
            .today
            .iter()
            .filter(|r| r.device_id == device_id && r.dt.date() == as_of.date() && r.dt <= as_of)
            .max_by_key(|r| r.dt)
            .map(|r| r.value))
    }
}
