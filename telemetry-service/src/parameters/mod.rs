//! Which telemetry fields a device exposes, and how they are labelled.

use std::{collections::HashMap, sync::Arc, time::Duration};

use meter_client::domain::{DeviceClass, Reading};
use tokio::{sync::RwLock, time::Instant};

use crate::{
    snapshot::{round_to, ParameterValue},
    store::{DeviceDirectory, StoreError},
};

pub mod fields;
pub mod plate_info;

pub use fields::{convert_for_display, display_meta, map_column_to_field, DisplayMeta, FieldTable};
pub use plate_info::{PlateEntry, PlateInfo};

/// Fields shown for an electrical meter without plate info, in order.
pub const ELECTRICAL_PRIORITY: [&str; 6] = ["IL1", "IL2", "IL3", "PSum", "QSum", "AllEnergy"];
pub const ELECTRICAL_FALLBACK_LIMIT: usize = 6;

struct CachedDescriptor {
    loaded_at: Instant,
    plate: Option<Arc<PlateInfo>>,
}

/// Resolves plate info descriptors per vendor model and caches them.
pub struct ParameterResolver {
    ttl: Duration,
    cache: RwLock<HashMap<i64, CachedDescriptor>>,
}

impl ParameterResolver {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Typed descriptor of a vendor model. Missing records and malformed JSON
    /// both resolve to `None` and are cached like valid descriptors.
    pub async fn descriptor<D>(
        &self,
        directory: &D,
        vendor_id: Option<i64>,
    ) -> Result<Option<Arc<PlateInfo>>, StoreError>
    where
        D: DeviceDirectory + ?Sized,
    {
        let Some(vendor_id) = vendor_id else {
            return Ok(None);
        };

        if let Some(hit) = self.cache.read().await.get(&vendor_id) {
            if hit.loaded_at.elapsed() < self.ttl {
                return Ok(hit.plate.clone());
            }
        }

        let raw = directory.vendor_descriptor(vendor_id).await?;
        let plate = PlateInfo::parse(raw.as_deref()).map(Arc::new);
        if raw.is_some() && plate.is_none() {
            tracing::debug!(vendor_id, "plate info is not usable, falling back to default parameters");
        }

        self.cache.write().await.insert(
            vendor_id,
            CachedDescriptor {
                loaded_at: Instant::now(),
                plate: plate.clone(),
            },
        );
        Ok(plate)
    }

    /// Ordered column keys a vendor model allows; empty without a usable descriptor.
    pub async fn resolve_allow_list<D>(
        &self,
        directory: &D,
        vendor_id: Option<i64>,
    ) -> Result<Vec<String>, StoreError>
    where
        D: DeviceDirectory + ?Sized,
    {
        Ok(self
            .descriptor(directory, vendor_id)
            .await?
            .map(|plate| plate.columns())
            .unwrap_or_default())
    }
}

/// Parameters to publish for a device's latest reading.
///
/// A non-empty descriptor is an uncapped allow-list. Without one, electrical
/// meters fall back to a capped priority list and gas meters show every
/// field. Fields without a value are left out.
pub fn resolve_parameters(reading: &Reading, plate: Option<&PlateInfo>) -> Vec<ParameterValue> {
    match reading {
        Reading::Electrical(r) => resolve_values(&r.values, plate),
        Reading::Gas(r) => resolve_values(&r.values, plate),
    }
}

fn resolve_values<R: FieldTable>(values: &R, plate: Option<&PlateInfo>) -> Vec<ParameterValue> {
    match plate.filter(|p| !p.is_empty()) {
        Some(plate) => from_allow_list(values, plate),
        None => from_fallback(values),
    }
}

fn from_allow_list<R: FieldTable>(values: &R, plate: &PlateInfo) -> Vec<ParameterValue> {
    let mut seen: Vec<&'static str> = Vec::with_capacity(plate.entries().len());
    let mut out = Vec::with_capacity(plate.entries().len());

    for entry in plate.entries() {
        let Some(def) = R::by_column(&entry.column) else {
            continue;
        };
        if seen.contains(&def.code) {
            continue;
        }
        seen.push(def.code);

        if let Some(raw) = present((def.read)(values)) {
            out.push(parameter_value(
                def.code,
                raw,
                entry.label.as_deref(),
                entry.decimal_digits,
            ));
        }
    }

    out
}

fn from_fallback<R: FieldTable>(values: &R) -> Vec<ParameterValue> {
    let present_fields = R::fields()
        .iter()
        .filter_map(|def| present((def.read)(values)).map(|v| (def.code, v)));

    match R::CLASS {
        DeviceClass::Electrical => {
            let mut picked: Vec<(&'static str, f64)> = ELECTRICAL_PRIORITY
                .iter()
                .filter_map(|code| {
                    R::by_code(code).and_then(|def| present((def.read)(values)).map(|v| (def.code, v)))
                })
                .collect();

            for (code, v) in present_fields {
                if picked.len() >= ELECTRICAL_FALLBACK_LIMIT {
                    break;
                }
                if !ELECTRICAL_PRIORITY.contains(&code) {
                    picked.push((code, v));
                }
            }
            picked.truncate(ELECTRICAL_FALLBACK_LIMIT);

            picked
                .into_iter()
                .map(|(code, v)| parameter_value(code, v, None, None))
                .collect()
        }
        DeviceClass::Gas | DeviceClass::Other => present_fields
            .map(|(code, v)| parameter_value(code, v, None, None))
            .collect(),
    }
}

fn present(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

fn parameter_value(
    code: &str,
    raw: f64,
    label: Option<&str>,
    digits: Option<u8>,
) -> ParameterValue {
    let meta = display_meta(code);
    let digits = digits.unwrap_or(meta.decimal_digits);

    ParameterValue {
        parameter_name: label.unwrap_or(meta.full_label).to_string(),
        parameter_short_name: meta.short_label.to_string(),
        parameter_code: code.to_string(),
        value: round_to(convert_for_display(raw, code), digits),
        unit: meta.unit.to_string(),
        has_value: true,
    }
}
