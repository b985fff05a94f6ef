//! Payloads pushed to dashboard clients. Field names follow the event
//! contracts the clients already consume.

use meter_client::domain::Device;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusColor {
    Green,
    Red,
}

impl StatusColor {
    pub fn for_device(device: &Device) -> Self {
        if device.active {
            Self::Green
        } else {
            Self::Red
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterValue {
    pub parameter_name: String,
    pub parameter_short_name: String,
    pub parameter_code: String,
    pub value: f64,
    pub unit: String,
    pub has_value: bool,
}

/// One entry of the `DeviceDataUpdate` payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSnapshot {
    pub device_id: i64,
    pub device_name: Option<String>,
    pub object_name: Option<String>,
    pub status_color: StatusColor,
    pub sort_id: Option<i64>,
    pub parameters: Vec<ParameterValue>,
}

impl DeviceSnapshot {
    pub fn new(device: &Device, parameters: Vec<ParameterValue>) -> Self {
        Self {
            device_id: device.id,
            device_name: device.name.clone(),
            object_name: device.site_name.clone(),
            status_color: StatusColor::for_device(device),
            sort_id: device.sort_id,
            parameters,
        }
    }
}

/// One entry of the `UpdateConsumptionToday` payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteConsumptionToday {
    pub site_name: String,
    pub electricity_consumption: f64,
    pub gas_consumption: f64,
}

pub(crate) fn round_to(value: f64, digits: u8) -> f64 {
    let factor = 10f64.powi(i32::from(digits));
    let rounded = (value * factor).round() / factor;
    if rounded.is_finite() {
        rounded
    } else {
        value
    }
}
