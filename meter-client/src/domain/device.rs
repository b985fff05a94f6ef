/// Kind of meter, as stored in `device_type.type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceClass {
    Electrical,
    Gas,
    Other,
}

impl DeviceClass {
    pub fn from_type_name(name: Option<&str>) -> Self {
        match name.map(|n| n.trim().to_ascii_lowercase()) {
            Some(n) if n == "electrical" => Self::Electrical,
            Some(n) if n == "gas" => Self::Gas,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Electrical => "electrical",
            Self::Gas => "gas",
            Self::Other => "other",
        }
    }
}

/// Row shape returned by the device listing query.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DeviceRow {
    pub id: i64,
    pub name: Option<String>,
    pub vendor_id: Option<i64>,
    pub device_type: Option<String>,
    pub site_id: i64,
    pub site_name: Option<String>,
    pub active: bool,
    pub sort_id: Option<i64>,
}

/// A meter attached to a site (an `objects` row).
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub id: i64,
    pub name: Option<String>,
    /// Vendor model record holding the plate info descriptor.
    pub vendor_id: Option<i64>,
    pub class: DeviceClass,
    pub site_id: i64,
    pub site_name: Option<String>,
    pub active: bool,
    pub sort_id: Option<i64>,
}

impl From<DeviceRow> for Device {
    fn from(row: DeviceRow) -> Self {
        Device {
            id: row.id,
            name: row.name,
            vendor_id: row.vendor_id,
            class: DeviceClass::from_type_name(row.device_type.as_deref()),
            site_id: row.site_id,
            site_name: row.site_name,
            active: row.active,
            sort_id: row.sort_id,
        }
    }
}
