pub mod consumption;
pub mod device;
pub mod reading;

pub use consumption::{DailyConsumption, DateRange, TodayConsumption};
pub use device::{Device, DeviceClass, DeviceRow};
pub use reading::{ElectricityReading, ElectricityValues, GasReading, GasValues, Reading};
