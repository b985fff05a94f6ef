use time::PrimitiveDateTime;

use super::DeviceClass;

/// Latest values of an electrical meter (`electricity_device_data`).
///
/// Every column is optional: the ingestion pipeline leaves fields the meter
/// does not report as `NULL`.
#[derive(Debug, Clone, Default, PartialEq, sqlx::FromRow)]
pub struct ElectricityValues {
    pub u_l1_n: Option<f64>,
    pub u_l2_n: Option<f64>,
    pub u_l3_n: Option<f64>,
    pub u_l1_l2: Option<f64>,
    pub u_l2_l3: Option<f64>,
    pub u_l3_l1: Option<f64>,
    pub i_l1: Option<f64>,
    pub i_l2: Option<f64>,
    pub i_l3: Option<f64>,
    pub p_l1: Option<f64>,
    pub p_l2: Option<f64>,
    pub p_l3: Option<f64>,
    pub p_sum: Option<f64>,
    pub q_l1: Option<f64>,
    pub q_l2: Option<f64>,
    pub q_l3: Option<f64>,
    pub q_sum: Option<f64>,
    pub all_energy: Option<f64>,
    pub reactive_energy_sum: Option<f64>,
    pub freq: Option<f64>,
    pub aq_1: Option<f64>,
    pub aq_2: Option<f64>,
    pub aq_3: Option<f64>,
    pub fund_pf_cf1: Option<f64>,
    pub fund_pf_cf2: Option<f64>,
    pub fund_pf_cf3: Option<f64>,
    pub rotation_field: Option<f64>,
    pub rqc_l1: Option<f64>,
    pub rqc_l2: Option<f64>,
    pub rqc_l3: Option<f64>,
    pub rqd_l1: Option<f64>,
    pub rqd_l2: Option<f64>,
    pub rqd_l3: Option<f64>,
    pub react_q_i_l1: Option<f64>,
    pub react_q_i_l2: Option<f64>,
    pub react_q_i_l3: Option<f64>,
    pub react_q_c_l1: Option<f64>,
    pub react_q_c_l2: Option<f64>,
    pub react_q_c_l3: Option<f64>,
    pub h_u_l1: Option<f64>,
    pub h_u_l2: Option<f64>,
    pub h_u_l3: Option<f64>,
    pub h_i_l1: Option<f64>,
    pub h_i_l2: Option<f64>,
    pub h_i_l3: Option<f64>,
    pub angle_1: Option<f64>,
    pub angle_2: Option<f64>,
    pub angle_3: Option<f64>,
    pub all_energy_k: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ElectricityReading {
    pub device_id: i64,
    pub time_reading: PrimitiveDateTime,
    #[sqlx(flatten)]
    pub values: ElectricityValues,
}

/// Latest values of a gas meter (`gas_device_data`).
#[derive(Debug, Clone, Default, PartialEq, sqlx::FromRow)]
pub struct GasValues {
    pub temperature_gas: Option<f64>,
    pub working_volume: Option<f64>,
    pub standard_volume: Option<f64>,
    pub instantaneous_flow: Option<f64>,
    pub battery_live: Option<f64>,
    pub pressure_gas: Option<f64>,
    pub power: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct GasReading {
    pub device_id: i64,
    pub time_reading: PrimitiveDateTime,
    #[sqlx(flatten)]
    pub values: GasValues,
}

/// A reading tagged by the table it came from.
#[derive(Debug, Clone, PartialEq)]
pub enum Reading {
    Electrical(ElectricityReading),
    Gas(GasReading),
}

impl Reading {
    pub fn device_id(&self) -> i64 {
        match self {
            Self::Electrical(r) => r.device_id,
            Self::Gas(r) => r.device_id,
        }
    }

    pub fn time_reading(&self) -> PrimitiveDateTime {
        match self {
            Self::Electrical(r) => r.time_reading,
            Self::Gas(r) => r.time_reading,
        }
    }

    pub fn class(&self) -> DeviceClass {
        match self {
            Self::Electrical(_) => DeviceClass::Electrical,
            Self::Gas(_) => DeviceClass::Gas,
        }
    }
}
