//! Static per-class field tables.
//!
//! Each entry ties a wire code (`UL1N`, `PSum`, ...) to the plate info column
//! key, an accessor into the typed reading and its display metadata.

use meter_client::domain::{DeviceClass, ElectricityValues, GasValues};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayMeta<'a> {
    pub full_label: &'a str,
    pub short_label: &'a str,
    pub unit: &'a str,
    pub decimal_digits: u8,
}

pub struct FieldDef<R: 'static> {
    pub code: &'static str,
    /// Snake-case key used by plate info descriptors.
    pub column: &'static str,
    pub meta: DisplayMeta<'static>,
    pub read: fn(&R) -> Option<f64>,
}

/// Typed reading values with a compile-time field table.
pub trait FieldTable: Sized + 'static {
    const CLASS: DeviceClass;

    fn fields() -> &'static [FieldDef<Self>];

    fn by_column(column: &str) -> Option<&'static FieldDef<Self>> {
        let column = column.trim();
        Self::fields()
            .iter()
            .find(|f| f.column.eq_ignore_ascii_case(column))
    }

    fn by_code(code: &str) -> Option<&'static FieldDef<Self>> {
        Self::fields().iter().find(|f| f.code == code)
    }
}

macro_rules! field {
    ($code:literal, $column:literal, $attr:ident, $label:literal, $short:literal, $unit:literal, $digits:literal) => {
        FieldDef {
            code: $code,
            column: $column,
            meta: DisplayMeta {
                full_label: $label,
                short_label: $short,
                unit: $unit,
                decimal_digits: $digits,
            },
            read: |r| r.$attr,
        }
    };
}

static ELECTRICAL_FIELDS: &[FieldDef<ElectricityValues>] = &[
    field!("UL1N", "u_l1_n", u_l1_n, "Voltage L1-N", "U L1-N", "V", 1),
    field!("UL2N", "u_l2_n", u_l2_n, "Voltage L2-N", "U L2-N", "V", 1),
    field!("UL3N", "u_l3_n", u_l3_n, "Voltage L3-N", "U L3-N", "V", 1),
    field!("UL1L2", "u_l1_l2", u_l1_l2, "Voltage L1-L2", "U L1-L2", "V", 1),
    field!("UL2L3", "u_l2_l3", u_l2_l3, "Voltage L2-L3", "U L2-L3", "V", 1),
    field!("UL3L1", "u_l3_l1", u_l3_l1, "Voltage L3-L1", "U L3-L1", "V", 1),
    field!("IL1", "i_l1", i_l1, "Phase L1 current", "I L1", "A", 1),
    field!("IL2", "i_l2", i_l2, "Phase L2 current", "I L2", "A", 1),
    field!("IL3", "i_l3", i_l3, "Phase L3 current", "I L3", "A", 1),
    field!("PL1", "p_l1", p_l1, "Active power L1", "P L1", "kW", 1),
    field!("PL2", "p_l2", p_l2, "Active power L2", "P L2", "kW", 1),
    field!("PL3", "p_l3", p_l3, "Active power L3", "P L3", "kW", 1),
    field!("PSum", "p_sum", p_sum, "Total active power", "P Σ", "kW", 1),
    field!("QL1", "q_l1", q_l1, "Reactive power L1", "Q L1", "kvar", 1),
    field!("QL2", "q_l2", q_l2, "Reactive power L2", "Q L2", "kvar", 1),
    field!("QL3", "q_l3", q_l3, "Reactive power L3", "Q L3", "kvar", 1),
    field!("QSum", "q_sum", q_sum, "Total reactive power", "Q Σ", "kvar", 1),
    field!("AllEnergy", "all_energy", all_energy, "Active energy (total)", "E act.", "kWh", 0),
    field!("ReactiveEnergySum", "reactive_energy_sum", reactive_energy_sum, "Reactive energy (total)", "E react.", "kvarh", 0),
    field!("Freq", "freq", freq, "Frequency", "f", "Hz", 2),
    field!("Aq1", "aq1", aq_1, "Apparent power L1", "S L1", "kVA", 1),
    field!("Aq2", "aq2", aq_2, "Apparent power L2", "S L2", "kVA", 1),
    field!("Aq3", "aq3", aq_3, "Apparent power L3", "S L3", "kVA", 1),
    field!("FundPfCf1", "fund_pf_cf1", fund_pf_cf1, "Power factor L1", "cos φ L1", "", 2),
    field!("FundPfCf2", "fund_pf_cf2", fund_pf_cf2, "Power factor L2", "cos φ L2", "", 2),
    field!("FundPfCf3", "fund_pf_cf3", fund_pf_cf3, "Power factor L3", "cos φ L3", "", 2),
    field!("RotationField", "rotation_field", rotation_field, "Rotation field", "Rot. field", "", 2),
    field!("RqcL1", "rqc_l1", rqc_l1, "Real energy consumed L1", "E cons. L1", "kWh", 0),
    field!("RqcL2", "rqc_l2", rqc_l2, "Real energy consumed L2", "E cons. L2", "kWh", 0),
    field!("RqcL3", "rqc_l3", rqc_l3, "Real energy consumed L3", "E cons. L3", "kWh", 0),
    field!("RqdL1", "rqd_l1", rqd_l1, "Real energy delivered L1", "E deliv. L1", "kWh", 0),
    field!("RqdL2", "rqd_l2", rqd_l2, "Real energy delivered L2", "E deliv. L2", "kWh", 0),
    field!("RqdL3", "rqd_l3", rqd_l3, "Real energy delivered L3", "E deliv. L3", "kWh", 0),
    field!("ReactQIL1", "react_qi_l1", react_q_i_l1, "Reactive inductive energy L1", "Q ind. L1", "kvarh", 0),
    field!("ReactQIL2", "react_qi_l2", react_q_i_l2, "Reactive inductive energy L2", "Q ind. L2", "kvarh", 0),
    field!("ReactQIL3", "react_qi_l3", react_q_i_l3, "Reactive inductive energy L3", "Q ind. L3", "kvarh", 0),
    field!("ReactQCL1", "react_qc_l1", react_q_c_l1, "Reactive capacitive energy L1", "Q cap. L1", "kvarh", 0),
    field!("ReactQCL2", "react_qc_l2", react_q_c_l2, "Reactive capacitive energy L2", "Q cap. L2", "kvarh", 0),
    field!("ReactQCL3", "react_qc_l3", react_q_c_l3, "Reactive capacitive energy L3", "Q cap. L3", "kvarh", 0),
    field!("HUL1", "h_u_l1", h_u_l1, "Voltage THD L1", "THD U L1", "%", 2),
    field!("HUL2", "h_u_l2", h_u_l2, "Voltage THD L2", "THD U L2", "%", 2),
    field!("HUL3", "h_u_l3", h_u_l3, "Voltage THD L3", "THD U L3", "%", 2),
    field!("HIL1", "h_i_l1", h_i_l1, "Current THD L1", "THD I L1", "%", 2),
    field!("HIL2", "h_i_l2", h_i_l2, "Current THD L2", "THD I L2", "%", 2),
    field!("HIL3", "h_i_l3", h_i_l3, "Current THD L3", "THD I L3", "%", 2),
    field!("Angle1", "angle1", angle_1, "Phase voltage angle 1", "Angle 1", "°", 2),
    field!("Angle2", "angle2", angle_2, "Phase voltage angle 2", "Angle 2", "°", 2),
    field!("Angle3", "angle3", angle_3, "Phase voltage angle 3", "Angle 3", "°", 2),
    field!("AllEnergyK", "all_energy_k", all_energy_k, "Energy incl. transformer ratio", "E w/ ratio", "kWh", 0),
];

static GAS_FIELDS: &[FieldDef<GasValues>] = &[
    field!("TemperatureGas", "temperature_gas", temperature_gas, "Gas temperature", "T gas", "°C", 2),
    field!("WorkingVolume", "working_volume", working_volume, "Working volume", "V work", "m³", 2),
    field!("StandardVolume", "standard_volume", standard_volume, "Standard volume", "V std", "m³", 2),
    field!("InstantaneousFlow", "instantaneous_flow", instantaneous_flow, "Instantaneous flow", "Q inst.", "m³/h", 2),
    field!("BatteryLive", "battery_live", battery_live, "Battery life remaining", "Battery", "", 2),
    field!("PressureGas", "pressure_gas", pressure_gas, "Gas inlet pressure", "P gas", "", 2),
    field!("Power", "power", power, "Power", "Power", "kW", 2),
];

impl FieldTable for ElectricityValues {
    const CLASS: DeviceClass = DeviceClass::Electrical;

    fn fields() -> &'static [FieldDef<Self>] {
        ELECTRICAL_FIELDS
    }
}

impl FieldTable for GasValues {
    const CLASS: DeviceClass = DeviceClass::Gas;

    fn fields() -> &'static [FieldDef<Self>] {
        GAS_FIELDS
    }
}

/// Field code for a plate info column key, or `None` when the key is not a
/// numeric field of that device class.
pub fn map_column_to_field(column: &str, class: DeviceClass) -> Option<&'static str> {
    match class {
        DeviceClass::Electrical => ElectricityValues::by_column(column).map(|f| f.code),
        DeviceClass::Gas => GasValues::by_column(column).map(|f| f.code),
        DeviceClass::Other => None,
    }
}

pub fn display_meta(code: &str) -> DisplayMeta<'_> {
    ElectricityValues::by_code(code)
        .map(|f| f.meta)
        .or_else(|| GasValues::by_code(code).map(|f| f.meta))
        .unwrap_or(DisplayMeta {
            full_label: code,
            short_label: code,
            unit: "",
            decimal_digits: 2,
        })
}

/// Scales a stored value into its display unit. Readings are stored in
/// display units for every field today.
pub fn convert_for_display(value: f64, _code: &str) -> f64 {
    value
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn all_codes() -> Vec<&'static str> {
        ElectricityValues::fields()
            .iter()
            .map(|f| f.code)
            .chain(GasValues::fields().iter().map(|f| f.code))
            .collect()
    }

    #[test]
    fn codes_and_columns_are_unique() {
        let codes: HashSet<_> = all_codes().into_iter().collect();
        assert_eq!(codes.len(), 49 + 7);

        let columns: HashSet<_> = ElectricityValues::fields()
            .iter()
            .map(|f| f.column)
            .chain(GasValues::fields().iter().map(|f| f.column))
            .collect();
        assert_eq!(columns.len(), 49 + 7);
    }

    #[test]
    fn columns_map_within_their_class_only() {
        assert_eq!(map_column_to_field("i_l1", DeviceClass::Electrical), Some("IL1"));
        assert_eq!(map_column_to_field("react_qc_l2", DeviceClass::Electrical), Some("ReactQCL2"));
        assert_eq!(map_column_to_field("Q_L1", DeviceClass::Electrical), Some("QL1"));
        assert_eq!(map_column_to_field("working_volume", DeviceClass::Gas), Some("WorkingVolume"));

        assert_eq!(map_column_to_field("working_volume", DeviceClass::Electrical), None);
        assert_eq!(map_column_to_field("i_l1", DeviceClass::Gas), None);
        assert_eq!(map_column_to_field("time_reading", DeviceClass::Gas), None);
        assert_eq!(map_column_to_field("no_such_column", DeviceClass::Electrical), None);
        assert_eq!(map_column_to_field("i_l1", DeviceClass::Other), None);
    }

    #[test]
    fn accessors_read_their_own_column() {
        let values = ElectricityValues {
            angle_2: Some(120.0),
            ..Default::default()
        };
        let def = ElectricityValues::by_column("angle2").expect("angle2 is a known column");
        assert_eq!((def.read)(&values), Some(120.0));
        let other = ElectricityValues::by_column("angle1").expect("angle1 is a known column");
        assert_eq!((other.read)(&values), None);
    }

    #[test]
    fn display_meta_for_known_and_unknown_fields() {
        let voltage = display_meta("UL1N");
        assert_eq!(voltage.unit, "V");
        assert_eq!(voltage.decimal_digits, 1);

        let energy = display_meta("AllEnergy");
        assert_eq!(energy.decimal_digits, 0);

        let gas = display_meta("WorkingVolume");
        assert_eq!(gas.unit, "m³");

        let unknown = display_meta("Mystery");
        assert_eq!(
            unknown,
            DisplayMeta {
                full_label: "Mystery",
                short_label: "Mystery",
                unit: "",
                decimal_digits: 2,
            }
        );
    }

    #[test]
    fn convert_for_display_is_identity_for_every_field() {
        for code in all_codes() {
            for v in [0.0, 1.5, -3.25, 12345.678] {
                assert_eq!(convert_for_display(v, code), v, "field {code}");
            }
        }
    }
}
