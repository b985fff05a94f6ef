use serde::Deserialize;

/// One display entry of a vendor model's plate info.
#[derive(Debug, Clone, PartialEq)]
pub struct PlateEntry {
    pub column: String,
    pub label: Option<String>,
    pub decimal_digits: Option<u8>,
}

/// Validated plate info descriptor: the ordered allow-list of columns a
/// vendor model exposes, with optional label and precision overrides.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlateInfo {
    entries: Vec<PlateEntry>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDigit {
    Number(u64),
    Text(String),
}

#[derive(Deserialize)]
struct RawPlateField {
    #[serde(rename = "Label", alias = "label", default)]
    label: Option<String>,
    #[serde(rename = "Digit", alias = "digit", default)]
    digit: Option<RawDigit>,
}

const MAX_DECIMAL_DIGITS: u64 = 10;

impl RawDigit {
    fn digits(&self) -> Option<u8> {
        let n = match self {
            Self::Number(n) => *n,
            Self::Text(s) => s.trim().parse().ok()?,
        };
        (n <= MAX_DECIMAL_DIGITS).then_some(n as u8)
    }
}

impl PlateInfo {
    /// Parses the `plate_info` JSON object. Anything that is not an object of
    /// `{ "<column>": { "Label": .., "Digit": .. } }` entries yields `None`.
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
        let object: serde_json::Map<String, serde_json::Value> = serde_json::from_str(raw).ok()?;

        let mut entries = Vec::with_capacity(object.len());
        for (column, value) in object {
            let field: RawPlateField = serde_json::from_value(value).ok()?;
            entries.push(PlateEntry {
                column,
                label: field.label.filter(|l| !l.trim().is_empty()),
                decimal_digits: field.digit.as_ref().and_then(RawDigit::digits),
            });
        }

        Some(Self { entries })
    }

    pub fn entries(&self) -> &[PlateEntry] {
        &self.entries
    }

    pub fn columns(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.column.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_document_order() {
        let plate = PlateInfo::parse(Some(
            r#"{
                "p_sum": {"Label": "Load", "Digit": "1"},
                "i_l1": {"Label": "", "Digit": "3"},
                "all_energy": {"Label": "Meter total"}
            }"#,
        ))
        .expect("valid plate info");

        assert_eq!(plate.columns(), vec!["p_sum", "i_l1", "all_energy"]);
        assert_eq!(plate.entries()[0].label.as_deref(), Some("Load"));
        assert_eq!(plate.entries()[0].decimal_digits, Some(1));
        assert_eq!(plate.entries()[1].label, None);
        assert_eq!(plate.entries()[1].decimal_digits, Some(3));
        assert_eq!(plate.entries()[2].decimal_digits, None);
    }

    #[test]
    fn accepts_numeric_and_lowercase_keys() {
        let plate = PlateInfo::parse(Some(r#"{"freq": {"label": "Grid", "digit": 2}}"#))
            .expect("valid plate info");
        assert_eq!(plate.entries()[0].label.as_deref(), Some("Grid"));
        assert_eq!(plate.entries()[0].decimal_digits, Some(2));
    }

    #[test]
    fn unusable_digits_fall_back_to_defaults() {
        let plate = PlateInfo::parse(Some(r#"{"freq": {"Digit": "two"}, "i_l1": {"Digit": 99}}"#))
            .expect("valid plate info");
        assert!(plate.entries().iter().all(|e| e.decimal_digits.is_none()));
    }

    #[test]
    fn malformed_or_missing_json_is_absent() {
        assert_eq!(PlateInfo::parse(None), None);
        assert_eq!(PlateInfo::parse(Some("")), None);
        assert_eq!(PlateInfo::parse(Some("{not json")), None);
        assert_eq!(PlateInfo::parse(Some(r#"["i_l1", "i_l2"]"#)), None);
        assert_eq!(PlateInfo::parse(Some("null")), None);
        assert_eq!(PlateInfo::parse(Some(r#"{"i_l1": "Current"}"#)), None);
    }

    #[test]
    fn empty_object_is_an_empty_allow_list() {
        let plate = PlateInfo::parse(Some("{}")).expect("empty object parses");
        assert!(plate.is_empty());
    }
}
