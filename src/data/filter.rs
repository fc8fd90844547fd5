use serde::{Deserialize, Serialize};

use super::types::SaleRecord;

/// The active town / property-type selection. An empty list means
/// unrestricted ("All"), never "exclude everything". The dispatcher replaces
/// this wholesale; it is never merged incrementally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    #[serde(default)]
    pub towns: Vec<String>,
    #[serde(default, rename = "propertyTypes")]
    pub property_types: Vec<String>,
}

impl FilterState {
    pub fn new(towns: Vec<String>, property_types: Vec<String>) -> Self {
        Self {
            towns,
            property_types,
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        self.towns.is_empty() && self.property_types.is_empty()
    }

    fn matches(&self, record: &SaleRecord) -> bool {
        let town_ok = self.towns.is_empty() || self.towns.iter().any(|t| *t == record.town);
        let prop_ok = self.property_types.is_empty()
            || self.property_types.iter().any(|p| *p == record.property_type);
        town_ok && prop_ok
    }
}

/// Pure filter pass: the working subset every aggregation consumes. Preserves
/// the original relative order and has no error conditions; malformed numeric
/// values are excluded later by the aggregation guard, not here.
pub fn apply<'a>(records: &'a [SaleRecord], filter: &FilterState) -> Vec<&'a SaleRecord> {
    records
        .iter()
        .filter(|record| filter.matches(record))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::mock::sample_records;

    #[test]
    fn empty_filter_passes_everything_in_order() {
        let records = sample_records();
        let subset = apply(&records, &FilterState::default());

        assert_eq!(subset.len(), records.len());
        let serials: Vec<u64> = subset.iter().map(|r| r.serial_number).collect();
        let expected: Vec<u64> = records.iter().map(|r| r.serial_number).collect();
        assert_eq!(serials, expected);
    }

    #[test]
    fn town_filter_keeps_exactly_the_matching_records() {
        let records = sample_records();
        let filter = FilterState::new(vec!["Danbury".to_string()], Vec::new());
        let subset = apply(&records, &filter);

        assert!(!subset.is_empty());
        assert!(subset.iter().all(|r| r.town == "Danbury"));
        let expected = records.iter().filter(|r| r.town == "Danbury").count();
        assert_eq!(subset.len(), expected);
    }

    #[test]
    fn both_dimensions_must_match() {
        let records = sample_records();
        let filter = FilterState::new(
            vec!["Danbury".to_string(), "Bethel".to_string()],
            vec!["Residential".to_string()],
        );
        let subset = apply(&records, &filter);

        assert!(subset
            .iter()
            .all(|r| (r.town == "Danbury" || r.town == "Bethel")
                && r.property_type == "Residential"));
    }

    #[test]
    fn filter_args_decode_with_camel_case_property_types() {
        let filter: FilterState =
            serde_json::from_str(r#"{"towns": ["Sherman"], "propertyTypes": ["Commercial"]}"#)
                .expect("decode filter");
        assert_eq!(filter.towns, vec!["Sherman".to_string()]);
        assert_eq!(filter.property_types, vec!["Commercial".to_string()]);
    }
}
