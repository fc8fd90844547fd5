use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::NaiveDate;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

/// One recorded real-estate transaction. Immutable once ingested; the working
/// set is only ever filtered and aggregated into derived views.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleRecord {
    #[serde(default)]
    pub serial_number: u64,
    #[serde(default)]
    pub list_year: i32,
    #[serde(default)]
    pub date_recorded: Option<NaiveDate>,
    #[serde(default)]
    pub town: String,
    #[serde(default)]
    pub address: String,
    #[serde(default = "not_a_number", deserialize_with = "lenient_f64")]
    pub assessed_value: f64,
    #[serde(default = "not_a_number", deserialize_with = "lenient_f64")]
    pub sale_amount: f64,
    #[serde(default = "not_a_number", deserialize_with = "lenient_f64")]
    pub sales_ratio: f64,
    #[serde(default)]
    pub property_type: String,
    #[serde(default)]
    pub residential_type: Option<String>,
}

fn not_a_number() -> f64 {
    f64::NAN
}

/// Some deployments of the sales API cast SQL numerics to strings; others emit
/// plain numbers or nulls. Decode all of them, mapping anything unusable to
/// NaN so the aggregation guard drops the value instead of the row.
fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    struct LenientF64;

    impl<'de> Visitor<'de> for LenientF64 {
        type Value = f64;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a number, a numeric string, or null")
        }

        fn visit_f64<E: de::Error>(self, value: f64) -> Result<f64, E> {
            Ok(value)
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<f64, E> {
            Ok(value as f64)
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<f64, E> {
            Ok(value as f64)
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<f64, E> {
            Ok(value.trim().parse().unwrap_or(f64::NAN))
        }

        fn visit_none<E: de::Error>(self) -> Result<f64, E> {
            Ok(f64::NAN)
        }

        fn visit_unit<E: de::Error>(self) -> Result<f64, E> {
            Ok(f64::NAN)
        }
    }

    deserializer.deserialize_any(LenientF64)
}

/// Closed set of fields an aggregate may target. Runtime-supplied field names
/// resolve through `FromStr`; anything outside this enumeration is rejected
/// rather than looked up reflectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericField {
    AssessedValue,
    SaleAmount,
    SalesRatio,
    ListYear,
}

impl NumericField {
    pub fn get(&self, record: &SaleRecord) -> f64 {
        match self {
            NumericField::AssessedValue => record.assessed_value,
            NumericField::SaleAmount => record.sale_amount,
            NumericField::SalesRatio => record.sales_ratio,
            NumericField::ListYear => f64::from(record.list_year),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NumericField::AssessedValue => "assessed_value",
            NumericField::SaleAmount => "sale_amount",
            NumericField::SalesRatio => "sales_ratio",
            NumericField::ListYear => "list_year",
        }
    }
}

impl fmt::Display for NumericField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for NumericField {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "assessed_value" => Ok(NumericField::AssessedValue),
            "sale_amount" => Ok(NumericField::SaleAmount),
            "sales_ratio" => Ok(NumericField::SalesRatio),
            "list_year" => Ok(NumericField::ListYear),
            other => Err(anyhow!(
                "unknown field '{other}'; expected one of assessed_value, sale_amount, sales_ratio, list_year"
            )),
        }
    }
}

/// Closed set of grouping keys for grouped aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupField {
    Town,
    PropertyType,
    ResidentialType,
    ListYear,
}

impl GroupField {
    /// The group label for a record. Keys are whatever case-sensitive strings
    /// appear in the data; no normalization.
    pub fn key(&self, record: &SaleRecord) -> String {
        match self {
            GroupField::Town => record.town.clone(),
            GroupField::PropertyType => record.property_type.clone(),
            GroupField::ResidentialType => record
                .residential_type
                .clone()
                .unwrap_or_else(|| "NA".to_string()),
            GroupField::ListYear => record.list_year.to_string(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GroupField::Town => "town",
            GroupField::PropertyType => "property_type",
            GroupField::ResidentialType => "residential_type",
            GroupField::ListYear => "list_year",
        }
    }
}

impl fmt::Display for GroupField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for GroupField {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "town" => Ok(GroupField::Town),
            "property_type" => Ok(GroupField::PropertyType),
            "residential_type" => Ok(GroupField::ResidentialType),
            "list_year" => Ok(GroupField::ListYear),
            other => Err(anyhow!(
                "unknown group field '{other}'; expected one of town, property_type, residential_type, list_year"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOp {
    Average,
    Sum,
    Count,
    Median,
}

impl AggregateOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateOp::Average => "average",
            AggregateOp::Sum => "sum",
            AggregateOp::Count => "count",
            AggregateOp::Median => "median",
        }
    }

    /// Capitalized form for the first line of grouped output.
    pub fn label(&self) -> &'static str {
        match self {
            AggregateOp::Average => "Average",
            AggregateOp::Sum => "Sum",
            AggregateOp::Count => "Count",
            AggregateOp::Median => "Median",
        }
    }
}

impl fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AggregateOp {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "average" => Ok(AggregateOp::Average),
            "sum" => Ok(AggregateOp::Sum),
            "count" => Ok(AggregateOp::Count),
            "median" => Ok(AggregateOp::Median),
            other => Err(anyhow!(
                "unknown operation '{other}'; expected one of average, sum, count, median"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_decode_from_numbers_and_numeric_strings() {
        let json = r#"[
            {"serial_number": 1, "list_year": 2021, "town": "Danbury",
             "address": "1 Main St", "assessed_value": 250000,
             "sale_amount": "300000.50", "sales_ratio": 0.83,
             "property_type": "Residential", "residential_type": "Condo"},
            {"serial_number": 2, "list_year": 2022, "town": "Bethel",
             "address": "2 Main St", "assessed_value": null,
             "sale_amount": "not a price", "sales_ratio": 1.1,
             "property_type": "Commercial"}
        ]"#;

        let records: Vec<SaleRecord> = serde_json::from_str(json).expect("decode records");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].sale_amount, 300000.50);
        assert_eq!(records[0].residential_type.as_deref(), Some("Condo"));
        assert!(records[1].assessed_value.is_nan());
        assert!(records[1].sale_amount.is_nan());
        assert!(records[1].residential_type.is_none());
    }

    #[test]
    fn numeric_field_rejects_names_outside_the_enumeration() {
        assert!("sale_amount".parse::<NumericField>().is_ok());
        let err = "town".parse::<NumericField>().expect_err("not numeric");
        assert!(err.to_string().contains("unknown field 'town'"));
    }

    #[test]
    fn group_field_key_falls_back_for_missing_residential_type() {
        let record: SaleRecord = serde_json::from_str(
            r#"{"serial_number": 3, "list_year": 2020, "town": "Sherman",
                "address": "3 Main St", "assessed_value": 1, "sale_amount": 1,
                "sales_ratio": 1, "property_type": "Vacant Land"}"#,
        )
        .expect("decode record");

        assert_eq!(GroupField::ResidentialType.key(&record), "NA");
        assert_eq!(GroupField::ListYear.key(&record), "2020");
    }
}
