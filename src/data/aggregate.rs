use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;

use super::types::{AggregateOp, GroupField, NumericField, SaleRecord};

/// A value contributes to a sum/average/median only when it is a finite
/// number greater than zero. Failing records are dropped from that aggregate
/// alone, never from the dataset.
pub fn usable(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Partition a subset by a key, preserving the insertion order of first
/// appearance. Keys are whatever case-sensitive strings the data carries.
fn partition<'a, K>(subset: &[&'a SaleRecord], key: K) -> Vec<(String, Vec<&'a SaleRecord>)>
where
    K: Fn(&SaleRecord) -> String,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<&SaleRecord>)> = Vec::new();

    for &record in subset {
        let label = key(record);
        match index.get(&label) {
            Some(&slot) => groups[slot].1.push(record),
            None => {
                index.insert(label.clone(), groups.len());
                groups.push((label, vec![record]));
            }
        }
    }

    groups
}

fn guarded_values(records: &[&SaleRecord], field: NumericField) -> Vec<f64> {
    records
        .iter()
        .map(|record| field.get(record))
        .filter(|value| usable(*value))
        .collect()
}

/// Median of an ascending-sorted sequence: the middle element for odd
/// lengths, the mean of the two central elements for even lengths.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mid = sorted.len() / 2;
    if sorted.len() % 2 != 0 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    }
}

/// Per-town sale summary backing the primary bar chart. A town with no usable
/// sale amounts is excluded entirely so the derived average never divides by
/// zero. Output keeps first-appearance order.
#[derive(Debug, Clone, PartialEq)]
pub struct TownSummary {
    pub town: String,
    pub count: usize,
    pub total_sale_amount: f64,
    pub avg_sale_amount: f64,
}

pub fn town_sale_summary(subset: &[&SaleRecord]) -> Vec<TownSummary> {
    partition(subset, |record| record.town.clone())
        .into_iter()
        .filter_map(|(town, records)| {
            let values = guarded_values(&records, NumericField::SaleAmount);
            if values.is_empty() {
                return None;
            }
            let total: f64 = values.iter().sum();
            Some(TownSummary {
                town,
                count: values.len(),
                total_sale_amount: total,
                avg_sale_amount: total / values.len() as f64,
            })
        })
        .collect()
}

/// Per-property-type summary backing the secondary bar chart. `count` is the
/// number of sales in the group; the money measures average over usable
/// values only. Sorted descending by count; ties keep encounter order.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyTypeSummary {
    pub property_type: String,
    pub count: usize,
    pub total_sale_amount: f64,
    pub avg_sale_amount: Option<f64>,
    pub total_assessed_value: f64,
    pub avg_assessed_value: Option<f64>,
}

pub fn property_type_summary(subset: &[&SaleRecord]) -> Vec<PropertyTypeSummary> {
    let mut summaries: Vec<PropertyTypeSummary> =
        partition(subset, |record| record.property_type.clone())
            .into_iter()
            .map(|(property_type, records)| {
                let sales = guarded_values(&records, NumericField::SaleAmount);
                let assessed = guarded_values(&records, NumericField::AssessedValue);
                let total_sale: f64 = sales.iter().sum();
                let total_assessed: f64 = assessed.iter().sum();
                PropertyTypeSummary {
                    property_type,
                    count: records.len(),
                    total_sale_amount: total_sale,
                    avg_sale_amount: (!sales.is_empty())
                        .then(|| total_sale / sales.len() as f64),
                    total_assessed_value: total_assessed,
                    avg_assessed_value: (!assessed.is_empty())
                        .then(|| total_assessed / assessed.len() as f64),
                }
            })
            .collect();

    // Vec::sort_by is stable, so equal counts retain encounter order.
    summaries.sort_by(|a, b| b.count.cmp(&a.count));
    summaries
}

/// Sales count per list year, ascending by year (numeric, not lexicographic).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearlyCount {
    pub year: i32,
    pub count: usize,
}

pub fn yearly_sales_counts(subset: &[&SaleRecord]) -> Vec<YearlyCount> {
    let mut counts: Vec<YearlyCount> = partition(subset, |record| record.list_year.to_string())
        .into_iter()
        .map(|(year, records)| YearlyCount {
            year: year.parse().unwrap_or_default(),
            count: records.len(),
        })
        .collect();

    counts.sort_by_key(|entry| entry.year);
    counts
}

const PRICE_BANDS: &[(f64, Option<f64>, &str)] = &[
    (0.0, Some(250_000.0), "0 - 250k"),
    (250_000.0, Some(500_000.0), "250k - 500k"),
    (500_000.0, Some(750_000.0), "500k - 750k"),
    (750_000.0, Some(1_000_000.0), "750k - 1M"),
    (1_000_000.0, None, "1M+"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceBucket {
    pub label: &'static str,
    pub count: usize,
}

/// Distribution over five fixed half-open sale-amount bands, ascending by
/// lower bound. Bands with zero records are omitted, not emitted as zero.
pub fn price_bucket_distribution(subset: &[&SaleRecord]) -> Vec<PriceBucket> {
    let mut counts = [0usize; 5];

    for record in subset {
        let amount = record.sale_amount;
        if !amount.is_finite() || amount < 0.0 {
            continue;
        }
        for (slot, (lower, upper, _)) in PRICE_BANDS.iter().enumerate() {
            let in_band = amount >= *lower && upper.map_or(true, |cap| amount < cap);
            if in_band {
                counts[slot] += 1;
                break;
            }
        }
    }

    PRICE_BANDS
        .iter()
        .zip(counts)
        .filter(|(_, count)| *count > 0)
        .map(|(&(_, _, label), count)| PriceBucket { label, count })
        .collect()
}

/// Field selection for the two bar-chart slots: aggregated measures produce a
/// grouped series, raw measures pass the filtered subset through unreduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartField {
    AvgSaleAmount,
    AvgAssessedValue,
    TotalSaleAmount,
    SalesCount,
    SaleAmount,
    AssessedValue,
}

impl ChartField {
    pub fn is_raw(&self) -> bool {
        matches!(self, ChartField::SaleAmount | ChartField::AssessedValue)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChartField::AvgSaleAmount => "avg_sale_amount",
            ChartField::AvgAssessedValue => "avg_assessed_value",
            ChartField::TotalSaleAmount => "total_sale_amount",
            ChartField::SalesCount => "count",
            ChartField::SaleAmount => "sale_amount",
            ChartField::AssessedValue => "assessed_value",
        }
    }
}

impl fmt::Display for ChartField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ChartField {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "avg_sale_amount" => Ok(ChartField::AvgSaleAmount),
            "avg_assessed_value" => Ok(ChartField::AvgAssessedValue),
            "total_sale_amount" => Ok(ChartField::TotalSaleAmount),
            "count" => Ok(ChartField::SalesCount),
            "sale_amount" => Ok(ChartField::SaleAmount),
            "assessed_value" => Ok(ChartField::AssessedValue),
            other => Err(anyhow!(
                "unknown display field '{other}'; expected one of avg_sale_amount, avg_assessed_value, total_sale_amount, count, sale_amount, assessed_value"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DisplaySeries {
    Grouped(Vec<(String, f64)>),
    Raw(Vec<f64>),
}

impl DisplaySeries {
    pub fn is_empty(&self) -> bool {
        match self {
            DisplaySeries::Grouped(rows) => rows.is_empty(),
            DisplaySeries::Raw(values) => values.is_empty(),
        }
    }
}

/// The shared entry point behind a bar chart's field selection. An empty
/// subset short-circuits to an empty series before any division is attempted.
pub fn display_series(
    subset: &[&SaleRecord],
    group: GroupField,
    field: ChartField,
) -> DisplaySeries {
    if subset.is_empty() {
        return if field.is_raw() {
            DisplaySeries::Raw(Vec::new())
        } else {
            DisplaySeries::Grouped(Vec::new())
        };
    }

    match field {
        ChartField::SaleAmount => {
            DisplaySeries::Raw(guarded_values(subset, NumericField::SaleAmount))
        }
        ChartField::AssessedValue => {
            DisplaySeries::Raw(guarded_values(subset, NumericField::AssessedValue))
        }
        ChartField::SalesCount => DisplaySeries::Grouped(
            partition(subset, |record| group.key(record))
                .into_iter()
                .map(|(label, records)| (label, records.len() as f64))
                .collect(),
        ),
        ChartField::AvgSaleAmount | ChartField::AvgAssessedValue | ChartField::TotalSaleAmount => {
            let numeric = match field {
                ChartField::AvgAssessedValue => NumericField::AssessedValue,
                _ => NumericField::SaleAmount,
            };
            let rows = partition(subset, |record| group.key(record))
                .into_iter()
                .filter_map(|(label, records)| {
                    let values = guarded_values(&records, numeric);
                    if values.is_empty() {
                        return None;
                    }
                    let total: f64 = values.iter().sum();
                    let measure = match field {
                        ChartField::TotalSaleAmount => total,
                        _ => total / values.len() as f64,
                    };
                    Some((label, measure))
                })
                .collect();
            DisplaySeries::Grouped(rows)
        }
    }
}

/// Outcome of the generic aggregate behind the calculateAggregate tool.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregateOutcome {
    /// The working subset was empty; nothing was computed.
    Empty,
    /// The target field held no usable numeric values after the guard.
    NoNumericData,
    Scalar(f64),
    Grouped(Vec<(String, f64)>),
}

pub fn aggregate(
    subset: &[&SaleRecord],
    field: NumericField,
    op: AggregateOp,
    group_by: Option<GroupField>,
) -> AggregateOutcome {
    if subset.is_empty() {
        return AggregateOutcome::Empty;
    }

    let Some(group) = group_by else {
        if op == AggregateOp::Count {
            return AggregateOutcome::Scalar(subset.len() as f64);
        }
        let values = guarded_values(subset, field);
        return match reduce(&values, op) {
            Some(value) => AggregateOutcome::Scalar(value),
            None => AggregateOutcome::NoNumericData,
        };
    };

    let mut rows: Vec<(String, f64)> = partition(subset, |record| group.key(record))
        .into_iter()
        .filter_map(|(label, records)| {
            if op == AggregateOp::Count {
                return Some((label, records.len() as f64));
            }
            let values = guarded_values(&records, field);
            // Skip groups whose guarded value list is empty; a 0/0 average
            // must never be reported as 0.
            reduce(&values, op).map(|value| (label, value))
        })
        .collect();

    if group == GroupField::ListYear {
        rows.sort_by_key(|(label, _)| label.parse::<i32>().unwrap_or_default());
    }

    if rows.is_empty() {
        AggregateOutcome::NoNumericData
    } else {
        AggregateOutcome::Grouped(rows)
    }
}

fn reduce(values: &[f64], op: AggregateOp) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    match op {
        AggregateOp::Average => Some(values.iter().sum::<f64>() / values.len() as f64),
        AggregateOp::Sum => Some(values.iter().sum()),
        AggregateOp::Count => Some(values.len() as f64),
        AggregateOp::Median => median(values),
    }
}

/// Distinct values in first-appearance order; feeds the assistant's context
/// block and the filter UI.
pub fn distinct_towns(records: &[SaleRecord]) -> Vec<String> {
    distinct(records, |record| record.town.clone())
}

pub fn distinct_property_types(records: &[SaleRecord]) -> Vec<String> {
    distinct(records, |record| record.property_type.clone())
}

fn distinct<K>(records: &[SaleRecord], key: K) -> Vec<String>
where
    K: Fn(&SaleRecord) -> String,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for record in records {
        let label = key(record);
        if seen.insert(label.clone()) {
            out.push(label);
        }
    }
    out
}
