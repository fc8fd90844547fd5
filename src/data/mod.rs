pub mod aggregate;
pub mod filter;
pub mod mock;
pub mod source;
pub mod types;

pub use aggregate::{
    aggregate, display_series, distinct_property_types, distinct_towns, median,
    price_bucket_distribution, property_type_summary, town_sale_summary, yearly_sales_counts,
    AggregateOutcome, ChartField, DisplaySeries, PriceBucket, PropertyTypeSummary, TownSummary,
    YearlyCount,
};
pub use filter::{apply, FilterState};
pub use source::{load_records_file, parse_records, SalesApiClient, SalesApiConfig};
pub use types::{AggregateOp, GroupField, NumericField, SaleRecord};
