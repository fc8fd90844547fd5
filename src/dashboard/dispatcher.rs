use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::data::{
    aggregate, apply, display_series, AggregateOp, AggregateOutcome, ChartField, DisplaySeries,
    FilterState, GroupField, NumericField, SaleRecord,
};

use super::state::{ChartName, ChartSize, DashboardState};

/// Routes named operations from the assistant (or direct UI actions) to their
/// handlers. Every path returns a human-readable string; unknown operations
/// and malformed arguments become error text, never an `Err` or a panic, so
/// the conversational loop always has something to relay.
pub struct ToolDispatcher {
    records: Arc<Vec<SaleRecord>>,
    state: Arc<Mutex<DashboardState>>,
}

impl ToolDispatcher {
    pub fn new(records: Arc<Vec<SaleRecord>>) -> Self {
        Self {
            records,
            state: Arc::new(Mutex::new(DashboardState::new())),
        }
    }

    /// Shared handle for the rendering side; mutation stays in here.
    pub fn state(&self) -> Arc<Mutex<DashboardState>> {
        Arc::clone(&self.state)
    }

    #[instrument(skip_all, fields(operation = name))]
    pub async fn dispatch(&self, name: &str, args: &Value) -> String {
        debug!(%args, "Dispatching tool operation");
        match name {
            "resizeChart" => self.resize_chart(args).await,
            "applyFilters" => self.apply_filters(args).await,
            "setChartField" => self.set_chart_field(args).await,
            "calculateAggregate" => self.calculate_aggregate(args).await,
            "selectPoint" => self.select_point(args).await,
            other => format!("Error: unknown operation '{other}'."),
        }
    }

    async fn resize_chart(&self, args: &Value) -> String {
        let chart_name = match required_str(args, "chartName") {
            Ok(value) => value,
            Err(message) => return message,
        };
        let Ok(chart) = chart_name.parse::<ChartName>() else {
            return format!("Error: chart '{chart_name}' not found.");
        };
        let size = match required_str(args, "size").map(|value| value.parse::<ChartSize>()) {
            Ok(Ok(size)) => size,
            Ok(Err(err)) => return format!("Error: {err}."),
            Err(message) => return message,
        };

        let mut state = self.state.lock().await;
        state.chart_mut(chart).size = size;
        format!("Resized the {chart} chart to {size}.")
    }

    async fn apply_filters(&self, args: &Value) -> String {
        let towns = match optional_str_list(args, "towns") {
            Ok(values) => values,
            Err(message) => return message,
        };
        let property_types = match optional_str_list(args, "propertyTypes") {
            Ok(values) => values,
            Err(message) => return message,
        };

        let town_text = join_or_all(&towns);
        let prop_text = join_or_all(&property_types);

        let mut state = self.state.lock().await;
        state.set_filters(FilterState::new(towns, property_types));
        debug!(
            unrestricted = state.filters.is_unrestricted(),
            "Filter state replaced"
        );
        format!("Filters applied. Showing towns: {town_text}; property types: {prop_text}.")
    }

    async fn set_chart_field(&self, args: &Value) -> String {
        let chart_name = match required_str(args, "chartName") {
            Ok(value) => value,
            Err(message) => return message,
        };
        let Ok(chart) = chart_name.parse::<ChartName>() else {
            return format!("Error: chart '{chart_name}' not found.");
        };
        if !chart.supports_field_change() {
            return format!("Error: the {chart} chart does not support display-field changes.");
        }
        let field = match required_str(args, "field").map(|value| value.parse::<ChartField>()) {
            Ok(Ok(field)) => field,
            Ok(Err(err)) => return format!("Error: {err}."),
            Err(message) => return message,
        };
        let title = match required_str(args, "title") {
            Ok(value) => value.to_string(),
            Err(message) => return message,
        };

        let mut state = self.state.lock().await;
        let subset = apply(&self.records, &state.filters);
        let group = chart.group_field().unwrap_or(GroupField::Town);
        let series = display_series(&subset, group, field);
        let note = if series.is_empty() {
            "no data under the current filters".to_string()
        } else {
            match series {
                DisplaySeries::Grouped(rows) => format!("{} groups", rows.len()),
                DisplaySeries::Raw(values) => format!("{} raw points", values.len()),
            }
        };

        let info = state.chart_mut(chart);
        info.field = Some(field);
        info.title = title.clone();
        format!("The {chart} chart now displays {field} as \"{title}\" ({note}).")
    }

    async fn select_point(&self, args: &Value) -> String {
        let town = match required_str(args, "town") {
            Ok(value) => value.to_string(),
            Err(message) => return message,
        };
        let property_type = match required_str(args, "propertyType") {
            Ok(value) => value.to_string(),
            Err(message) => return message,
        };

        let mut state = self.state.lock().await;
        state.select_point(town.clone(), property_type.clone());
        format!("Selected the {town} / {property_type} point.")
    }

    async fn calculate_aggregate(&self, args: &Value) -> String {
        let field = match required_str(args, "field").map(|value| value.parse::<NumericField>()) {
            Ok(Ok(field)) => field,
            Ok(Err(err)) => return format!("Error: {err}."),
            Err(message) => return message,
        };
        let op = match required_str(args, "operation").map(|value| value.parse::<AggregateOp>()) {
            Ok(Ok(op)) => op,
            Ok(Err(err)) => return format!("Error: {err}."),
            Err(message) => return message,
        };
        let group_by = match args.get("groupBy").and_then(Value::as_str) {
            Some(value) => match value.parse::<GroupField>() {
                Ok(group) => Some(group),
                Err(err) => return format!("Error: {err}."),
            },
            None => None,
        };
        let scope = args
            .get("scope")
            .and_then(Value::as_str)
            .unwrap_or("filtered");

        let state = self.state.lock().await;
        let mut subset = apply(&self.records, &state.filters);
        match scope {
            "filtered" => {}
            "selection" => match &state.selection {
                Some(selection) => subset.retain(|record| {
                    record.town == selection.town
                        && record.property_type == selection.property_type
                }),
                None => {
                    return "No point is currently selected; select one first or use the \
                            filtered scope."
                        .to_string()
                }
            },
            other => return format!("Error: unknown scope '{other}'; expected filtered or selection."),
        }

        match aggregate(&subset, field, op, group_by) {
            AggregateOutcome::Empty => {
                "No data available for the current filters to perform calculation.".to_string()
            }
            AggregateOutcome::NoNumericData => format!("No numerical data for field {field}."),
            AggregateOutcome::Scalar(value) => {
                format!("The {op} for {field} is {}.", format_number(value))
            }
            AggregateOutcome::Grouped(rows) => {
                let group = group_by.map(|g| g.to_string()).unwrap_or_default();
                let mut lines = vec![format!("{} of {field} by {group}:", op.label())];
                lines.extend(
                    rows.iter()
                        .map(|(key, value)| format!("- {key}: {}", format_number(*value))),
                );
                lines.join("\n")
            }
        }
    }
}

fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, String> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("Error: missing or invalid '{key}' argument."))
}

fn optional_str_list(args: &Value, key: &str) -> Result<Vec<String>, String> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| format!("Error: '{key}' must be a list of strings."))
            })
            .collect(),
        Some(_) => Err(format!("Error: '{key}' must be a list of strings.")),
    }
}

fn join_or_all(values: &[String]) -> String {
    if values.is_empty() {
        "All".to_string()
    } else {
        values.join(", ")
    }
}

/// Render a number the way the dashboard does: comma thousands separators and
/// at most two fraction digits, trailing zeros trimmed.
pub fn format_number(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    let negative = rounded < 0.0;
    let abs = rounded.abs();
    let int_part = abs.trunc() as u64;
    let frac = ((abs - abs.trunc()) * 100.0).round() as u64;

    let mut out = String::new();
    if negative {
        out.push('-');
    }

    let digits = int_part.to_string();
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }

    if frac != 0 {
        if frac % 10 == 0 {
            out.push_str(&format!(".{}", frac / 10));
        } else {
            out.push_str(&format!(".{frac:02}"));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::mock::{record, sample_records};
    use serde_json::json;

    fn danbury_heavy_dataset() -> Vec<SaleRecord> {
        vec![
            record(1, "Danbury", "Residential", 2020, 310_000.0, 260_000.0),
            record(2, "Danbury", "Residential", 2020, 295_000.0, 250_000.0),
            record(3, "Danbury", "Commercial", 2021, 900_000.0, 720_000.0),
            record(4, "Bethel", "Residential", 2020, 280_000.0, 240_000.0),
            record(5, "Bethel", "Residential", 2021, 305_000.0, 255_000.0),
            record(6, "Newtown", "Residential", 2021, 415_000.0, 350_000.0),
            record(7, "Newtown", "Commercial", 2021, 610_000.0, 500_000.0),
            record(8, "Sherman", "Residential", 2022, 350_000.0, 290_000.0),
            record(9, "Brookfield", "Residential", 2022, 385_000.0, 320_000.0),
            record(10, "Ridgefield", "Residential", 2022, 505_000.0, 420_000.0),
        ]
    }

    fn dispatcher_with(records: Vec<SaleRecord>) -> ToolDispatcher {
        ToolDispatcher::new(Arc::new(records))
    }

    #[tokio::test]
    async fn resize_confirms_and_applies_before_returning() {
        let dispatcher = dispatcher_with(sample_records());
        let reply = dispatcher
            .dispatch("resizeChart", &json!({"chartName": "bar", "size": "large"}))
            .await;

        assert!(reply.contains("bar"));
        assert!(reply.contains("large"));
        let state = dispatcher.state();
        let state = state.lock().await;
        assert_eq!(state.chart(ChartName::Bar).size, ChartSize::Large);
    }

    #[tokio::test]
    async fn resize_of_unknown_chart_leaves_every_size_unchanged() {
        let dispatcher = dispatcher_with(sample_records());
        let reply = dispatcher
            .dispatch(
                "resizeChart",
                &json!({"chartName": "nonexistent", "size": "large"}),
            )
            .await;

        assert!(reply.contains("not found"));
        let state = dispatcher.state();
        let state = state.lock().await;
        for name in ChartName::ALL {
            assert_eq!(state.chart(name).size, ChartSize::Medium);
        }
    }

    #[tokio::test]
    async fn filter_then_count_sees_the_post_update_state() {
        let dispatcher = dispatcher_with(danbury_heavy_dataset());

        let reply = dispatcher
            .dispatch(
                "applyFilters",
                &json!({"towns": ["Danbury"], "propertyTypes": []}),
            )
            .await;
        assert!(reply.contains("Danbury"));
        assert!(reply.contains("All"));

        let count = dispatcher
            .dispatch(
                "calculateAggregate",
                &json!({"field": "sale_amount", "operation": "count"}),
            )
            .await;
        assert_eq!(count, "The count for sale_amount is 3.");
    }

    #[tokio::test]
    async fn aggregate_on_an_empty_subset_reports_no_data() {
        let dispatcher = dispatcher_with(danbury_heavy_dataset());
        dispatcher
            .dispatch("applyFilters", &json!({"towns": ["Atlantis"]}))
            .await;

        let reply = dispatcher
            .dispatch(
                "calculateAggregate",
                &json!({"field": "sale_amount", "operation": "average"}),
            )
            .await;
        assert_eq!(
            reply,
            "No data available for the current filters to perform calculation."
        );
    }

    #[tokio::test]
    async fn grouped_average_emits_one_line_per_group() {
        let dispatcher = dispatcher_with(danbury_heavy_dataset());
        let reply = dispatcher
            .dispatch(
                "calculateAggregate",
                &json!({"field": "sale_amount", "operation": "average", "groupBy": "town"}),
            )
            .await;

        let lines: Vec<&str> = reply.lines().collect();
        assert_eq!(lines[0], "Average of sale_amount by town:");
        assert!(lines[1].starts_with("- Danbury: "));
        // Six towns in the dataset, one line each plus the header.
        assert_eq!(lines.len(), 7);
    }

    #[tokio::test]
    async fn selection_scope_narrows_to_the_selected_point() {
        let dispatcher = dispatcher_with(danbury_heavy_dataset());
        dispatcher
            .dispatch(
                "selectPoint",
                &json!({"town": "Danbury", "propertyType": "Residential"}),
            )
            .await;

        let reply = dispatcher
            .dispatch(
                "calculateAggregate",
                &json!({"field": "sale_amount", "operation": "count", "scope": "selection"}),
            )
            .await;
        assert_eq!(reply, "The count for sale_amount is 2.");
    }

    #[tokio::test]
    async fn selection_scope_without_a_selection_explains_itself() {
        let dispatcher = dispatcher_with(danbury_heavy_dataset());
        let reply = dispatcher
            .dispatch(
                "calculateAggregate",
                &json!({"field": "sale_amount", "operation": "count", "scope": "selection"}),
            )
            .await;
        assert!(reply.contains("No point is currently selected"));
    }

    #[tokio::test]
    async fn applying_filters_clears_a_previous_selection() {
        let dispatcher = dispatcher_with(danbury_heavy_dataset());
        dispatcher
            .dispatch(
                "selectPoint",
                &json!({"town": "Danbury", "propertyType": "Residential"}),
            )
            .await;
        dispatcher
            .dispatch("applyFilters", &json!({"towns": ["Bethel"]}))
            .await;

        let state = dispatcher.state();
        assert!(state.lock().await.selection.is_none());
    }

    #[tokio::test]
    async fn field_changes_are_limited_to_the_bar_slots() {
        let dispatcher = dispatcher_with(sample_records());
        let reply = dispatcher
            .dispatch(
                "setChartField",
                &json!({"chartName": "bar", "field": "total_sale_amount",
                        "title": "Total Sale Amount by Town"}),
            )
            .await;
        assert!(reply.contains("total_sale_amount"));
        assert!(reply.contains("groups"));

        let denied = dispatcher
            .dispatch(
                "setChartField",
                &json!({"chartName": "line", "field": "count", "title": "Counts"}),
            )
            .await;
        assert!(denied.contains("does not support"));

        let state = dispatcher.state();
        let state = state.lock().await;
        assert_eq!(
            state.chart(ChartName::Bar).field,
            Some(ChartField::TotalSaleAmount)
        );
        assert_eq!(state.chart(ChartName::Bar).title, "Total Sale Amount by Town");
    }

    #[tokio::test]
    async fn unknown_operation_and_bad_arguments_come_back_as_text() {
        let dispatcher = dispatcher_with(sample_records());

        let unknown = dispatcher.dispatch("openPodBayDoors", &json!({})).await;
        assert_eq!(unknown, "Error: unknown operation 'openPodBayDoors'.");

        let missing = dispatcher.dispatch("resizeChart", &json!({})).await;
        assert!(missing.contains("chartName"));

        let bad_field = dispatcher
            .dispatch(
                "calculateAggregate",
                &json!({"field": "town", "operation": "sum"}),
            )
            .await;
        assert!(bad_field.contains("unknown field 'town'"));
    }

    #[test]
    fn numbers_format_with_separators_and_two_digit_cap() {
        assert_eq!(format_number(1_234_567.891), "1,234,567.89");
        assert_eq!(format_number(1_000.0), "1,000");
        assert_eq!(format_number(0.5), "0.5");
        assert_eq!(format_number(250_000.1), "250,000.1");
        assert_eq!(format_number(42.0), "42");
    }
}
