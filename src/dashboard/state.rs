use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use crate::data::{ChartField, FilterState, GroupField};

/// Ordered size scale a chart can occupy on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartSize {
    Small,
    Medium,
    Large,
    Full,
}

impl ChartSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartSize::Small => "small",
            ChartSize::Medium => "medium",
            ChartSize::Large => "large",
            ChartSize::Full => "full",
        }
    }
}

impl fmt::Display for ChartSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ChartSize {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "small" => Ok(ChartSize::Small),
            "medium" => Ok(ChartSize::Medium),
            "large" => Ok(ChartSize::Large),
            "full" => Ok(ChartSize::Full),
            other => Err(anyhow!(
                "unknown size '{other}'; expected one of small, medium, large, full"
            )),
        }
    }
}

/// The four chart slots on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChartName {
    Bar,
    BarSecondary,
    Line,
    Scatter,
}

impl ChartName {
    pub const ALL: [ChartName; 4] = [
        ChartName::Bar,
        ChartName::BarSecondary,
        ChartName::Line,
        ChartName::Scatter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChartName::Bar => "bar",
            ChartName::BarSecondary => "bar2",
            ChartName::Line => "line",
            ChartName::Scatter => "scatter",
        }
    }

    /// Only the two bar slots accept display-field changes.
    pub fn supports_field_change(&self) -> bool {
        matches!(self, ChartName::Bar | ChartName::BarSecondary)
    }

    /// Which key a bar slot groups its series by.
    pub fn group_field(&self) -> Option<GroupField> {
        match self {
            ChartName::Bar => Some(GroupField::Town),
            ChartName::BarSecondary => Some(GroupField::PropertyType),
            _ => None,
        }
    }
}

impl fmt::Display for ChartName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ChartName {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "bar" => Ok(ChartName::Bar),
            "bar2" => Ok(ChartName::BarSecondary),
            "line" => Ok(ChartName::Line),
            "scatter" => Ok(ChartName::Scatter),
            other => Err(anyhow!(
                "unknown chart '{other}'; expected one of bar, bar2, line, scatter"
            )),
        }
    }
}

/// Presentation state for one chart. Never affects which records are
/// included; that is the filter's job alone.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartInfo {
    pub size: ChartSize,
    pub title: String,
    pub field: Option<ChartField>,
}

impl ChartInfo {
    fn new(title: &str, field: Option<ChartField>) -> Self {
        Self {
            size: ChartSize::Medium,
            title: title.to_string(),
            field,
        }
    }
}

/// A scatter point the user clicked; scopes selection-mode aggregates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointSelection {
    pub town: String,
    pub property_type: String,
}

/// The one mutable dashboard state object. Owned by the dispatcher and
/// mutated only through its operations, so updates are serialized and always
/// land before a confirmation string is returned.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardState {
    pub filters: FilterState,
    pub selection: Option<PointSelection>,
    bar: ChartInfo,
    bar_secondary: ChartInfo,
    line: ChartInfo,
    scatter: ChartInfo,
}

impl DashboardState {
    pub fn new() -> Self {
        Self {
            filters: FilterState::default(),
            selection: None,
            bar: ChartInfo::new("Average Sale Amount by Town", Some(ChartField::AvgSaleAmount)),
            bar_secondary: ChartInfo::new(
                "Sales Count by Property Type",
                Some(ChartField::SalesCount),
            ),
            line: ChartInfo::new("Sales Trend Over Years", None),
            scatter: ChartInfo::new("Assessed Value vs. Sale Amount", None),
        }
    }

    pub fn chart(&self, name: ChartName) -> &ChartInfo {
        match name {
            ChartName::Bar => &self.bar,
            ChartName::BarSecondary => &self.bar_secondary,
            ChartName::Line => &self.line,
            ChartName::Scatter => &self.scatter,
        }
    }

    pub fn chart_mut(&mut self, name: ChartName) -> &mut ChartInfo {
        match name {
            ChartName::Bar => &mut self.bar,
            ChartName::BarSecondary => &mut self.bar_secondary,
            ChartName::Line => &mut self.line,
            ChartName::Scatter => &mut self.scatter,
        }
    }

    /// Wholesale filter replacement. Any point selection was made against the
    /// old filter, so it is cleared here.
    pub fn set_filters(&mut self, filters: FilterState) {
        self.filters = filters;
        self.selection = None;
    }

    pub fn select_point(&mut self, town: String, property_type: String) {
        self.selection = Some(PointSelection {
            town,
            property_type,
        });
    }
}

impl Default for DashboardState {
    fn default() -> Self {
        Self::new()
    }
}
