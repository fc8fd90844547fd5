use serde_json::{json, Value};

/// One operation descriptor handed to the conversational agent. This menu is
/// configuration, not behavior: the dispatcher owns the semantics, and a unit
/// test keeps the two name sets in sync.
#[derive(Debug, Clone)]
pub struct ToolSchema {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

pub fn tool_schemas() -> Vec<ToolSchema> {
    vec![
        ToolSchema {
            name: "resizeChart",
            description: "Resizes a specified chart on the dashboard.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "chartName": {
                        "type": "string",
                        "description": "The chart to resize.",
                        "enum": ["bar", "bar2", "line", "scatter"]
                    },
                    "size": {
                        "type": "string",
                        "description": "The target size for the chart.",
                        "enum": ["small", "medium", "large", "full"]
                    }
                },
                "required": ["chartName", "size"]
            }),
        },
        ToolSchema {
            name: "applyFilters",
            description: "Applies town/property-type filters to the dataset and updates \
                          every chart. Empty or omitted arrays clear that filter.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "towns": {
                        "type": "array",
                        "description": "Town names to keep; an empty array removes the town filter.",
                        "items": {"type": "string"}
                    },
                    "propertyTypes": {
                        "type": "array",
                        "description": "Property types to keep; an empty array removes the type filter.",
                        "items": {"type": "string"}
                    }
                }
            }),
        },
        ToolSchema {
            name: "setChartField",
            description: "Changes which field one of the two bar charts displays, along \
                          with its title.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "chartName": {
                        "type": "string",
                        "description": "The bar-chart slot to change.",
                        "enum": ["bar", "bar2"]
                    },
                    "field": {
                        "type": "string",
                        "description": "The field to display. Raw fields plot unaggregated values.",
                        "enum": ["avg_sale_amount", "avg_assessed_value", "total_sale_amount",
                                 "count", "sale_amount", "assessed_value"]
                    },
                    "title": {
                        "type": "string",
                        "description": "The new chart title."
                    }
                },
                "required": ["chartName", "field", "title"]
            }),
        },
        ToolSchema {
            name: "calculateAggregate",
            description: "Calculates an aggregate value (average, sum, count, median) for a \
                          data field over the currently filtered records, optionally grouped \
                          by another field.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "field": {
                        "type": "string",
                        "description": "The data field to aggregate.",
                        "enum": ["assessed_value", "sale_amount", "sales_ratio", "list_year"]
                    },
                    "operation": {
                        "type": "string",
                        "description": "The aggregation operation to perform.",
                        "enum": ["average", "sum", "count", "median"]
                    },
                    "groupBy": {
                        "type": "string",
                        "description": "Optional field to group the results by.",
                        "enum": ["town", "property_type", "residential_type", "list_year"]
                    },
                    "scope": {
                        "type": "string",
                        "description": "filtered (default) uses the active filters; selection \
                                        narrows further to the selected scatter point.",
                        "enum": ["filtered", "selection"]
                    }
                },
                "required": ["field", "operation"]
            }),
        },
        ToolSchema {
            name: "selectPoint",
            description: "Marks a scatter point (town + property type) as selected so \
                          selection-scoped aggregates can target it.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "town": {"type": "string", "description": "Town of the selected point."},
                    "propertyType": {
                        "type": "string",
                        "description": "Property type of the selected point."
                    }
                },
                "required": ["town", "propertyType"]
            }),
        },
    ]
}
