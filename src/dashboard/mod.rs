pub mod dispatcher;
pub mod schema;
pub mod state;

pub use dispatcher::{format_number, ToolDispatcher};
pub use schema::{tool_schemas, ToolSchema};
pub use state::{ChartInfo, ChartName, ChartSize, DashboardState, PointSelection};
