pub mod chat;
pub mod traits;

pub use chat::{DashboardAssistant, DataSummary, MAX_TOOL_ROUNDS};
pub use traits::{AssistantBehavior, AssistantRequest, AssistantResponse};
