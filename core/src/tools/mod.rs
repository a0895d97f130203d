pub mod authorization;
pub mod error;
pub mod registry;
pub mod requests;
pub mod traits;

// Re-export common types
pub use crate::catalog::Method;
pub use authorization::DeleteAuthorization;
pub use error::{ToolError, ToolResult};
pub use registry::ToolRegistry;
pub use requests::{
    parse_json_markdown, RequestsDeleteTool, RequestsGetTool, RequestsPatchTool,
    RequestsPostTool, RequestsWrapper, MAX_RESPONSE_LENGTH,
};
pub use traits::Tool;
