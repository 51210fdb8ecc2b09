pub mod request;
pub mod response;
pub mod tool;

pub use request::{JsonRpcRequest, RpcId, ToolCallParams, JSONRPC_VERSION};
pub use response::{
    JsonRpcError, JsonRpcResponse, ToolResult, ToolResultContent, INTERNAL_ERROR,
    INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR, SUPPORTED_METHODS,
};
pub use tool::{InvocationHints, ToolDescriptor, ToolsListResult};
