//! JSON-RPC error codes used on the wire.

pub const PARSE_ERROR_CODE: i64 = -32700;
pub const INVALID_REQUEST_ERROR_CODE: i64 = -32600;
pub const METHOD_NOT_FOUND_ERROR_CODE: i64 = -32601;
pub const INVALID_PARAMS_ERROR_CODE: i64 = -32602;
pub const INTERNAL_ERROR_CODE: i64 = -32603;

/// Lifecycle violations, calls before `initialized`, and unknown resource
/// URIs on read/subscribe all surface this code.
pub const NOT_INITIALIZED_ERROR_CODE: i64 = -32002;

// Server-defined range: -32099..=-32000.
pub const TOOL_EXECUTION_ERROR_CODE: i64 = -32000;
pub const PROGRESS_TOKEN_IN_USE_ERROR_CODE: i64 = -32001;

/// True for codes a handler may legitimately raise as a domain failure.
pub fn is_server_defined(code: i64) -> bool {
    (-32099..=-32000).contains(&code)
}
