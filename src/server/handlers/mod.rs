//! Handler module declarations and re-exports

pub mod jobs;
pub mod lifecycle;

pub use jobs::*;
pub use lifecycle::*;

use serde::de::DeserializeOwned;

use crate::error::DispatchError;
use crate::server::protocol::{error_codes, Response};

/// Map a dispatcher error onto its protocol error code
pub fn dispatch_error_response(id: Option<serde_json::Value>, err: DispatchError) -> Response {
    let code = match &err {
        DispatchError::DuplicateJob(_) => error_codes::DUPLICATE_JOB,
        DispatchError::UnknownJob(_) => error_codes::UNKNOWN_JOB,
        DispatchError::AlreadyRetrieved(_) => error_codes::ALREADY_RETRIEVED,
        DispatchError::JobFailed { .. } => error_codes::JOB_FAILED,
        DispatchError::Timeout { .. } => error_codes::TIMEOUT,
        DispatchError::ShuttingDown => error_codes::SHUTTING_DOWN,
        DispatchError::Spawn(_) => error_codes::INTERNAL_ERROR,
    };
    Response::error(id, code, err.to_string())
}

/// Deserialize request params or build the `INVALID_PARAMS` response
fn parse_params<T: DeserializeOwned>(
    id: &Option<serde_json::Value>,
    params: Option<serde_json::Value>,
    expected: &str,
) -> Result<T, Response> {
    let value = params.unwrap_or(serde_json::Value::Null);
    serde_json::from_value(value).map_err(|e| {
        Response::error(
            id.clone(),
            error_codes::INVALID_PARAMS,
            format!("Invalid params: expected {} ({})", expected, e),
        )
    })
}
