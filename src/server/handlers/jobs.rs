//! Job operations: Submit, PollDone, TakeResult, NextFinished

use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{dispatch_error_response, parse_params};
use crate::engine::JobId;
use crate::server::protocol::{Response, SubmitParams};
use crate::server::state::ServerState;

#[derive(Deserialize)]
struct JobParams {
    layer: u32,
    datatype: u32,
}

/// Handle Submit request - queues one layer for cleaning
pub fn handle_submit(
    state: &mut ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> Response {
    let params: SubmitParams = match parse_params(
        &id,
        params,
        "{layer, datatype, min_width, min_space, bbox: [x1,x2,y1,y2], edges: [[x1,x2,y1,y2]]}",
    ) {
        Ok(p) => p,
        Err(response) => return response,
    };

    let job_id = params.job_id();
    match state.dispatcher.submit(params.into_job()) {
        Ok(()) => Response::success(
            id,
            serde_json::json!({
                "status": "submitted",
                "layer": job_id.layer,
                "datatype": job_id.datatype,
            }),
        ),
        Err(e) => dispatch_error_response(id, e),
    }
}

/// Handle PollDone request - non-blocking completion check
pub fn handle_poll_done(
    state: &ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> Response {
    let params: JobParams = match parse_params(&id, params, "{layer, datatype}") {
        Ok(p) => p,
        Err(response) => return response,
    };

    match state.dispatcher.poll_done(JobId::new(params.layer, params.datatype)) {
        Ok(done) => Response::success(id, serde_json::json!({ "done": done })),
        Err(e) => dispatch_error_response(id, e),
    }
}

/// Handle TakeResult request - waits (bounded) and hands over the result once
pub fn handle_take_result(
    state: &ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> Response {
    #[derive(Deserialize)]
    struct TakeResultParams {
        layer: u32,
        datatype: u32,
        timeout_ms: Option<u64>,
        #[serde(default)]
        packed: bool,
    }

    let params: TakeResultParams =
        match parse_params(&id, params, "{layer, datatype, timeout_ms?, packed?}") {
            Ok(p) => p,
            Err(response) => return response,
        };

    let job_id = JobId::new(params.layer, params.datatype);
    let timeout = params
        .timeout_ms
        .map(Duration::from_millis)
        .unwrap_or(state.dispatcher.config().result_timeout);

    match state.dispatcher.take_result_timeout(job_id, timeout) {
        Ok(result) => {
            let result = if params.packed { result.packed() } else { result };
            debug!(job = %job_id, packed = params.packed, "sending result");
            Response::from_serializable(id, &result)
        }
        Err(e) => dispatch_error_response(id, e),
    }
}

/// Handle NextFinished request - identity of a finished job, or null
pub fn handle_next_finished(
    state: &ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> Response {
    #[derive(Deserialize)]
    struct NextFinishedParams {
        #[serde(default)]
        timeout_ms: u64,
    }

    let params: Option<NextFinishedParams> = match parse_params(&id, params, "{timeout_ms?}") {
        Ok(p) => p,
        Err(response) => return response,
    };
    let timeout = Duration::from_millis(params.map_or(0, |p| p.timeout_ms));

    match state.dispatcher.next_finished(timeout) {
        Some(job_id) => Response::from_serializable(id, &job_id),
        None => Response::success(id, serde_json::Value::Null),
    }
}
