//! Server lifecycle: Status, Shutdown

use serde::Deserialize;
use std::time::Duration;
use tracing::info;

use super::parse_params;
use crate::server::protocol::Response;
use crate::server::state::ServerState;

/// Handle Status request - job counts per state
pub fn handle_status(state: &ServerState, id: Option<serde_json::Value>) -> Response {
    Response::from_serializable(id, &state.dispatcher.status())
}

/// Handle Shutdown request - stops the pool; the server exits after replying
pub fn handle_shutdown(
    state: &mut ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> Response {
    #[derive(Deserialize)]
    struct ShutdownParams {
        grace_ms: Option<u64>,
    }

    let params: Option<ShutdownParams> = match parse_params(&id, params, "{grace_ms?}") {
        Ok(p) => p,
        Err(response) => return response,
    };
    let grace = params
        .and_then(|p| p.grace_ms)
        .map(Duration::from_millis)
        .unwrap_or(state.dispatcher.config().shutdown_grace);

    info!(grace_ms = grace.as_millis() as u64, "shutdown requested");
    let report = state.dispatcher.shutdown(grace);
    state.shutdown_requested = true;
    Response::from_serializable(id, &report)
}
