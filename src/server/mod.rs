//! Cleaner server - line-delimited JSON-RPC over a reader/writer pair
//!
//! The server binary wires this to stdin/stdout; every request is one line,
//! every response one line. Logging goes to stderr only.
//!
//! # Module Structure
//! - `protocol` - JSON-RPC request/response types and error codes
//! - `state` - Server state owning the dispatcher
//! - `handlers` - Request handlers for job and lifecycle methods

pub mod handlers;
pub mod protocol;
pub mod state;

pub use protocol::{error_codes, ErrorResponse, Request, Response, SubmitParams};
pub use state::ServerState;

use std::io::{self, BufRead, Write};
use std::time::Instant;
use tracing::{debug, info, warn};

use handlers::{
    handle_next_finished, handle_poll_done, handle_shutdown, handle_status, handle_submit,
    handle_take_result,
};

/// Why [`serve`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeExit {
    ShutdownRequested,
    InputClosed,
}

/// Route one request to its handler
pub fn handle_request(state: &mut ServerState, request: Request) -> Response {
    state.requests_handled += 1;
    let Request { id, method, params } = request;
    match method.as_str() {
        "Submit" => handle_submit(state, id, params),
        "PollDone" => handle_poll_done(state, id, params),
        "TakeResult" => handle_take_result(state, id, params),
        "NextFinished" => handle_next_finished(state, id, params),
        "Status" => handle_status(state, id),
        "Shutdown" => handle_shutdown(state, id, params),
        _ => Response::error(id, error_codes::METHOD_NOT_FOUND, format!("Unknown method: {}", method)),
    }
}

/// Answer requests until `Shutdown` or end of input
///
/// End of input shuts the dispatcher down with the configured grace period.
pub fn serve<R: BufRead, W: Write>(state: &mut ServerState, input: R, mut output: W) -> io::Result<ServeExit> {
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let response = match parse_request(&line) {
            Ok(request) => {
                let start = Instant::now();
                let method = request.method.clone();
                let response = handle_request(state, request);
                debug!(
                    method = %method,
                    ok = response.error.is_none(),
                    elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "handled request"
                );
                response
            }
            Err(response) => {
                warn!(error = ?response.error, "rejected request line");
                response
            }
        };
        write_response(&mut output, &response)?;

        if state.shutdown_requested {
            return Ok(ServeExit::ShutdownRequested);
        }
    }

    info!("input closed, shutting down");
    let grace = state.dispatcher.config().shutdown_grace;
    state.dispatcher.shutdown(grace);
    Ok(ServeExit::InputClosed)
}

/// Malformed JSON is a parse error; JSON that is not a request is an invalid request
fn parse_request(line: &str) -> Result<Request, Response> {
    let value: serde_json::Value = serde_json::from_str(line)
        .map_err(|e| Response::error(None, error_codes::PARSE_ERROR, format!("Parse error: {}", e)))?;
    let id = value.get("id").cloned();
    serde_json::from_value(value)
        .map_err(|e| Response::error(id, error_codes::INVALID_REQUEST, format!("Invalid request: {}", e)))
}

fn write_response<W: Write>(output: &mut W, response: &Response) -> io::Result<()> {
    serde_json::to_writer(&mut *output, response)?;
    output.write_all(b"\n")?;
    output.flush()
}
