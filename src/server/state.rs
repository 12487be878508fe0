//! Server state management for the cleaner server

use crate::engine::{Dispatcher, DispatcherConfig};
use crate::error::DispatchError;

/// Everything a request handler may touch
pub struct ServerState {
    pub dispatcher: Dispatcher,
    /// Set by `Shutdown`; the serve loop exits after answering
    pub shutdown_requested: bool,
    pub requests_handled: u64,
}

impl ServerState {
    pub fn new(config: DispatcherConfig) -> Result<Self, DispatchError> {
        Ok(Self {
            dispatcher: Dispatcher::new(config)?,
            shutdown_requested: false,
            requests_handled: 0,
        })
    }
}
