//! Server state.

use std::time::{Duration, Instant};

use super::config::ServerConfig;
use crate::pipeline::Pipeline;
use crate::transport::HttpSender;

/// Application state shared across handlers
pub struct AppState {
    /// Server configuration
    pub config: ServerConfig,
    /// Message pipeline
    pub pipeline: Pipeline,
    /// Sender for asynchronous MDNs; `None` leaves them READY_TO_PUSH
    pub sender: Option<HttpSender>,
    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    /// Create new application state
    pub fn new(config: ServerConfig, pipeline: Pipeline) -> Self {
        Self {
            config,
            pipeline,
            sender: None,
            start_time: Instant::now(),
        }
    }

    /// Push asynchronous MDNs with `sender`
    pub fn with_sender(mut self, sender: HttpSender) -> Self {
        self.sender = Some(sender);
        self
    }

    /// Get server uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }
}
