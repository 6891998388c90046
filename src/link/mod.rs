//! Ground-station TCP links.
//!
//! One [`LinkAgent`] per terminal: it keeps a connection open, decodes KISS
//! frames out of the byte stream and forwards each one to the router.

mod agent;
mod backoff;

use std::time::Duration;

use thiserror::Error;

use crate::codec::DEFAULT_MAX_FRAME;

pub use agent::LinkAgent;
pub use backoff::{Backoff, BackoffSettings};

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("connection closed by peer")]
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkSettings {
    pub backoff: BackoffSettings,
    /// Reads shorter than this are dropped as line noise
    pub min_read_bytes: usize,
    pub short_read_pause: Duration,
    pub read_buffer: usize,
    /// Partial frames longer than this are discarded
    pub max_frame_len: usize,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            backoff: BackoffSettings::default(),
            min_read_bytes: 10,
            short_read_pause: Duration::from_secs(1),
            read_buffer: 1024,
            max_frame_len: DEFAULT_MAX_FRAME,
        }
    }
}
