use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("schema violation: {0}")]
    Schema(String),
    #[error("passage {0} is already resident")]
    Duplicate(i64),
    #[error("passage {0} not found")]
    NotFound(i64),
    #[error("store is full ({0} resident passages)")]
    Capacity(usize),
    #[error("no resident passage to flush")]
    Empty,
    #[error("failed to persist passages to {path}: {source}")]
    Persistence {
        path: PathBuf,
        source: std::io::Error,
    },
}
