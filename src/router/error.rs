use thiserror::Error;

use crate::codec::HexError;
use crate::rpc::RpcError;

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("invalid frame payload: {0}")]
    InvalidPayload(#[from] HexError),
    #[error("position query failed: {0}")]
    Prediction(#[source] RpcError),
    #[error("store call failed: {0}")]
    Store(#[source] RpcError),
    #[error("element refresh failed: {0}")]
    Refresh(#[source] RpcError),
    #[error("router call failed: {0}")]
    Remote(#[source] RpcError),
}
