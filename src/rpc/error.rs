use thiserror::Error;

use crate::predict::PredictError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{0} was rejected by the remote")]
    Rejected(&'static str),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Predict(#[from] PredictError),
}
