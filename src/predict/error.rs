use thiserror::Error;

#[derive(Debug, Error)]
pub enum PredictError {
    #[error("TLE folder {0} does not exist")]
    DirectoryNotFound(String),
    #[error("cannot read TLE file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("bad elements in {file}: {message}")]
    InvalidTle { file: String, message: String },
    #[error("text is not a 2-line or 3-line TLE set")]
    InvalidTleFormat,
    #[error("no elements for NORAD {0} in the TLE folder")]
    SatelliteNotFound(u64),
    #[error("propagation failed: {0}")]
    Propagation(String),
}

impl From<sgp4::Error> for PredictError {
    fn from(err: sgp4::Error) -> Self {
        PredictError::Propagation(err.to_string())
    }
}
