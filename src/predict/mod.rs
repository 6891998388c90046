mod error;
mod ground_station;
mod pass_finder;
mod propagation;
mod service;
mod tle_loader;
mod types;

pub use error::PredictError;
pub use ground_station::GroundStation;
pub use service::{PredictorSettings, RefreshOutcome, SgpPredictor};
pub use tle_loader::{parse_tle_lines, TleLoader};
pub(crate) use types::check_pass_geometry;
pub use types::{PassDescriptor, Position};
