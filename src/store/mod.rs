mod error;
mod persist;
mod store;
mod types;

pub use error::StoreError;
pub(crate) use store::log_rejection;
pub use store::{PassageStore, TleRecord};
pub use types::{Frame, LinkId, NewPassage, Passage, PassageSummary, NO_PASSAGE};
