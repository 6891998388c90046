mod error;
mod router;

pub use error::RouterError;
pub use router::Router;
