pub mod error;
pub mod predict;
pub mod router;
pub mod store;
