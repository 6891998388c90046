pub mod api;
pub mod api_doc;
pub mod server;

pub use server::{predictor_app, router_app, serve, store_app};
