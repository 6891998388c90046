use std::sync::Arc;

use axum::{extract::State, Json};
use log::warn;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::predict::PassDescriptor;
use crate::router::{Router, RouterError};
use crate::rpc::{FrameReport, PredictorClient, RouterApi, StoreClient, TleUpdate};

/// Router as deployed: it reaches the store and the predictor over HTTP.
pub type HttpRouter = Router<PredictorClient, StoreClient>;

fn decode<T: DeserializeOwned>(operation: &str, body: Value) -> Option<T> {
    match serde_json::from_value(body) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("{} rejected: {}", operation, e);
            None
        }
    }
}

// Failures are already logged by the router itself
fn acknowledge(result: Result<(), RouterError>) -> Json<bool> {
    Json(result.is_ok())
}

#[utoipa::path(
    post,
    path = "/rpc/router/update_tle",
    tag = "router",
    request_body = TleUpdate,
    responses(
        (status = 200, description = "Whether the TLE reached the store", body = bool)
    )
)]
pub async fn update_tle(
    State(router): State<Arc<HttpRouter>>,
    Json(body): Json<Value>,
) -> Json<bool> {
    let Some(update) = decode::<TleUpdate>("updateTle", body) else {
        return Json(false);
    };
    acknowledge(router.update_tle(update.tle).await)
}

#[utoipa::path(
    post,
    path = "/rpc/router/prepare_pass",
    tag = "router",
    request_body = PassDescriptor,
    responses(
        (status = 200, description = "Whether a passage was created for the pass", body = bool)
    )
)]
pub async fn prepare_pass(
    State(router): State<Arc<HttpRouter>>,
    Json(body): Json<Value>,
) -> Json<bool> {
    let Some(pass) = decode::<PassDescriptor>("preparePass", body) else {
        return Json(false);
    };
    if let Err(reason) = pass.validate() {
        warn!("preparePass rejected: {}", reason);
        return Json(false);
    }
    acknowledge(router.prepare_pass(pass).await)
}

#[utoipa::path(
    post,
    path = "/rpc/router/end_pass",
    tag = "router",
    responses(
        (status = 200, description = "Whether the passages were saved and elements refreshed", body = bool)
    )
)]
pub async fn end_pass(State(router): State<Arc<HttpRouter>>) -> Json<bool> {
    acknowledge(router.end_pass().await)
}

#[utoipa::path(
    post,
    path = "/rpc/router/receive_frame",
    tag = "router",
    request_body = FrameReport,
    responses(
        (status = 200, description = "Whether the frame was stored", body = bool)
    )
)]
pub async fn receive_frame(
    State(router): State<Arc<HttpRouter>>,
    Json(body): Json<Value>,
) -> Json<bool> {
    let Some(report) = decode::<FrameReport>("receiveFrame", body) else {
        return Json(false);
    };
    let result = router
        .receive_frame(report.payload, report.host, report.port, report.timestamp)
        .await;
    acknowledge(result)
}
