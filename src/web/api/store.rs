use std::sync::Arc;

use axum::{extract::State, Json};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::rpc::TleUpdate;
use crate::store::{
    log_rejection, Frame, NewPassage, PassageStore, PassageSummary, StoreError, TleRecord,
};

/// Bodies are taken as raw JSON so a schema mismatch is answered with
/// `false` like any other rejection.
fn decode<T: DeserializeOwned>(body: Value) -> Result<T, StoreError> {
    serde_json::from_value(body).map_err(|e| StoreError::Schema(e.to_string()))
}

fn acknowledge<T>(operation: &str, result: Result<T, StoreError>) -> Json<bool> {
    match result {
        Ok(_) => Json(true),
        Err(e) => {
            log_rejection(operation, &e);
            Json(false)
        }
    }
}

#[utoipa::path(
    post,
    path = "/rpc/store/create",
    tag = "store",
    request_body = NewPassage,
    responses(
        (status = 200, description = "Whether the passage was created", body = bool)
    )
)]
pub async fn create(State(store): State<Arc<PassageStore>>, Json(body): Json<Value>) -> Json<bool> {
    let result = decode::<NewPassage>(body).and_then(|passage| store.create(passage));
    acknowledge("create", result)
}

#[utoipa::path(
    post,
    path = "/rpc/store/append",
    tag = "store",
    request_body = Frame,
    responses(
        (status = 200, description = "Whether the frame was added to its passage", body = bool)
    )
)]
pub async fn append(State(store): State<Arc<PassageStore>>, Json(body): Json<Value>) -> Json<bool> {
    let result = decode::<Frame>(body).and_then(|frame| store.append(frame));
    acknowledge("append", result)
}

#[utoipa::path(
    post,
    path = "/rpc/store/flush",
    tag = "store",
    responses(
        (status = 200, description = "Whether resident passages were written and cleared", body = bool)
    )
)]
pub async fn flush(State(store): State<Arc<PassageStore>>) -> Json<bool> {
    acknowledge("flush", store.flush())
}

#[utoipa::path(
    post,
    path = "/rpc/store/update_tle",
    tag = "store",
    request_body = TleUpdate,
    responses(
        (status = 200, description = "TLE acknowledged", body = bool)
    )
)]
pub async fn update_tle(
    State(store): State<Arc<PassageStore>>,
    Json(body): Json<Value>,
) -> Json<bool> {
    let result = decode::<TleUpdate>(body).map(|update| store.update_tle(update.tle));
    acknowledge("updateTle", result)
}

#[utoipa::path(
    get,
    path = "/rpc/store/resident",
    tag = "store",
    responses(
        (status = 200, description = "Resident passages, oldest first", body = Vec<PassageSummary>)
    )
)]
pub async fn resident(State(store): State<Arc<PassageStore>>) -> Json<Vec<PassageSummary>> {
    Json(store.resident())
}

#[utoipa::path(
    get,
    path = "/rpc/store/tle",
    tag = "store",
    responses(
        (status = 200, description = "Latest TLE update, if any", body = Option<TleRecord>)
    )
)]
pub async fn tle(State(store): State<Arc<PassageStore>>) -> Json<Option<TleRecord>> {
    Json(store.last_tle())
}
