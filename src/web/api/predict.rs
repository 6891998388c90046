use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use log::{error, info};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::predict::{PassDescriptor, Position, PredictError, RefreshOutcome, SgpPredictor};
use crate::rpc::{RouterApi, RouterClient};
use crate::web::api::error::ApiResult;

#[derive(Clone)]
pub struct PredictState {
    pub predictor: Arc<SgpPredictor>,
    /// Receives fresh elements after each reload, when set
    pub router: Option<RouterClient>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PassesQuery {
    /// Number of passes to return (default 10)
    pub count: Option<usize>,
}

#[utoipa::path(
    get,
    path = "/rpc/predict/position",
    tag = "predict",
    responses(
        (status = 200, description = "Current look angles and range", body = Position),
        (status = 503, description = "Propagation failed")
    )
)]
pub async fn position(State(state): State<PredictState>) -> ApiResult<Json<Position>> {
    Ok(Json(state.predictor.position_at(chrono::Utc::now())?))
}

#[utoipa::path(
    get,
    path = "/rpc/predict/passes",
    tag = "predict",
    params(PassesQuery),
    responses(
        (status = 200, description = "Upcoming passes ordered by AOS", body = Vec<PassDescriptor>),
        (status = 503, description = "Propagation failed")
    )
)]
pub async fn passes(
    State(state): State<PredictState>,
    Query(query): Query<PassesQuery>,
) -> ApiResult<Json<Vec<PassDescriptor>>> {
    let count = query.count.unwrap_or(10);
    let predictor = state.predictor.clone();
    let now = chrono::Utc::now();
    let passes = tokio::task::spawn_blocking(move || predictor.passes_after(now, count))
        .await
        .map_err(|e| PredictError::Propagation(e.to_string()))??;
    Ok(Json(passes))
}

#[utoipa::path(
    post,
    path = "/rpc/predict/refresh",
    tag = "predict",
    responses(
        (status = 200, description = "Whether the elements are current", body = bool)
    )
)]
pub async fn refresh(State(state): State<PredictState>) -> Json<bool> {
    match state.predictor.refresh() {
        Ok(RefreshOutcome::Reloaded(tle)) => {
            if let Some(router) = state.router {
                tokio::spawn(async move {
                    match router.update_tle(tle).await {
                        Ok(()) => info!("New elements pushed to the router"),
                        Err(e) => error!("Cannot push new elements to the router: {}", e),
                    }
                });
            }
            Json(true)
        }
        Ok(RefreshOutcome::RateLimited) => Json(true),
        Err(e) => {
            error!("TLE refresh failed: {}", e);
            Json(false)
        }
    }
}
