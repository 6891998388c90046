use utoipa::OpenApi;

use super::api::error::ErrorResponse;
use crate::predict::{PassDescriptor, Position};
use crate::rpc::{FrameReport, TleUpdate};
use crate::store::{Frame, NewPassage, PassageSummary, TleRecord};

#[derive(OpenApi)]
#[openapi(
    paths(
        super::api::store::create,
        super::api::store::append,
        super::api::store::flush,
        super::api::store::update_tle,
        super::api::store::resident,
        super::api::store::tle,
    ),
    components(schemas(NewPassage, Frame, PassageSummary, TleRecord, TleUpdate)),
    info(
        title = "Passage Store RPC",
        description = "Resident passages and their frames",
        version = "0.1.0"
    ),
    tags((name = "store", description = "Passage lifecycle"))
)]
pub struct StoreApiDoc;

#[derive(OpenApi)]
#[openapi(
    paths(
        super::api::router::update_tle,
        super::api::router::prepare_pass,
        super::api::router::end_pass,
        super::api::router::receive_frame,
    ),
    components(schemas(PassDescriptor, FrameReport, TleUpdate)),
    info(
        title = "Router RPC",
        description = "Frame tagging and passage preparation",
        version = "0.1.0"
    ),
    tags((name = "router", description = "Frame routing"))
)]
pub struct RouterApiDoc;

#[derive(OpenApi)]
#[openapi(
    paths(
        super::api::predict::position,
        super::api::predict::passes,
        super::api::predict::refresh,
    ),
    components(schemas(Position, PassDescriptor, ErrorResponse)),
    info(
        title = "Prediction RPC",
        description = "Satellite position and upcoming passes",
        version = "0.1.0"
    ),
    tags((name = "predict", description = "Orbit prediction"))
)]
pub struct PredictApiDoc;
