//! Seams between the pipeline roles.
//!
//! Each role is reachable either in-process (the service object itself) or
//! over HTTP through the clients in [`client`]. Callers are generic over the
//! traits below and do not care which one they hold.

pub mod client;
mod error;
mod local;

use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub use client::{PredictorClient, RouterClient, StoreClient};
pub use error::RpcError;

use crate::predict::{PassDescriptor, Position};
use crate::router::RouterError;
use crate::store::{Frame, NewPassage};

/// Body of the `update_tle` calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct TleUpdate {
    pub tle: String,
}

/// Body of a router `receive_frame` call, as sent by a link agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct FrameReport {
    /// Frame bytes as hex text
    #[schema(example = "0x86 0xa2 0x86 0xa2")]
    pub payload: String,
    pub host: String,
    pub port: u16,
    /// Receipt time, epoch seconds
    pub timestamp: f64,
}

/// Passage Store operations.
pub trait PassageSink: Send + Sync {
    fn create(&self, passage: NewPassage) -> impl Future<Output = Result<(), RpcError>> + Send;
    fn append(&self, frame: Frame) -> impl Future<Output = Result<(), RpcError>> + Send;
    fn flush(&self) -> impl Future<Output = Result<(), RpcError>> + Send;
    fn update_tle(&self, tle: String) -> impl Future<Output = Result<(), RpcError>> + Send;
}

/// Prediction service operations.
pub trait Predictor: Send + Sync {
    fn position(&self) -> impl Future<Output = Result<Position, RpcError>> + Send;
    fn next_passes(
        &self,
        count: usize,
    ) -> impl Future<Output = Result<Vec<PassDescriptor>, RpcError>> + Send;
    /// Asks the service to refresh its orbital elements.
    fn refresh(&self) -> impl Future<Output = Result<(), RpcError>> + Send;
}

/// Router operations, as called by the scheduler and the link agents.
pub trait RouterApi: Send + Sync {
    fn update_tle(&self, tle: String) -> impl Future<Output = Result<(), RouterError>> + Send;
    fn prepare_pass(
        &self,
        pass: PassDescriptor,
    ) -> impl Future<Output = Result<(), RouterError>> + Send;
    fn end_pass(&self) -> impl Future<Output = Result<(), RouterError>> + Send;
    fn receive_frame(
        &self,
        payload: String,
        host: String,
        port: u16,
        timestamp: f64,
    ) -> impl Future<Output = Result<(), RouterError>> + Send;
}

impl<T: PassageSink> PassageSink for Arc<T> {
    fn create(&self, passage: NewPassage) -> impl Future<Output = Result<(), RpcError>> + Send {
        (**self).create(passage)
    }

    fn append(&self, frame: Frame) -> impl Future<Output = Result<(), RpcError>> + Send {
        (**self).append(frame)
    }

    fn flush(&self) -> impl Future<Output = Result<(), RpcError>> + Send {
        (**self).flush()
    }

    fn update_tle(&self, tle: String) -> impl Future<Output = Result<(), RpcError>> + Send {
        (**self).update_tle(tle)
    }
}

impl<T: Predictor> Predictor for Arc<T> {
    fn position(&self) -> impl Future<Output = Result<Position, RpcError>> + Send {
        (**self).position()
    }

    fn next_passes(
        &self,
        count: usize,
    ) -> impl Future<Output = Result<Vec<PassDescriptor>, RpcError>> + Send {
        (**self).next_passes(count)
    }

    fn refresh(&self) -> impl Future<Output = Result<(), RpcError>> + Send {
        (**self).refresh()
    }
}

impl<T: RouterApi> RouterApi for Arc<T> {
    fn update_tle(&self, tle: String) -> impl Future<Output = Result<(), RouterError>> + Send {
        (**self).update_tle(tle)
    }

    fn prepare_pass(
        &self,
        pass: PassDescriptor,
    ) -> impl Future<Output = Result<(), RouterError>> + Send {
        (**self).prepare_pass(pass)
    }

    fn end_pass(&self) -> impl Future<Output = Result<(), RouterError>> + Send {
        (**self).end_pass()
    }

    fn receive_frame(
        &self,
        payload: String,
        host: String,
        port: u16,
        timestamp: f64,
    ) -> impl Future<Output = Result<(), RouterError>> + Send {
        (**self).receive_frame(payload, host, port, timestamp)
    }
}
