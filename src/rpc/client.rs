use std::time::Duration;

use log::debug;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{FrameReport, PassageSink, Predictor, RouterApi, RpcError, TleUpdate};
use crate::predict::{PassDescriptor, Position};
use crate::router::RouterError;
use crate::store::{Frame, NewPassage, PassageSummary, TleRecord};

/// JSON-over-HTTP caller shared by the typed clients below.
#[derive(Debug, Clone)]
struct Endpoint {
    http: Client,
    base: String,
}

impl Endpoint {
    fn new(base: &str, timeout: Duration) -> Result<Self, RpcError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<bool, RpcError> {
        let url = format!("{}{}", self.base, path);
        debug!("POST {}", url);
        let request = self.http.post(&url);
        let request = match body {
            Some(body) => request.json(body),
            None => request,
        };
        let accepted = request
            .send()
            .await?
            .error_for_status()?
            .json::<bool>()
            .await?;
        Ok(accepted)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, RpcError> {
        let url = format!("{}{}", self.base, path);
        debug!("GET {}", url);
        let value = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await?
            .error_for_status()?
            .json::<T>()
            .await?;
        Ok(value)
    }

    /// Turns a `false` reply into [`RpcError::Rejected`].
    async fn call<B: Serialize + ?Sized>(
        &self,
        method: &'static str,
        path: &str,
        body: Option<&B>,
    ) -> Result<(), RpcError> {
        if self.post(path, body).await? {
            Ok(())
        } else {
            Err(RpcError::Rejected(method))
        }
    }
}

const NO_BODY: Option<&()> = None;

#[derive(Debug, Clone)]
pub struct StoreClient {
    endpoint: Endpoint,
}

impl StoreClient {
    pub fn new(base: &str, timeout: Duration) -> Result<Self, RpcError> {
        Ok(Self {
            endpoint: Endpoint::new(base, timeout)?,
        })
    }

    pub async fn resident(&self) -> Result<Vec<PassageSummary>, RpcError> {
        self.endpoint.get("/rpc/store/resident", &[]).await
    }

    pub async fn last_tle(&self) -> Result<Option<TleRecord>, RpcError> {
        self.endpoint.get("/rpc/store/tle", &[]).await
    }
}

impl PassageSink for StoreClient {
    async fn create(&self, passage: NewPassage) -> Result<(), RpcError> {
        self.endpoint
            .call("create", "/rpc/store/create", Some(&passage))
            .await
    }

    async fn append(&self, frame: Frame) -> Result<(), RpcError> {
        self.endpoint
            .call("append", "/rpc/store/append", Some(&frame))
            .await
    }

    async fn flush(&self) -> Result<(), RpcError> {
        self.endpoint
            .call("flush", "/rpc/store/flush", NO_BODY)
            .await
    }

    async fn update_tle(&self, tle: String) -> Result<(), RpcError> {
        self.endpoint
            .call(
                "updateTle",
                "/rpc/store/update_tle",
                Some(&TleUpdate { tle }),
            )
            .await
    }
}

#[derive(Debug, Clone)]
pub struct PredictorClient {
    endpoint: Endpoint,
}

impl PredictorClient {
    pub fn new(base: &str, timeout: Duration) -> Result<Self, RpcError> {
        Ok(Self {
            endpoint: Endpoint::new(base, timeout)?,
        })
    }
}

impl Predictor for PredictorClient {
    async fn position(&self) -> Result<Position, RpcError> {
        self.endpoint.get("/rpc/predict/position", &[]).await
    }

    async fn next_passes(&self, count: usize) -> Result<Vec<PassDescriptor>, RpcError> {
        self.endpoint
            .get("/rpc/predict/passes", &[("count", count.to_string())])
            .await
    }

    async fn refresh(&self) -> Result<(), RpcError> {
        self.endpoint
            .call("refresh", "/rpc/predict/refresh", NO_BODY)
            .await
    }
}

#[derive(Debug, Clone)]
pub struct RouterClient {
    endpoint: Endpoint,
}

impl RouterClient {
    pub fn new(base: &str, timeout: Duration) -> Result<Self, RpcError> {
        Ok(Self {
            endpoint: Endpoint::new(base, timeout)?,
        })
    }
}

impl RouterApi for RouterClient {
    async fn update_tle(&self, tle: String) -> Result<(), RouterError> {
        self.endpoint
            .call(
                "updateTle",
                "/rpc/router/update_tle",
                Some(&TleUpdate { tle }),
            )
            .await
            .map_err(RouterError::Remote)
    }

    async fn prepare_pass(&self, pass: PassDescriptor) -> Result<(), RouterError> {
        self.endpoint
            .call("preparePass", "/rpc/router/prepare_pass", Some(&pass))
            .await
            .map_err(RouterError::Remote)
    }

    async fn end_pass(&self) -> Result<(), RouterError> {
        self.endpoint
            .call("endPass", "/rpc/router/end_pass", NO_BODY)
            .await
            .map_err(RouterError::Remote)
    }

    async fn receive_frame(
        &self,
        payload: String,
        host: String,
        port: u16,
        timestamp: f64,
    ) -> Result<(), RouterError> {
        let report = FrameReport {
            payload,
            host,
            port,
            timestamp,
        };
        self.endpoint
            .call("receiveFrame", "/rpc/router/receive_frame", Some(&report))
            .await
            .map_err(RouterError::Remote)
    }
}
