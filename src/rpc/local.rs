use chrono::Utc;
use log::warn;

use super::{PassageSink, Predictor, RpcError};
use crate::predict::{PassDescriptor, Position, RefreshOutcome, SgpPredictor};
use crate::store::{Frame, NewPassage, PassageStore};

impl PassageSink for PassageStore {
    async fn create(&self, passage: NewPassage) -> Result<(), RpcError> {
        Ok(PassageStore::create(self, passage)?)
    }

    async fn append(&self, frame: Frame) -> Result<(), RpcError> {
        Ok(PassageStore::append(self, frame)?)
    }

    async fn flush(&self) -> Result<(), RpcError> {
        PassageStore::flush(self)?;
        Ok(())
    }

    async fn update_tle(&self, tle: String) -> Result<(), RpcError> {
        PassageStore::update_tle(self, tle);
        Ok(())
    }
}

impl Predictor for SgpPredictor {
    async fn position(&self) -> Result<Position, RpcError> {
        Ok(self.position_at(Utc::now())?)
    }

    async fn next_passes(&self, count: usize) -> Result<Vec<PassDescriptor>, RpcError> {
        Ok(self.passes_after(Utc::now(), count)?)
    }

    async fn refresh(&self) -> Result<(), RpcError> {
        if let RefreshOutcome::RateLimited = SgpPredictor::refresh(self)? {
            warn!("TLE refresh skipped");
        }
        Ok(())
    }
}
