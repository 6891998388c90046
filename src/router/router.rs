use std::sync::{Mutex, PoisonError};

use log::{debug, error, info, warn};

use super::RouterError;
use crate::codec::parse_hex;
use crate::predict::{parse_tle_lines, PassDescriptor};
use crate::rpc::{PassageSink, Predictor, RouterApi};
use crate::store::{Frame, LinkId, NewPassage, NO_PASSAGE};

/// Tags incoming frames with geometry and a passage number, and drives the
/// passage lifecycle in the store.
///
/// The passage counter only moves forward. A number handed to a failed
/// create is never reused.
pub struct Router<P, S> {
    predictor: P,
    store: S,
    counter: Mutex<i64>,
    last_tle: Mutex<Option<(String, String)>>,
}

impl<P: Predictor, S: PassageSink> Router<P, S> {
    pub fn new(predictor: P, store: S, first_passage_number: i64) -> Self {
        Self {
            predictor,
            store,
            counter: Mutex::new(first_passage_number - 1),
            last_tle: Mutex::new(None),
        }
    }

    /// Number of the most recently prepared passage.
    pub fn current_passage(&self) -> i64 {
        *self.counter.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn last_tle(&self) -> Option<(String, String)> {
        self.last_tle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn next_passage(&self) -> i64 {
        let mut counter = self.counter.lock().unwrap_or_else(PoisonError::into_inner);
        *counter += 1;
        *counter
    }
}

impl<P: Predictor, S: PassageSink> RouterApi for Router<P, S> {
    async fn update_tle(&self, tle: String) -> Result<(), RouterError> {
        debug!("updateTle: {:?}", tle);
        match parse_tle_lines(&tle) {
            Ok((_, line1, line2)) => {
                *self.last_tle.lock().unwrap_or_else(PoisonError::into_inner) =
                    Some((line1, line2));
            }
            Err(e) => warn!("Forwarding TLE update that does not parse: {}", e),
        }

        self.store.update_tle(tle).await.map_err(|e| {
            error!("Could not forward TLE update: {}", e);
            RouterError::Store(e)
        })
    }

    async fn prepare_pass(&self, pass: PassDescriptor) -> Result<(), RouterError> {
        let number = self.next_passage();
        debug!("preparePass #{}: {:?}", number, pass);
        if let Some((line1, line2)) = self.last_tle() {
            if line1 != pass.tle_line1 || line2 != pass.tle_line2 {
                warn!(
                    "Passage {} was predicted from elements other than the last TLE update",
                    number
                );
            }
        }

        let passage = NewPassage::from_descriptor(number, pass);
        self.store.create(passage).await.map_err(|e| {
            error!("Could not create passage {}: {}", number, e);
            RouterError::Store(e)
        })?;

        info!("Passage {} prepared", number);
        Ok(())
    }

    async fn end_pass(&self) -> Result<(), RouterError> {
        debug!("endPass");
        let flushed = self.store.flush().await.map_err(|e| {
            error!("Could not save passages: {}", e);
            RouterError::Store(e)
        });

        // the refresh runs whether or not the flush went through
        let refreshed = self.predictor.refresh().await.map_err(|e| {
            error!("Could not refresh orbital elements: {}", e);
            RouterError::Refresh(e)
        });

        flushed.and(refreshed)
    }

    async fn receive_frame(
        &self,
        payload: String,
        host: String,
        port: u16,
        timestamp: f64,
    ) -> Result<(), RouterError> {
        debug!(
            "receiveFrame from {}:{} at {}: {}",
            host, port, timestamp, payload
        );
        let payload = parse_hex(&payload).map_err(|e| {
            error!("Dropping frame from {}:{}: {}", host, port, e);
            RouterError::InvalidPayload(e)
        })?;

        let position = self.predictor.position().await.map_err(|e| {
            error!("Could not get satellite position: {}", e);
            RouterError::Prediction(e)
        })?;

        let passage_number = if position.above_horizon() {
            self.current_passage()
        } else {
            NO_PASSAGE
        };

        let frame = Frame {
            timestamp,
            elevation: position.elevation,
            azimuth: position.azimuth,
            distance: position.distance,
            link_id: LinkId::new(host, port),
            passage_number,
            payload,
        };
        self.store.append(frame).await.map_err(|e| {
            error!("Could not add frame to passage {}: {}", passage_number, e);
            RouterError::Store(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::predict::Position;
    use crate::rpc::RpcError;
    use crate::store::{PassageStore, StoreError};

    #[derive(Default)]
    struct FakePredictor {
        elevation: Mutex<f64>,
        fail_position: AtomicBool,
        fail_refresh: AtomicBool,
        refreshes: AtomicUsize,
        position_queries: AtomicUsize,
    }

    impl FakePredictor {
        fn at_elevation(elevation: f64) -> Self {
            let fake = Self::default();
            *fake.elevation.lock().unwrap() = elevation;
            fake
        }
    }

    impl Predictor for FakePredictor {
        async fn position(&self) -> Result<Position, RpcError> {
            self.position_queries.fetch_add(1, Ordering::SeqCst);
            if self.fail_position.load(Ordering::SeqCst) {
                return Err(RpcError::Rejected("getPosition"));
            }
            Ok(Position {
                elevation: *self.elevation.lock().unwrap(),
                azimuth: 123.0,
                distance: 1500.0,
            })
        }

        async fn next_passes(&self, _count: usize) -> Result<Vec<PassDescriptor>, RpcError> {
            Ok(Vec::new())
        }

        async fn refresh(&self) -> Result<(), RpcError> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            if self.fail_refresh.load(Ordering::SeqCst) {
                return Err(RpcError::Rejected("refresh"));
            }
            Ok(())
        }
    }

    fn pass() -> PassDescriptor {
        PassDescriptor {
            ground_track: vec![[10.0, 0.0], [90.0, 45.0]],
            tle_line1: "1 60238U".into(),
            tle_line2: "2 60238".into(),
            sample_times: vec![1000.0, 1500.0],
            aos: 1000.0,
            los: 2000.0,
            start_azimuth: 10.0,
            end_azimuth: 170.0,
            max_elevation: 45.0,
        }
    }

    type TestRouter = Router<Arc<FakePredictor>, Arc<PassageStore>>;

    fn setup(dir: &Path, elevation: f64) -> (TestRouter, Arc<FakePredictor>, Arc<PassageStore>) {
        let predictor = Arc::new(FakePredictor::at_elevation(elevation));
        let store = Arc::new(PassageStore::new(dir.join("data"), 2));
        let router = Router::new(predictor.clone(), store.clone(), 1);
        (router, predictor, store)
    }

    #[tokio::test]
    async fn prepare_numbers_passages_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let (router, _, store) = setup(dir.path(), 20.0);

        router.prepare_pass(pass()).await.unwrap();
        router.prepare_pass(pass()).await.unwrap();

        let numbers: Vec<_> = store.resident().iter().map(|s| s.passage_number).collect();
        assert_eq!(numbers, vec![1, 2]);
        assert_eq!(router.current_passage(), 2);
    }

    #[tokio::test]
    async fn failed_create_still_consumes_the_number() {
        let dir = tempfile::tempdir().unwrap();
        let (router, _, store) = setup(dir.path(), 20.0);

        router.prepare_pass(pass()).await.unwrap();
        router.prepare_pass(pass()).await.unwrap();
        let err = router.prepare_pass(pass()).await.unwrap_err();
        assert!(matches!(
            err,
            RouterError::Store(RpcError::Store(StoreError::Capacity(2)))
        ));
        assert_eq!(router.current_passage(), 3);

        PassageStore::flush(&store).unwrap();
        router.prepare_pass(pass()).await.unwrap();
        let numbers: Vec<_> = store.resident().iter().map(|s| s.passage_number).collect();
        assert_eq!(numbers, vec![4]);
    }

    #[tokio::test]
    async fn frames_above_horizon_join_current_passage() {
        let dir = tempfile::tempdir().unwrap();
        let (router, _, store) = setup(dir.path(), 20.0);
        router.prepare_pass(pass()).await.unwrap();

        router
            .receive_frame("0x86 0xa2 0x40".into(), "10.0.0.5".into(), 8001, 1500.5)
            .await
            .unwrap();

        store
            .with_passage(1, |p| {
                assert_eq!(p.frame_count(), 1);
                let frame = &p.frames()[0];
                assert_eq!(frame.payload, vec![0x86, 0xa2, 0x40]);
                assert_eq!(frame.elevation, 20.0);
                assert_eq!(frame.azimuth, 123.0);
                assert_eq!(frame.distance, 1500.0);
                assert_eq!(frame.timestamp, 1500.5);
                assert_eq!(frame.link_id, LinkId::new("10.0.0.5", 8001));
                assert!(p.link_clients().contains(&LinkId::new("10.0.0.5", 8001)));
            })
            .unwrap();
    }

    #[tokio::test]
    async fn frames_below_horizon_get_no_passage() {
        let dir = tempfile::tempdir().unwrap();
        let (router, _, store) = setup(dir.path(), -3.0);
        router.prepare_pass(pass()).await.unwrap();

        let err = router
            .receive_frame("0x01 0x02".into(), "10.0.0.5".into(), 8001, 1500.0)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RouterError::Store(RpcError::Store(StoreError::NotFound(NO_PASSAGE)))
        ));
        assert_eq!(store.with_passage(1, |p| p.frame_count()), Some(0));
    }

    #[tokio::test]
    async fn malformed_payload_skips_the_position_query() {
        let dir = tempfile::tempdir().unwrap();
        let (router, predictor, _) = setup(dir.path(), 20.0);

        let err = router
            .receive_frame("0x86 zz".into(), "10.0.0.5".into(), 8001, 1500.0)
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::InvalidPayload(_)));
        assert_eq!(predictor.position_queries.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn position_failure_aborts_the_frame() {
        let dir = tempfile::tempdir().unwrap();
        let (router, predictor, store) = setup(dir.path(), 20.0);
        router.prepare_pass(pass()).await.unwrap();
        predictor.fail_position.store(true, Ordering::SeqCst);

        let err = router
            .receive_frame("0x01".into(), "10.0.0.5".into(), 8001, 1500.0)
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::Prediction(_)));
        assert_eq!(store.with_passage(1, |p| p.frame_count()), Some(0));
    }

    #[tokio::test]
    async fn end_pass_flushes_then_refreshes() {
        let dir = tempfile::tempdir().unwrap();
        let (router, predictor, store) = setup(dir.path(), 20.0);
        router.prepare_pass(pass()).await.unwrap();

        router.end_pass().await.unwrap();

        assert!(store.resident().is_empty());
        assert_eq!(predictor.refreshes.load(Ordering::SeqCst), 1);
        let saved = std::fs::read_dir(dir.path().join("data")).unwrap();
        assert_eq!(saved.count(), 1);
    }

    #[tokio::test]
    async fn refresh_failure_keeps_the_flush() {
        let dir = tempfile::tempdir().unwrap();
        let (router, predictor, store) = setup(dir.path(), 20.0);
        router.prepare_pass(pass()).await.unwrap();
        predictor.fail_refresh.store(true, Ordering::SeqCst);

        let err = router.end_pass().await.unwrap_err();
        assert!(matches!(err, RouterError::Refresh(_)));
        assert!(store.resident().is_empty());
    }

    #[tokio::test]
    async fn end_pass_with_nothing_resident_still_refreshes() {
        let dir = tempfile::tempdir().unwrap();
        let (router, predictor, _) = setup(dir.path(), 20.0);

        let err = router.end_pass().await.unwrap_err();
        assert!(matches!(
            err,
            RouterError::Store(RpcError::Store(StoreError::Empty))
        ));
        assert_eq!(predictor.refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn end_pass_reports_flush_failure_over_refresh_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (router, predictor, _) = setup(dir.path(), 20.0);
        predictor.fail_refresh.store(true, Ordering::SeqCst);

        let err = router.end_pass().await.unwrap_err();
        assert!(matches!(err, RouterError::Store(_)));
        assert_eq!(predictor.refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn update_tle_is_forwarded_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let (router, _, store) = setup(dir.path(), 20.0);
        let tle = "ISS (ZARYA)\n\
            1 25544U 98067A   24001.50000000  .00016717  00000+0  10270-3 0  9025\n\
            2 25544  51.6416 247.4627 0006703 130.5360 325.0288 15.72125391563537\n";

        router.update_tle(tle.into()).await.unwrap();
        assert_eq!(store.last_tle().unwrap().tle, tle);
        let (line1, _) = router.last_tle().unwrap();
        assert!(line1.starts_with("1 25544U"));

        router.update_tle("not a tle".into()).await.unwrap();
        assert_eq!(store.last_tle().unwrap().tle, "not a tle");
        assert!(router.last_tle().unwrap().0.starts_with("1 25544U"));
    }
}
