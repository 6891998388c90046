use std::sync::Arc;

use axum::{routing::get, routing::post, Router};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::api::predict::{self as predict_handlers, PredictState};
use super::api::router::{self as router_handlers, HttpRouter};
use super::api::store as store_handlers;
use super::api_doc::{PredictApiDoc, RouterApiDoc, StoreApiDoc};
use crate::shutdown::Shutdown;
use crate::store::PassageStore;

fn swagger_ui(doc: utoipa::openapi::OpenApi) -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", doc)
}

pub fn store_app(store: Arc<PassageStore>) -> Router {
    Router::new()
        .route("/rpc/store/create", post(store_handlers::create))
        .route("/rpc/store/append", post(store_handlers::append))
        .route("/rpc/store/flush", post(store_handlers::flush))
        .route("/rpc/store/update_tle", post(store_handlers::update_tle))
        .route("/rpc/store/resident", get(store_handlers::resident))
        .route("/rpc/store/tle", get(store_handlers::tle))
        .merge(swagger_ui(StoreApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .with_state(store)
}

pub fn router_app(router: Arc<HttpRouter>) -> Router {
    Router::new()
        .route("/rpc/router/update_tle", post(router_handlers::update_tle))
        .route(
            "/rpc/router/prepare_pass",
            post(router_handlers::prepare_pass),
        )
        .route("/rpc/router/end_pass", post(router_handlers::end_pass))
        .route(
            "/rpc/router/receive_frame",
            post(router_handlers::receive_frame),
        )
        .merge(swagger_ui(RouterApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .with_state(router)
}

pub fn predictor_app(state: PredictState) -> Router {
    Router::new()
        .route("/rpc/predict/position", get(predict_handlers::position))
        .route("/rpc/predict/passes", get(predict_handlers::passes))
        .route("/rpc/predict/refresh", post(predict_handlers::refresh))
        .merge(swagger_ui(PredictApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves `app` on `listener` until shutdown.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    mut shutdown: Shutdown,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        log::info!("Starting server on {}", addr);
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::predict::{GroundStation, PassDescriptor, PredictorSettings, SgpPredictor};
    use crate::rpc::{
        PassageSink, Predictor, PredictorClient, RouterApi, RouterClient, RpcError, StoreClient,
    };
    use crate::shutdown::{self, ShutdownTrigger};
    use crate::store::{Frame, LinkId, NewPassage};

    const TIMEOUT: Duration = Duration::from_secs(10);

    async fn spawn(app: Router, shutdown: Shutdown) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, app, shutdown));
        format!("http://{}", addr)
    }

    struct StoreServer {
        store: Arc<PassageStore>,
        client: StoreClient,
        url: String,
        _trigger: ShutdownTrigger,
    }

    async fn store_server(dir: &Path) -> StoreServer {
        let (trigger, shutdown) = shutdown::channel();
        let store = Arc::new(PassageStore::new(dir.join("data"), 4));
        let url = spawn(store_app(store.clone()), shutdown).await;
        StoreServer {
            store,
            client: StoreClient::new(&url, TIMEOUT).unwrap(),
            url,
            _trigger: trigger,
        }
    }

    fn predictor() -> Arc<SgpPredictor> {
        let station = GroundStation::from_coordinates("38.7314, -9.3024", 0.0).unwrap();
        Arc::new(SgpPredictor::new(station, None, PredictorSettings::default()).unwrap())
    }

    fn pass() -> PassDescriptor {
        PassDescriptor {
            ground_track: vec![[10.0, 0.0], [90.0, 45.0], [170.0, 0.0]],
            tle_line1: "1 60238U".into(),
            tle_line2: "2 60238".into(),
            sample_times: vec![1000.0, 1500.0, 2000.0],
            aos: 1000.0,
            los: 2000.0,
            start_azimuth: 10.0,
            end_azimuth: 170.0,
            max_elevation: 45.0,
        }
    }

    #[tokio::test]
    async fn store_lifecycle_over_http() {
        let dir = tempfile::tempdir().unwrap();
        let server = store_server(dir.path()).await;
        let (store, client) = (&server.store, &server.client);

        client
            .create(NewPassage::from_descriptor(1, pass()))
            .await
            .unwrap();
        for byte in 0..3u8 {
            let frame = Frame {
                timestamp: 1500.0,
                elevation: 30.0,
                azimuth: 100.0,
                distance: 800.0,
                link_id: LinkId::new("10.0.0.5", 8001),
                passage_number: 1,
                payload: vec![0x86, byte],
            };
            client.append(frame).await.unwrap();
        }

        let resident = client.resident().await.unwrap();
        assert_eq!(resident.len(), 1);
        assert_eq!(resident[0].frame_count, 3);
        assert_eq!(resident[0].link_count, 1);

        assert!(client.last_tle().await.unwrap().is_none());
        client.update_tle("1 a\n2 b".into()).await.unwrap();
        assert_eq!(store.last_tle().unwrap().tle, "1 a\n2 b");
        assert_eq!(client.last_tle().await.unwrap().unwrap().tle, "1 a\n2 b");

        client.flush().await.unwrap();
        assert!(store.resident().is_empty());
        assert!(dir
            .path()
            .join("data/1970-01-01_00:16:40_45_3.json")
            .exists());

        assert!(matches!(client.flush().await, Err(RpcError::Rejected("flush"))));
    }

    #[tokio::test]
    async fn store_rejects_duplicates_and_bad_schema() {
        let dir = tempfile::tempdir().unwrap();
        let server = store_server(dir.path()).await;
        let (store, client) = (&server.store, &server.client);

        client
            .create(NewPassage::from_descriptor(3, pass()))
            .await
            .unwrap();
        assert!(matches!(
            client.create(NewPassage::from_descriptor(3, pass())).await,
            Err(RpcError::Rejected("create"))
        ));

        let raw = reqwest::Client::new();
        let url = format!("{}/rpc/store/create", server.url);
        let mut body = serde_json::to_value(NewPassage::from_descriptor(4, pass())).unwrap();
        body["extra"] = json!(1);
        let accepted: bool = raw
            .post(&url)
            .json(&body)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(!accepted);
        assert_eq!(store.resident().len(), 1);
    }

    #[tokio::test]
    async fn router_drives_the_store_over_http() {
        let dir = tempfile::tempdir().unwrap();
        let server = store_server(dir.path()).await;
        let store = server.store.clone();

        let (_predictor_trigger, predictor_shutdown) = shutdown::channel();
        let predictor_url = spawn(
            predictor_app(PredictState {
                predictor: predictor(),
                router: None,
            }),
            predictor_shutdown,
        )
        .await;

        let (_router_trigger, router_shutdown) = shutdown::channel();
        let router = Arc::new(crate::router::Router::new(
            PredictorClient::new(&predictor_url, TIMEOUT).unwrap(),
            server.client.clone(),
            1,
        ));
        let router_url = spawn(router_app(router.clone()), router_shutdown).await;
        let client = RouterClient::new(&router_url, TIMEOUT).unwrap();

        client.prepare_pass(pass()).await.unwrap();
        assert_eq!(store.resident()[0].passage_number, 1);

        assert!(client
            .receive_frame("0xzz".into(), "10.0.0.5".into(), 8001, 1500.0)
            .await
            .is_err());

        client.end_pass().await.unwrap();
        assert!(store.resident().is_empty());
    }

    #[tokio::test]
    async fn router_rejects_malformed_bodies() {
        let dir = tempfile::tempdir().unwrap();
        let server = store_server(dir.path()).await;
        let (_trigger, shutdown) = shutdown::channel();
        let router = Arc::new(crate::router::Router::new(
            PredictorClient::new("http://127.0.0.1:9", TIMEOUT).unwrap(),
            server.client.clone(),
            1,
        ));
        let url = spawn(router_app(router), shutdown).await;

        let raw = reqwest::Client::new();
        let accepted: bool = raw
            .post(format!("{}/rpc/router/receive_frame", url))
            .json(&json!({"payload": 5}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(!accepted);

        let mut reversed = serde_json::to_value(pass()).unwrap();
        reversed["los"] = json!(10.0);
        let accepted: bool = raw
            .post(format!("{}/rpc/router/prepare_pass", url))
            .json(&reversed)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(!accepted);
    }

    #[tokio::test]
    async fn predictor_over_http() {
        let (_trigger, shutdown) = shutdown::channel();
        let url = spawn(
            predictor_app(PredictState {
                predictor: predictor(),
                router: None,
            }),
            shutdown,
        )
        .await;
        let client = PredictorClient::new(&url, Duration::from_secs(60)).unwrap();

        let position = client.position().await.unwrap();
        assert!((-90.0..=90.0).contains(&position.elevation));
        assert!(position.distance > 0.0);

        let passes = client.next_passes(2).await.unwrap();
        assert!(passes.len() <= 2);
        assert!(passes.iter().all(|p| p.validate().is_ok()));

        client.refresh().await.unwrap();
    }

    #[tokio::test]
    async fn servers_stop_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let (trigger, shutdown) = shutdown::channel();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let store = Arc::new(PassageStore::new(dir.path().to_path_buf(), 1));
        let task = tokio::spawn(serve(listener, store_app(store), shutdown));

        trigger.trigger();
        tokio::time::timeout(TIMEOUT, task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}
