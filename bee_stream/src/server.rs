use crate::{
    config::SessionConfig,
    routes::{admin_routes, api_routes},
    telemetry::Metrics,
};
use axum::Router;
use axum_otel_metrics::HttpMetricsLayerBuilder;
use bee_inference::{Classifier, Preprocess};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::{
    net::TcpListener,
    sync::{broadcast::Receiver, Mutex},
    task::JoinHandle,
};

#[derive(Clone)]
pub struct SharedState {
    pub classifier: Arc<dyn Classifier>,
    pub preprocessor: Arc<dyn Preprocess>,
    pub session_config: SessionConfig,
    pub metrics: Arc<Metrics>,
    pub admin_reload: bool,
    /// Held for the whole of a model reload; at most one runs at a time.
    pub reload_lock: Arc<Mutex<()>>,
    session_counter: Arc<AtomicU64>,
}

impl SharedState {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        preprocessor: Arc<dyn Preprocess>,
        session_config: SessionConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            classifier,
            preprocessor,
            session_config,
            metrics,
            admin_reload: false,
            reload_lock: Arc::new(Mutex::new(())),
            session_counter: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_admin_reload(mut self, enabled: bool) -> Self {
        self.admin_reload = enabled;
        self
    }

    pub fn next_session_id(&self) -> u64 {
        self.session_counter.fetch_add(1, Ordering::Relaxed) + 1
    }
}

pub fn build_router(state: SharedState) -> Router {
    let metrics_layer = HttpMetricsLayerBuilder::new().build();

    let mut router = Router::new().merge(api_routes());
    if state.admin_reload {
        tracing::info!("Admin reload endpoint enabled");
        router = router.merge(admin_routes());
    }

    router.with_state(state).layer(metrics_layer)
}

pub struct HttpServer {
    router: Router,
    listener: TcpListener,
}

impl HttpServer {
    pub async fn new(state: SharedState, addr: &str) -> anyhow::Result<Self> {
        let router = build_router(state);
        let listener = TcpListener::bind(addr).await?;

        Ok(Self { router, listener })
    }

    pub async fn run(
        self,
        shutdown_rx: Receiver<()>,
    ) -> anyhow::Result<JoinHandle<anyhow::Result<()>>> {
        tracing::info!("Starting app on {}", self.listener.local_addr()?);

        let listener = self.listener;
        let router = self.router;
        let server_handle = tokio::spawn({
            let mut shutdown_rx = shutdown_rx.resubscribe();
            async move {
                axum::serve(listener, router)
                    .with_graceful_shutdown(async move {
                        shutdown_rx.recv().await.ok();
                    })
                    .await?;
                Ok(())
            }
        });

        Ok(server_handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use bee_inference::{LoadError, PredictionError, Preprocessor, TargetShape, Tensor};
    use serde_json::{json, Value};
    use std::sync::atomic::AtomicBool;
    use tower::ServiceExt;

    struct ToggleClassifier {
        ready: AtomicBool,
        loadable: bool,
    }

    #[async_trait]
    impl Classifier for ToggleClassifier {
        fn load(&self) -> Result<(), LoadError> {
            if !self.loadable {
                return Err(LoadError::InvalidConfig("no weights".to_string()));
            }
            self.ready.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn is_ready(&self) -> bool {
            self.ready.load(Ordering::SeqCst)
        }

        async fn predict(&self, batch: Vec<Tensor>) -> Result<Vec<f32>, PredictionError> {
            Ok(vec![0.0; batch.len()])
        }
    }

    fn state(ready: bool, loadable: bool) -> SharedState {
        SharedState::new(
            Arc::new(ToggleClassifier {
                ready: AtomicBool::new(ready),
                loadable,
            }),
            Arc::new(Preprocessor::new(TargetShape::default())),
            SessionConfig::default(),
            Arc::new(Metrics::new().unwrap()),
        )
        .with_admin_reload(true)
    }

    async fn call(router: Router, method: &str, uri: &str) -> (StatusCode, Vec<u8>) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn test_health_reports_model_state() {
        let (status, body) = call(build_router(state(true, true)), "GET", "/health").await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body, json!({ "status": "ok", "model_loaded": true }));

        let (_, body) = call(build_router(state(false, true)), "GET", "/health").await;
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["model_loaded"], false);
    }

    #[tokio::test]
    async fn test_reload_loads_model() {
        let shared = state(false, true);

        let (status, body) = call(build_router(shared.clone()), "POST", "/admin/reload").await;

        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["model_loaded"], true);
        assert!(shared.classifier.is_ready());
    }

    #[tokio::test]
    async fn test_reload_failure_is_reported() {
        let shared = state(false, false);

        let (status, body) = call(build_router(shared), "POST", "/admin/reload").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"], "Failed to reload model.");
        assert_eq!(
            body["details"],
            "Invalid model configuration: no weights"
        );
    }

    #[tokio::test]
    async fn test_reload_route_absent_when_disabled() {
        let shared = state(false, true).with_admin_reload(false);

        let (status, _) = call(build_router(shared.clone()), "POST", "/admin/reload").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(!shared.classifier.is_ready());
    }

    #[tokio::test]
    async fn test_reload_rejected_while_another_runs() {
        let shared = state(false, true);
        let _running = shared.reload_lock.clone().try_lock_owned().unwrap();

        let (status, body) = call(build_router(shared.clone()), "POST", "/admin/reload").await;

        assert_eq!(status, StatusCode::CONFLICT);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"], "A model reload is already in progress.");
        assert!(!shared.classifier.is_ready());
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let shared = state(true, true);
        shared.metrics.record_frame();

        let (status, body) = call(build_router(shared), "GET", "/metrics").await;

        assert_eq!(status, StatusCode::OK);
        assert!(String::from_utf8(body).unwrap().contains("frames_received"));
    }

    #[test]
    fn test_session_ids_are_unique() {
        let shared = state(true, true);
        let cloned = shared.clone();

        assert_eq!(shared.next_session_id(), 1);
        assert_eq!(cloned.next_session_id(), 2);
    }
}
