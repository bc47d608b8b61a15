use crate::config::Config;
use crate::server::{HttpServer, SharedState};
use crate::telemetry::Metrics;
use bee_inference::{Classifier, OrtClassifier, Preprocessor};

use std::{error::Error, sync::Arc};
use tokio::{signal, sync::broadcast};

pub async fn start_app(config: Config) -> Result<(), Box<dyn Error>> {
    let preprocessor = Arc::new(Preprocessor::new(config.model.target_shape()));
    let classifier = Arc::new(OrtClassifier::new(config.model.clone()));

    let loader = classifier.clone();
    match tokio::task::spawn_blocking(move || loader.load()).await? {
        Ok(()) => tracing::info!("Bee classification API started. Model is loaded."),
        Err(e) => tracing::warn!(
            "Bee classification API started, but the model did not load: {}",
            e
        ),
    }

    let metrics = match Metrics::new() {
        Ok(metrics) => Arc::new(metrics),
        Err(e) => {
            tracing::error!("Failed to initialize metrics: {:?}", e);
            return Err(e.into());
        }
    };

    let state = SharedState::new(
        classifier as Arc<dyn Classifier>,
        preprocessor,
        config.session.clone(),
        metrics,
    )
    .with_admin_reload(config.server.admin_reload);
    let server = HttpServer::new(state, &config.server.get_address()).await?;

    let (shutdown_tx, _) = broadcast::channel(1);
    let server_shutdown_rx = shutdown_tx.subscribe();

    let server_handle = server.run(server_shutdown_rx).await?;

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown.");

    let _ = shutdown_tx.send(());
    server_handle.await??;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
