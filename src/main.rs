use classroom_engagement::api;
use classroom_engagement::camera::snapshot::SnapshotCamera;
use classroom_engagement::config;
use classroom_engagement::detector::remote::RemoteDetector;
use classroom_engagement::sampler::CameraSampler;
use classroom_engagement::state::EngagementStore;
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};
use tracing::Level;

fn init_tracing(level: &str) {
    let level = level.parse::<Level>().unwrap_or(Level::INFO);
    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load_default()?;
    init_tracing(&config.logging.level);
    tracing::info!(
        config_path = config::DEFAULT_CONFIG_PATH,
        app = %config.app.name,
        "classroom-engagement starting"
    );

    let mut store = EngagementStore::new();
    store.on_level_change(|level| {
        tracing::info!(level = %level, "Engagement level changed");
    });
    let reader = store.reader();
    let state = Arc::new(RwLock::new(store));

    let camera = SnapshotCamera::new(config.snapshot_path());
    let detector = RemoteDetector::new(config.detector_endpoints(), config.detector_timeout());
    tracing::info!(
        snapshot = %camera.path().display(),
        endpoints = ?config.detector_endpoints(),
        "Camera and detector configured"
    );
    let sampler = Arc::new(CameraSampler::new(
        camera,
        detector,
        state,
        config.sampler_settings(),
    ));

    let starter = {
        let sampler = Arc::clone(&sampler);
        tokio::spawn(async move {
            if let Err(err) = sampler.start().await {
                tracing::warn!(error = %err, "Engagement sampling unavailable");
            }
        })
    };

    let app = api::router(reader);
    let port = config.server_port();
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "API server listening");
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    starter.abort();
    sampler.stop();
    served?;
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(err) => {
            tracing::error!(error = %err, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}

