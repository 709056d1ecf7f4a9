use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal, sync::watch};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use greenhouse_monitor::{
    api::{self, AppState},
    config::Config,
    db::{self, PgStore, ReadingStore},
    display::{DisplayBoard, Reconciler},
    history::HistoryService,
    ingest::IngestService,
    liveness::{LivenessActor, LivenessTracker},
    mqtt::{HeartbeatRouter, MqttSubscriber, TopicPattern},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present; env vars may also be set externally
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    let topic: TopicPattern = config
        .mqtt
        .topic
        .parse()
        .context("MQTT_TOPIC is not a usable topic pattern")?;

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    info!("Database ready");

    let store: Arc<dyn ReadingStore> = Arc::new(PgStore::new(pool));
    let history = HistoryService::new(store.clone(), config.history_default_days);
    let ingest = IngestService::new(store);
    let board = DisplayBoard::new();

    let tracker = LivenessTracker::new(
        chrono::Duration::milliseconds(config.liveness_timeout_ms as i64),
        config.offline_notify,
    );
    let (actor, liveness) =
        LivenessActor::new(tracker, Duration::from_millis(config.liveness_tick_ms));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let reconciler = Reconciler::new(board.clone(), history.clone());
    let reconciler_task = tokio::spawn(reconciler.run(liveness.clone(), shutdown_rx.clone()));
    let liveness_task = tokio::spawn(actor.run(shutdown_rx.clone()));

    // Every known greenhouse is shown and evaluated from the start, so a
    // silent one falls back to its stored data on the first tick.
    match history.sites().await {
        Ok(sites) => {
            for site in &sites {
                board.register(site).await;
                liveness.watch(&site.id).await;
            }
            info!(count = sites.len(), "Greenhouses registered");
        }
        Err(e) => warn!(error = %e, "Could not load greenhouses; dashboard starts empty"),
    }

    let router = HeartbeatRouter::new(topic, liveness.clone(), ingest.clone());
    let mqtt_task = tokio::spawn(MqttSubscriber::new(&config.mqtt, router).run(shutdown_rx));

    let state = AppState {
        history,
        ingest,
        board,
        liveness,
    };

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "HTTP server listening");

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop background loops and wait for them to release the timer and the
    // broker connection.
    let _ = shutdown_tx.send(true);
    for (name, task) in [
        ("mqtt", mqtt_task),
        ("liveness", liveness_task),
        ("reconciler", reconciler_task),
    ] {
        if let Err(e) = task.await {
            warn!(task = name, error = %e, "Background task ended abnormally");
        }
    }

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
