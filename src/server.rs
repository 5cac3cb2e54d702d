use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::{RwLock, watch};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::dispatch::{Dispatcher, JobTemplate};
use crate::observability::{Metrics, MetricsSnapshot};
use crate::progress::{KeyLayout, ProgressStore};
use crate::reconcile::{ReconcileReport, ReconcileSettings, Reconciler};
use crate::storage::StorageClient;
use crate::streams::{ConfigCache, StreamSource};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Summary of the most recent pass
#[derive(Debug, Clone, Serialize)]
pub struct PassSummary {
    pub finished_at: DateTime<Utc>,
    pub units: usize,
    pub dispatched: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PassSummary {
    fn from_report(report: &ReconcileReport) -> Self {
        Self {
            finished_at: Utc::now(),
            units: report.units.len(),
            dispatched: report.dispatched(),
            failed: report.failed(),
            error: None,
        }
    }

    fn from_error(error: String) -> Self {
        Self {
            finished_at: Utc::now(),
            units: 0,
            dispatched: 0,
            failed: 0,
            error: Some(error),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub reconciler: Reconciler,
    pub source: Arc<StreamSource>,
    pub cache: ConfigCache,
    pub metrics: Arc<Metrics>,
    pub last_pass: Arc<RwLock<Option<PassSummary>>>,
}

impl AppState {
    /// Wire storage, dispatch and the stream source from configuration
    pub fn from_config(config: Config) -> Result<Self, AnyError> {
        let storage = StorageClient::from_config(&config.storage)
            .map_err(|e| format!("Failed to initialize storage: {}", e))?;
        let layout = KeyLayout::new(
            config.storage.prefix.clone(),
            config.storage.marker_suffix.clone(),
        );
        let dispatcher = Dispatcher::from_config(&config.dispatch)
            .map_err(|e| format!("Failed to initialize dispatcher: {}", e))?;
        let source = StreamSource::from_config(&config.streams)
            .map_err(|e| format!("Failed to initialize stream source: {}", e))?;

        let template = JobTemplate {
            bucket: config.storage.bucket.clone(),
            destination_mode: config.dispatch.destination_mode.clone(),
            callback_type: config.dispatch.callback_type.clone(),
        };

        let metrics = Arc::new(Metrics::new());
        let reconciler = Reconciler::new(
            ProgressStore::new(storage, layout),
            dispatcher,
            template,
            config.dispatch.default_format.clone(),
            ReconcileSettings::from_config(&config),
        )
        .with_metrics(metrics.clone());

        Ok(Self::new(config, reconciler, source))
    }

    pub fn new(config: Config, reconciler: Reconciler, source: StreamSource) -> Self {
        Self {
            config: Arc::new(config),
            metrics: reconciler.metrics().clone(),
            reconciler,
            source: Arc::new(source),
            cache: ConfigCache::new(),
            last_pass: Arc::new(RwLock::new(None)),
        }
    }

    /// Run one pass and remember its summary
    pub async fn run_pass(&self) -> Option<ReconcileReport> {
        match self.reconciler.run(&self.source, &self.cache).await {
            Ok(report) => {
                info!(
                    units = report.units.len(),
                    dispatched = report.dispatched(),
                    failed = report.failed(),
                    "Reconcile pass finished"
                );
                *self.last_pass.write().await = Some(PassSummary::from_report(&report));
                Some(report)
            }
            Err(e) => {
                error!(error = %e, "Reconcile pass aborted");
                *self.last_pass.write().await = Some(PassSummary::from_error(e.to_string()));
                None
            }
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serve `/health` and reconcile every `server.interval` until shutdown
pub async fn run(config: Config, address: Option<SocketAddr>) -> Result<(), AnyError> {
    let address = address.unwrap_or(config.server.bind_addr);
    let interval = config.server.interval.as_duration();
    let state = AppState::from_config(config)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let ticker = tokio::spawn(reconcile_loop(state.clone(), interval, shutdown_rx));

    let listener = TcpListener::bind(address).await?;
    info!(%address, ?interval, "Tapedeck listening");

    axum::serve(listener, router(state).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = ticker.await {
        warn!(error = %e, "Reconcile loop ended abnormally");
    }

    Ok(())
}

async fn reconcile_loop(state: AppState, period: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                state.run_pass().await;
            }
            _ = shutdown.changed() => {
                info!("Reconcile loop stopping");
                break;
            }
        }
    }
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

#[derive(Serialize)]
struct StatusResponse {
    metrics: MetricsSnapshot,
    last_pass: Option<PassSummary>,
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        metrics: state.metrics.snapshot(),
        last_pass: state.last_pass.read().await.clone(),
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
