//! HTTP surface for the webhook receiver.
//!
//! Exposes `POST {path}` for lifecycle events and `GET /health`. Emitted
//! records are handed to a [`RecordSink`]; the response status is the most
//! severe outcome across all subscriptions.

use crate::{NormalizedRecord, ReceiveOutcome, ReceiverConfig, Result, WebhookReceiver};
use async_trait::async_trait;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Destination for emitted records
#[async_trait]
pub trait RecordSink: Send + Sync + 'static {
    async fn publish(&self, record: NormalizedRecord);
}

/// Forwards records into a bounded channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::Sender<NormalizedRecord>,
}

impl ChannelSink {
    pub fn new(sender: mpsc::Sender<NormalizedRecord>) -> Self {
        Self { sender }
    }

    /// Create a sink together with its receiving half
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<NormalizedRecord>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self::new(sender), receiver)
    }
}

#[async_trait]
impl RecordSink for ChannelSink {
    async fn publish(&self, record: NormalizedRecord) {
        let event_id = record.event.event_id();
        if self.sender.send(record).await.is_err() {
            warn!(%event_id, "record consumer has gone away, dropping record");
        }
    }
}

/// Response body for a webhook request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveSummary {
    pub emitted: usize,
    pub dropped: usize,
    /// One reason per rejected subscription
    pub rejected: Vec<String>,
}

impl ReceiveSummary {
    /// Tally outcomes and pick the response status
    pub fn from_outcomes(outcomes: &[ReceiveOutcome]) -> (StatusCode, Self) {
        let mut summary = Self::default();
        let mut worst: Option<&ReceiveOutcome> = None;

        for outcome in outcomes {
            match outcome {
                ReceiveOutcome::Emitted(_) => summary.emitted += 1,
                ReceiveOutcome::Dropped => summary.dropped += 1,
                ReceiveOutcome::Rejected(rejection) => {
                    summary.rejected.push(rejection.reason().to_string())
                }
            }
            if worst.is_none_or(|w| severity(outcome) > severity(w)) {
                worst = Some(outcome);
            }
        }

        let status = worst.map_or(200, ReceiveOutcome::status_code);
        (
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            summary,
        )
    }
}

// 401 outranks 400 outranks 200
fn severity(outcome: &ReceiveOutcome) -> u8 {
    match outcome.status_code() {
        401 => 2,
        400 => 1,
        _ => 0,
    }
}

#[derive(Clone)]
struct ServerState {
    receiver: Arc<WebhookReceiver>,
    sink: Arc<dyn RecordSink>,
}

/// Build the router for a receiver configuration
pub fn router(config: ReceiverConfig, sink: impl RecordSink) -> Result<Router> {
    let path = config.path.clone();
    let body_limit = config.max_payload_size;
    let state = ServerState {
        receiver: Arc::new(WebhookReceiver::new(config)?),
        sink: Arc::new(sink),
    };

    Ok(Router::new()
        .route(&path, post(receive_webhook))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state))
}

/// Bind to the configured address and serve until Ctrl-C or SIGTERM
pub async fn serve(config: ReceiverConfig, sink: impl RecordSink) -> Result<()> {
    let listener = TcpListener::bind(config.bind).await?;
    serve_listener(listener, config, sink, shutdown_signal()).await
}

/// Serve on an already bound listener until `shutdown` resolves
pub async fn serve_listener(
    listener: TcpListener,
    config: ReceiverConfig,
    sink: impl RecordSink,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let path = config.path.clone();
    let app = router(config, sink)?;

    info!(addr = %listener.local_addr()?, %path, "webhook receiver listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("webhook receiver stopped");
    Ok(())
}

async fn receive_webhook(
    State(state): State<ServerState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<ReceiveSummary>) {
    let headers: HashMap<String, String> = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    let outcomes = state.receiver.receive_configured(&body, &headers);
    let (status, summary) = ReceiveSummary::from_outcomes(&outcomes);

    for outcome in outcomes {
        if let ReceiveOutcome::Emitted(record) = outcome {
            state.sink.publish(record).await;
        }
    }

    (status, Json(summary))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
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

    info!("shutdown signal received");
}
