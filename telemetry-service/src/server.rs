//! HTTP surface: SSE notification groups, consumption report, Prometheus.

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use futures::{Stream, StreamExt};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use serde::Deserialize;
use time::UtcOffset;
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};

use crate::{
    aggregation::{AggregationEngine, Site, SiteConsumptionReport},
    broadcast::{ChannelHub, Notification},
    scheduler::local_now,
    store::RollupStore,
};

static PROM_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

pub struct AppState<R> {
    pub hub: Arc<ChannelHub>,
    pub aggregation: AggregationEngine<R>,
    pub sites: Arc<Vec<Site>>,
    pub utc_offset: UtcOffset,
    pub default_group: String,
}

impl<R> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self {
            hub: Arc::clone(&self.hub),
            aggregation: self.aggregation.clone(),
            sites: Arc::clone(&self.sites),
            utc_offset: self.utc_offset,
            default_group: self.default_group.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GroupQuery {
    group: Option<String>,
}

pub fn router<R>(state: AppState<R>) -> Router
where
    R: RollupStore + 'static,
{
    Router::new()
        .route("/notifications", get(notifications::<R>))
        .route("/api/consumption", get(consumption::<R>))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Installs the global Prometheus recorder once; later calls are no-ops.
pub fn install_metrics_recorder() -> anyhow::Result<()> {
    if PROM_HANDLE.get().is_some() {
        return Ok(());
    }
    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);
    Ok(())
}

pub fn spawn(bind_addr: &str, app: Router) -> anyhow::Result<tokio::task::JoinHandle<()>> {
    let addr: SocketAddr = bind_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid http.bind_addr {bind_addr}: {e}"))?;

    Ok(tokio::spawn(async move {
        match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => {
                tracing::info!(%addr, "http server listening");
                if let Err(e) = axum::serve(listener, app.into_make_service()).await {
                    tracing::error!(error = %e, "http server error");
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to bind http listener");
            }
        }
    }))
}

async fn notifications<R>(
    State(state): State<AppState<R>>,
    Query(query): Query<GroupQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, StatusCode>
where
    R: RollupStore + 'static,
{
    let group = query.group.unwrap_or_else(|| state.default_group.clone());
    if group != state.default_group {
        tracing::debug!(group = %group, "unknown channel group requested");
        return Err(StatusCode::NOT_FOUND);
    }
    let rx = state.hub.subscribe(&group).map_err(|e| {
        tracing::error!(error = %e, group = %group, "joining channel group failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    metrics::counter!("sse_connections_total").increment(1);
    tracing::debug!(group = %group, "client joined channel group");

    Ok(Sse::new(event_stream(rx).map(Ok)).keep_alive(KeepAlive::default()))
}

/// SSE events for a group membership. Notifications a slow client missed are skipped.
fn event_stream(rx: broadcast::Receiver<Arc<Notification>>) -> impl Stream<Item = Event> {
    BroadcastStream::new(rx).filter_map(|item| async move {
        match item {
            Ok(notification) => match Event::default()
                .event(&notification.event)
                .json_data(&notification.payload)
            {
                Ok(event) => Some(event),
                Err(e) => {
                    tracing::warn!(error = %e, event = %notification.event, "encoding sse event failed");
                    None
                }
            },
            Err(BroadcastStreamRecvError::Lagged(missed)) => {
                metrics::counter!("sse_notifications_lagged_total").increment(missed);
                tracing::debug!(missed, "sse client lagging, notifications skipped");
                None
            }
        }
    })
}

async fn consumption<R>(
    State(state): State<AppState<R>>,
) -> Result<Json<Vec<SiteConsumptionReport>>, StatusCode>
where
    R: RollupStore + 'static,
{
    let reference = local_now(state.utc_offset);
    match state.aggregation.consumption_report(&state.sites, reference).await {
        Ok(report) => Ok(Json(report)),
        Err(e) => {
            tracing::warn!(error = %e, "consumption report failed");
            if e.is_unavailable() {
                Err(StatusCode::SERVICE_UNAVAILABLE)
            } else {
                Err(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

async fn metrics_handler() -> Result<String, StatusCode> {
    PROM_HANDLE
        .get()
        .map(PrometheusHandle::render)
        .ok_or(StatusCode::NOT_FOUND)
}
