//! Third API generation: namespace-scoped listing through the storage
//! namespace capability, plus the live feed.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::routing::get;
use maildrop_fanout::HubHandle;
use maildrop_store::MessageStore;
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::faults::FaultInjector;
use crate::paging::{MessagePage, Paging};
use crate::ws;

#[derive(Clone)]
struct V3State {
    hub: HubHandle,
    store: Arc<dyn MessageStore>,
    faults: FaultInjector,
}

#[derive(Debug, Serialize)]
struct NamespaceCount {
    count: usize,
}

pub(crate) fn router(hub: HubHandle, store: Arc<dyn MessageStore>, faults: FaultInjector) -> Router {
    Router::new()
        .route("/api/v3/{namespace}/websocket", get(websocket))
        .route("/api/v3/{namespace}/messages", get(messages))
        .route("/api/v3/{namespace}/messages/count", get(count))
        .with_state(V3State { hub, store, faults })
}

async fn websocket(
    State(state): State<V3State>,
    Path(namespace): Path<String>,
    upgrade: WebSocketUpgrade,
) -> Result<Response> {
    ws::subscribe(&state.hub, namespace, upgrade)
}

async fn messages(
    State(state): State<V3State>,
    Path(namespace): Path<String>,
    Query(paging): Query<Paging>,
) -> Result<Json<MessagePage>> {
    debug!(%namespace, "[v3] listing namespace messages");
    state.faults.apply().await?;

    if namespace.trim().is_empty() {
        return Err(Error::BlankNamespace);
    }

    let scoped = state.store.namespaced()?;
    let items = scoped
        .list_namespace(&namespace, paging.start(), paging.limit())
        .await?;
    let total = state.store.count().await?;

    Ok(Json(MessagePage::new(total, paging.start(), items)))
}

async fn count(
    State(state): State<V3State>,
    Path(namespace): Path<String>,
) -> Result<Json<NamespaceCount>> {
    state.faults.apply().await?;

    if namespace.trim().is_empty() {
        return Err(Error::BlankNamespace);
    }

    let scoped = state.store.namespaced()?;
    let count = scoped.count_namespace(&namespace).await?;

    Ok(Json(NamespaceCount { count }))
}
