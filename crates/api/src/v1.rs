//! First API generation: live feed plus the original plain message handlers.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::get;
use maildrop_fanout::HubHandle;
use maildrop_message::{CapturedMessage, MessageId};
use maildrop_store::MessageStore;
use tracing::debug;

use crate::error::{Error, Result};
use crate::faults::FaultInjector;
use crate::paging::Paging;
use crate::ws;

#[derive(Clone)]
struct V1State {
    hub: HubHandle,
    store: Arc<dyn MessageStore>,
    faults: FaultInjector,
}

pub(crate) fn router(hub: HubHandle, store: Arc<dyn MessageStore>, faults: FaultInjector) -> Router {
    Router::new()
        .route("/api/v1/{namespace}/websocket", get(websocket))
        .route("/api/v1/messages", get(messages).delete(delete_all))
        .route("/api/v1/messages/{id}", get(message).delete(delete_one))
        .with_state(V1State { hub, store, faults })
}

async fn websocket(
    State(state): State<V1State>,
    Path(namespace): Path<String>,
    upgrade: WebSocketUpgrade,
) -> Result<Response> {
    ws::subscribe(&state.hub, namespace, upgrade)
}

async fn messages(
    State(state): State<V1State>,
    Query(paging): Query<Paging>,
) -> Result<Json<Vec<CapturedMessage>>> {
    debug!("[v1] listing messages");
    state.faults.apply().await?;

    let items = state.store.list(paging.start(), paging.limit()).await?;
    Ok(Json(items))
}

async fn message(
    State(state): State<V1State>,
    Path(id): Path<String>,
) -> Result<Json<CapturedMessage>> {
    state.faults.apply().await?;

    let id = MessageId::from(id);
    match state.store.get(&id).await? {
        Some(found) => Ok(Json(found)),
        None => Err(Error::Store(maildrop_store::Error::NotFound(id))),
    }
}

async fn delete_one(State(state): State<V1State>, Path(id): Path<String>) -> Result<StatusCode> {
    state.faults.apply().await?;

    state.store.delete(&MessageId::from(id)).await?;
    Ok(StatusCode::OK)
}

async fn delete_all(State(state): State<V1State>) -> Result<StatusCode> {
    state.faults.apply().await?;

    state.store.delete_all().await?;
    Ok(StatusCode::OK)
}
