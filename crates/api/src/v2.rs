//! Second API generation: live feed, paged message listing, and the fault
//! policy endpoints.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::routing::get;
use maildrop_fanout::HubHandle;
use maildrop_store::MessageStore;
use tracing::debug;

use crate::error::Result;
use crate::faults::{self, FaultInjector};
use crate::paging::{MessagePage, Paging};
use crate::ws;

#[derive(Clone)]
struct V2State {
    hub: HubHandle,
    store: Arc<dyn MessageStore>,
    faults: FaultInjector,
}

pub(crate) fn router(hub: HubHandle, store: Arc<dyn MessageStore>, faults: FaultInjector) -> Router {
    Router::new()
        .route("/api/v2/{namespace}/websocket", get(websocket))
        .route("/api/v2/messages", get(messages))
        .with_state(V2State {
            hub,
            store,
            faults: faults.clone(),
        })
        .merge(faults::router(faults))
}

async fn websocket(
    State(state): State<V2State>,
    Path(namespace): Path<String>,
    upgrade: WebSocketUpgrade,
) -> Result<Response> {
    ws::subscribe(&state.hub, namespace, upgrade)
}

async fn messages(
    State(state): State<V2State>,
    Query(paging): Query<Paging>,
) -> Result<Json<MessagePage>> {
    debug!("[v2] listing messages");
    state.faults.apply().await?;

    let total = state.store.count().await?;
    let items = state.store.list(paging.start(), paging.limit()).await?;
    Ok(Json(MessagePage::new(total, paging.start(), items)))
}
