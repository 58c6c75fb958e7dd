//! Fault-injection configuration for exercising clients against a flaky
//! backend. The active policy has a single owner, [`FaultInjector`]; request
//! handlers receive it through router state and go through its read and
//! replace methods rather than any shared global.

use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use crate::error::{Error, Result};

/// Faults applied to API request handling while a policy is active.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FaultPolicy {
    /// Artificial delay added before a handler runs, in milliseconds.
    #[serde(default)]
    pub response_delay_ms: u64,

    /// Probability in `[0, 1]` that a request is rejected outright.
    #[serde(default)]
    pub reject_chance: f64,
}

/// Owner of the active fault policy.
#[derive(Clone, Debug, Default)]
pub struct FaultInjector {
    policy: Arc<RwLock<Option<FaultPolicy>>>,
}

impl FaultInjector {
    /// Create an injector with no active policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The currently active policy, if any.
    pub async fn current(&self) -> Option<FaultPolicy> {
        self.policy.read().await.clone()
    }

    /// Activate a policy. Returns `false` if one is already active.
    pub async fn install(&self, policy: FaultPolicy) -> bool {
        let mut active = self.policy.write().await;
        if active.is_some() {
            return false;
        }

        info!(?policy, "fault policy installed");
        *active = Some(policy);
        true
    }

    /// Replace the active policy. Returns `false` if none is active.
    pub async fn replace(&self, policy: FaultPolicy) -> bool {
        let mut active = self.policy.write().await;
        if active.is_none() {
            return false;
        }

        info!(?policy, "fault policy replaced");
        *active = Some(policy);
        true
    }

    /// Deactivate the policy. Returns `false` if none was active.
    pub async fn clear(&self) -> bool {
        let cleared = self.policy.write().await.take().is_some();
        if cleared {
            info!("fault policy cleared");
        }
        cleared
    }

    /// Apply the active policy to one request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FaultRejected`] when the policy rejects the request.
    pub(crate) async fn apply(&self) -> Result<()> {
        let Some(policy) = self.current().await else {
            return Ok(());
        };

        if policy.response_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(policy.response_delay_ms)).await;
        }

        if policy.reject_chance > 0.0 && rand::random::<f64>() < policy.reject_chance {
            return Err(Error::FaultRejected);
        }

        Ok(())
    }
}

/// Routes for managing the fault policy.
pub(crate) fn router(injector: FaultInjector) -> Router {
    Router::new()
        .route(
            "/api/v2/faults",
            get(current).post(install).put(replace).delete(clear),
        )
        .with_state(injector)
}

async fn current(State(injector): State<FaultInjector>) -> Response {
    match injector.current().await {
        Some(policy) => Json(policy).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn install(
    State(injector): State<FaultInjector>,
    Json(policy): Json<FaultPolicy>,
) -> StatusCode {
    if injector.install(policy).await {
        StatusCode::CREATED
    } else {
        StatusCode::BAD_REQUEST
    }
}

async fn replace(
    State(injector): State<FaultInjector>,
    Json(policy): Json<FaultPolicy>,
) -> StatusCode {
    if injector.replace(policy).await {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn clear(State(injector): State<FaultInjector>) -> StatusCode {
    if injector.clear().await {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}
