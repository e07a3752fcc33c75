//! Asynchronous request/response channel to the motion planner.
//!
//! [`PlanningClient::submit`] hands a [`ProcessRequest`] to a
//! [`PlanningService`] on a Tokio task and returns a [`PlanHandle`]
//! straight away.  When the service answers, the caller's continuation runs
//! exactly once with the [`PlanResponse`].
//!
//! There is no retry and no timeout.  A transport error is turned into a
//! failed response; a service that never answers never runs the
//! continuation.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use crs_types::{CrsError, PlanResponse, ProcessRequest};
use tokio::task::JoinHandle;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

/// The external motion planner.
#[async_trait]
pub trait PlanningService: Send + Sync {
    /// Plan `request`.
    ///
    /// `Ok` with `succeeded == false` is a planning failure reported by the
    /// planner; `Err` means the request never got an answer (transport
    /// failure).
    async fn plan(&self, request: ProcessRequest) -> Result<PlanResponse, CrsError>;
}

/// Submits planning requests without blocking the caller.
#[derive(Clone)]
pub struct PlanningClient {
    service: Arc<dyn PlanningService>,
}

impl PlanningClient {
    pub fn new(service: Arc<dyn PlanningService>) -> Self {
        Self { service }
    }

    /// Send `request` and return immediately.
    ///
    /// `on_complete` is awaited on the spawned task once the response is in.
    /// Must be called from within a Tokio runtime.
    pub fn submit<F, Fut>(&self, request: ProcessRequest, on_complete: F) -> PlanHandle
    where
        F: FnOnce(PlanResponse) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = Uuid::new_v4();
        let service = Arc::clone(&self.service);
        let paths = request.process_paths.len();
        let span = info_span!("plan_request", request_id = %id);

        info!(request_id = %id, paths, tool = %request.tool_link, "submitting process plan request");

        let task = tokio::spawn(
            async move {
                let response = match service.plan(request).await {
                    Ok(response) => response,
                    Err(e) => {
                        warn!(error = %e, "planning service unreachable");
                        PlanResponse::failure(e.to_string())
                    }
                };
                let succeeded = response.succeeded;
                info!(succeeded, plans = response.plans.len(), "plan response received");
                on_complete(response).await;
                succeeded
            }
            .instrument(span),
        );

        PlanHandle { id, task }
    }
}

/// Tracks one outstanding request.
pub struct PlanHandle {
    id: Uuid,
    task: JoinHandle<bool>,
}

impl PlanHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// True once the response arrived and the continuation has returned.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the continuation to finish; yields the response's
    /// `succeeded` flag.
    pub async fn join(self) -> Result<bool, CrsError> {
        self.task
            .await
            .map_err(|e| CrsError::Channel(format!("plan request {} task failed: {e}", self.id)))
    }
}
