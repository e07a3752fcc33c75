//! [`Orchestrator`] – one trigger, one planning cycle.
//!
//! ```text
//! Idle ──trigger──▶ AwaitingTransform ──resolved──▶ AwaitingPlan ──succeeded──▶ Playing ──done──▶ Idle
//!                        │ lookup/load failed            │ failed
//!                        ▼                               ▼
//!                       Idle                            Idle
//! ```
//!
//! [`Orchestrator::trigger`] answers as soon as the request has been
//! submitted.  That answer only means "accepted"; the outcome of planning
//! and playback arrives later as [`CycleStatus`] events on
//! [`Topic::CycleStatus`].  A trigger that arrives while a cycle is running
//! is refused with [`CycleStatus::TriggerRefused`], which does not end the
//! running cycle.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crs_middleware::{
    EventBus, PlanningClient, PlanningService, RobotStateCell, Topic, TopicReceiver, TrajectorySink,
};
use crs_perception::frame_transformer::resolve_and_transform;
use crs_perception::{ToolpathSource, TransformProvider};
use crs_types::{CrsError, CycleId, CycleStatus, Event, EventPayload, LookupTime, PlanResponse, ProcessRequest};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::request_builder::{ProcessRequestBuilder, ToolConfig};
use crate::sequencer::{Pacer, PlaybackSequencer, PlaybackTiming};

const SOURCE: &str = "crs-runtime::orchestrator";

/// Where the orchestrator is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    AwaitingTransform,
    AwaitingPlan,
    Playing,
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CycleState::Idle => "idle",
            CycleState::AwaitingTransform => "awaiting transform",
            CycleState::AwaitingPlan => "awaiting plan",
            CycleState::Playing => "playing",
        };
        f.write_str(s)
    }
}

/// Immediate answer to a trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub success: bool,
    pub message: String,
}

impl TriggerResponse {
    fn accepted(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    fn refused(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// What to load and where to put it.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Identifier handed to the [`ToolpathSource`].
    pub toolpath_id: String,
    /// Frame the toolpath is authored in.
    pub toolpath_frame: String,
    /// Frame the planner expects.
    pub world_frame: String,
    pub lookup_time: LookupTime,
    pub tool: ToolConfig,
    pub timing: PlaybackTiming,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            toolpath_id: "demos/job_90degrees.json".to_string(),
            toolpath_frame: "part".to_string(),
            world_frame: "world".to_string(),
            lookup_time: LookupTime::Latest,
            tool: ToolConfig::default(),
            timing: PlaybackTiming::default(),
        }
    }
}

/// External collaborators the orchestrator is wired to.
pub struct Collaborators {
    pub toolpaths: Arc<dyn ToolpathSource>,
    pub transforms: Arc<dyn TransformProvider>,
    pub planner: Arc<dyn PlanningService>,
    pub sink: Arc<dyn TrajectorySink>,
    pub pacer: Arc<dyn Pacer>,
    pub robot_state: RobotStateCell,
    pub bus: Arc<EventBus>,
}

struct Inner {
    config: OrchestratorConfig,
    toolpaths: Arc<dyn ToolpathSource>,
    transforms: Arc<dyn TransformProvider>,
    builder: ProcessRequestBuilder,
    client: PlanningClient,
    sequencer: PlaybackSequencer,
    robot_state: RobotStateCell,
    bus: Arc<EventBus>,
    state: Mutex<CycleState>,
}

/// Drives trigger → transform → plan → playback.  Cheap to clone.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig, parts: Collaborators) -> Self {
        let builder = ProcessRequestBuilder::new(config.tool.clone());
        let sequencer = PlaybackSequencer::new(parts.sink, parts.pacer, config.timing);
        Self {
            inner: Arc::new(Inner {
                config,
                toolpaths: parts.toolpaths,
                transforms: parts.transforms,
                builder,
                client: PlanningClient::new(parts.planner),
                sequencer,
                robot_state: parts.robot_state,
                bus: parts.bus,
                state: Mutex::new(CycleState::Idle),
            }),
        }
    }

    pub fn state(&self) -> CycleState {
        self.inner.current()
    }

    /// Receiver for [`CycleStatus`] events.
    pub fn subscribe_status(&self) -> TopicReceiver {
        self.inner.bus.subscribe_to(Topic::CycleStatus)
    }

    /// Start a cycle.  Must be called from within a Tokio runtime.
    ///
    /// Returns once the planning request is in flight (or the cycle failed
    /// before that).  `success == true` does not mean planning or playback
    /// will succeed.
    pub fn trigger(&self) -> TriggerResponse {
        let inner = &self.inner;
        {
            let mut state = inner.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state != CycleState::Idle {
                let reason = format!("a cycle is already in progress ({})", *state);
                warn!(state = %*state, "trigger rejected");
                drop(state);
                inner.publish_status(CycleStatus::TriggerRefused {
                    reason: reason.clone(),
                });
                return TriggerResponse::refused(reason);
            }
            *state = CycleState::AwaitingTransform;
        }

        let cycle_id = Uuid::new_v4();
        info!(%cycle_id, toolpath = %inner.config.toolpath_id, "trigger received");

        let request = match inner.prepare_request() {
            Ok(request) => request,
            Err(e) => {
                error!(%cycle_id, error = %e, "cycle aborted before planning");
                inner.set(CycleState::Idle);
                inner.publish_status(CycleStatus::Aborted {
                    cycle_id,
                    reason: e.to_string(),
                });
                return TriggerResponse::refused(e.to_string());
            }
        };

        let strips = request
            .process_paths
            .iter()
            .map(|p| p.rasters.len())
            .sum();
        inner.set(CycleState::AwaitingPlan);
        inner.publish_status(CycleStatus::Accepted { cycle_id, strips });

        let continuation = Arc::clone(inner);
        let handle = inner.client.submit(request, move |response| async move {
            continuation.on_plan_response(cycle_id, response).await;
        });
        info!(%cycle_id, request_id = %handle.id(), "process plan requested");

        TriggerResponse::accepted(format!("cycle {cycle_id} accepted; trajectories will be published"))
    }
}

impl Inner {
    fn current(&self) -> CycleState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set(&self, next: CycleState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        info!(from = %*state, to = %next, "cycle state");
        *state = next;
    }

    fn publish_status(&self, status: CycleStatus) {
        let event = Event::new(SOURCE, EventPayload::CycleStatus(status));
        if let Err(e) = self.bus.publish_to(Topic::CycleStatus, event) {
            warn!(error = %e, "failed to publish cycle status");
        }
    }

    /// Load, transform and build.  Synchronous; nothing is sent on failure.
    fn prepare_request(&self) -> Result<ProcessRequest, CrsError> {
        let cfg = &self.config;
        let path = self.toolpaths.load(&cfg.toolpath_id, &cfg.toolpath_frame)?;
        let world_path = resolve_and_transform(
            self.transforms.as_ref(),
            &path,
            &cfg.world_frame,
            cfg.lookup_time,
        )?;
        let snapshot = self.robot_state.snapshot();
        Ok(self.builder.build(world_path, &snapshot))
    }

    async fn on_plan_response(&self, cycle_id: CycleId, response: PlanResponse) {
        if !response.succeeded {
            error!(%cycle_id, message = %response.error_message, "process planning failed");
            self.set(CycleState::Idle);
            self.publish_status(CycleStatus::PlanningFailed {
                cycle_id,
                message: response.error_message,
            });
            return;
        }

        self.set(CycleState::Playing);
        self.publish_status(CycleStatus::PlanReceived {
            cycle_id,
            plans: response.plans.len(),
        });

        let outcome = self.sequencer.play(&response.plans).await;
        self.set(CycleState::Idle);
        match outcome {
            Ok(report) => self.publish_status(CycleStatus::PlaybackComplete {
                cycle_id,
                emitted: report.emitted,
            }),
            Err(e) => {
                error!(%cycle_id, error = %e, "playback aborted");
                self.publish_status(CycleStatus::PlaybackAborted {
                    cycle_id,
                    reason: e.to_string(),
                });
            }
        }
    }
}
