//! `crs-types` – shared vocabulary for the toolpath planning cell.
//!
//! Geometry lives in [`geometry`], joint-space messages in [`motion`]; bus
//! events and the workspace error type are defined here.

pub mod geometry;
pub mod motion;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use geometry::{LookupTime, Pose, Quaternion, StampedTransform, Strip, ToolPath, Transform3D, Vec3};
pub use motion::{
    JointState, PlanResponse, ProcessMotionPlan, ProcessRequest, ToolProcessPath, Trajectory,
    TrajectoryPoint,
};

/// Identifies one trigger-to-playback cycle.
pub type CycleId = Uuid;

/// Unified event wrapper for the in-process event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "crs-runtime::sequencer"
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data routed over the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    /// A trajectory handed to the execution layer.
    Trajectory(Trajectory),
    /// A robot-state feed update.
    JointState(JointState),
    /// Progress of a planning cycle.
    CycleStatus(CycleStatus),
}

/// Completion notifications for a planning cycle.
///
/// The trigger is answered as soon as the request is submitted; everything
/// that happens afterwards is reported here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum CycleStatus {
    Accepted { cycle_id: CycleId, strips: usize },
    /// A trigger arrived while another cycle was running.  Says nothing
    /// about the running cycle.
    TriggerRefused { reason: String },
    /// The cycle ended before a request was sent (toolpath load or
    /// transform lookup failed).
    Aborted { cycle_id: CycleId, reason: String },
    PlanReceived { cycle_id: CycleId, plans: usize },
    PlanningFailed { cycle_id: CycleId, message: String },
    PlaybackComplete { cycle_id: CycleId, emitted: usize },
    PlaybackAborted { cycle_id: CycleId, reason: String },
}

impl CycleStatus {
    /// True for the statuses that end a cycle, after which the orchestrator
    /// is idle again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CycleStatus::Aborted { .. }
                | CycleStatus::PlanningFailed { .. }
                | CycleStatus::PlaybackComplete { .. }
                | CycleStatus::PlaybackAborted { .. }
        )
    }
}

/// Workspace error type.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CrsError {
    #[error("Transform Unavailable from {source_frame} to {dest_frame}: {reason}")]
    TransformUnavailable {
        source_frame: String,
        dest_frame: String,
        reason: String,
    },

    #[error("Frame Mismatch: expected '{expected}', found '{found}'")]
    FrameMismatch { expected: String, found: String },

    #[error("Toolpath Parse Error: {0}")]
    Parse(String),

    #[error("Planning Failed: {0}")]
    PlanningFailed(String),

    #[error("Malformed Plan: {0}")]
    MalformedPlan(String),

    #[error("Channel Error: {0}")]
    Channel(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_roundtrip() {
        let event = Event::new(
            "crs-middleware::robot_state",
            EventPayload::JointState(JointState::at_positions(
                vec!["joint_1".into()],
                vec![0.25],
            )),
        );
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(event.id, back.id);
        assert_eq!(event.source, back.source);
        match back.payload {
            EventPayload::JointState(js) => assert_eq!(js.positions, vec![0.25]),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn cycle_status_is_tagged() {
        let status = CycleStatus::TriggerRefused {
            reason: "busy".into(),
        };
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"status\":\"TriggerRefused\""));
    }

    #[test]
    fn terminal_statuses() {
        let id = Uuid::new_v4();
        assert!(!CycleStatus::Accepted { cycle_id: id, strips: 1 }.is_terminal());
        assert!(!CycleStatus::PlanReceived { cycle_id: id, plans: 1 }.is_terminal());
        assert!(
            !CycleStatus::TriggerRefused {
                reason: "busy".into()
            }
            .is_terminal()
        );
        assert!(
            CycleStatus::Aborted {
                cycle_id: id,
                reason: "no transform".into()
            }
            .is_terminal()
        );
        assert!(
            CycleStatus::PlaybackComplete {
                cycle_id: id,
                emitted: 4
            }
            .is_terminal()
        );
    }

    #[test]
    fn plan_response_constructors() {
        let ok = PlanResponse::success(vec![ProcessMotionPlan::default()]);
        assert!(ok.succeeded);
        assert_eq!(ok.plans.len(), 1);

        let failed = PlanResponse::failure("no IK solution");
        assert!(!failed.succeeded);
        assert!(failed.plans.is_empty());
        assert_eq!(failed.error_message, "no IK solution");
    }

    #[test]
    fn plan_response_defaults_missing_fields() {
        let back: PlanResponse = serde_json::from_str(r#"{"succeeded": false}"#).unwrap();
        assert!(back.plans.is_empty());
        assert!(back.error_message.is_empty());
    }

    #[test]
    fn crs_error_display() {
        let err = CrsError::TransformUnavailable {
            source_frame: "part".into(),
            dest_frame: "world".into(),
            reason: "no path".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Transform Unavailable"));
        assert!(msg.contains("part"));

        let err2 = CrsError::MalformedPlan("plan 0 has no process motions".into());
        assert!(err2.to_string().contains("plan 0"));
    }
}
