//! Joint-space messages exchanged with the planning service and the
//! execution layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geometry::{Pose, Strip};

/// Latest observed joint configuration of the robot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JointState {
    pub stamp: Option<DateTime<Utc>>,
    pub names: Vec<String>,
    pub positions: Vec<f64>,
    #[serde(default)]
    pub velocities: Vec<f64>,
    #[serde(default)]
    pub efforts: Vec<f64>,
}

impl JointState {
    /// A state stamped now with only names and positions filled in.
    pub fn at_positions(names: Vec<String>, positions: Vec<f64>) -> Self {
        Self {
            stamp: Some(Utc::now()),
            names,
            positions,
            velocities: Vec::new(),
            efforts: Vec::new(),
        }
    }
}

/// One timed joint configuration inside a [`Trajectory`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub positions: Vec<f64>,
    #[serde(default)]
    pub velocities: Vec<f64>,
    pub time_from_start_s: f64,
}

/// An ordered sequence of timed joint configurations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub joint_names: Vec<String>,
    pub points: Vec<TrajectoryPoint>,
}

impl Trajectory {
    pub fn new(joint_names: Vec<String>, points: Vec<TrajectoryPoint>) -> Self {
        Self {
            joint_names,
            points,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// `time_from_start_s` of the final point, `0.0` when empty.
    pub fn duration_s(&self) -> f64 {
        self.points.last().map_or(0.0, |p| p.time_from_start_s)
    }
}

/// A named ordered list of world-frame strips handed to the planner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolProcessPath {
    pub name: String,
    pub rasters: Vec<Strip>,
}

/// Everything the planning service needs to plan one process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessRequest {
    pub tool_link: String,
    /// Nominal tool speed along the surface, m/s.
    pub tool_speed: f64,
    pub approach_dist: f64,
    pub retreat_dist: f64,
    pub start_position: JointState,
    pub end_position: JointState,
    /// Tool-center offset relative to `tool_link`.
    pub tool_offset: Pose,
    pub process_paths: Vec<ToolProcessPath>,
}

/// Planned motion for one [`ToolProcessPath`].
///
/// `free_motions[i]` moves from the end of `process_motions[i]` to the start
/// of `process_motions[i + 1]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessMotionPlan {
    pub start: Trajectory,
    pub process_motions: Vec<Trajectory>,
    pub free_motions: Vec<Trajectory>,
    pub end: Trajectory,
}

/// Reply from the planning service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanResponse {
    pub succeeded: bool,
    #[serde(default)]
    pub plans: Vec<ProcessMotionPlan>,
    #[serde(default)]
    pub error_message: String,
}

impl PlanResponse {
    pub fn success(plans: Vec<ProcessMotionPlan>) -> Self {
        Self {
            succeeded: true,
            plans,
            error_message: String::new(),
        }
    }

    pub fn failure(error_message: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            plans: Vec::new(),
            error_message: error_message.into(),
        }
    }
}
