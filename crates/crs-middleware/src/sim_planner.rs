//! In-process stand-in for the motion planner, for demos and CI without a
//! planning backend.
//!
//! [`SimPlanningService`] does no kinematics.  Each pose maps to a joint
//! vector whose first three entries are the pose position (the rest zero),
//! which is enough to produce correctly shaped and timed plans:
//!
//! * one process motion per raster, one point per pose, timed by tool speed;
//! * one freespace motion between consecutive rasters;
//! * a start motion from the start configuration to the first raster and an
//!   end motion from the last raster back to the end configuration.

use std::time::Duration;

use async_trait::async_trait;
use crs_types::{
    CrsError, JointState, PlanResponse, ProcessMotionPlan, ProcessRequest, Strip, ToolProcessPath,
    Trajectory, TrajectoryPoint,
};
use tracing::debug;

use crate::planning::PlanningService;

const DEFAULT_JOINTS: [&str; 6] = [
    "joint_1", "joint_2", "joint_3", "joint_4", "joint_5", "joint_6",
];

/// Joint-space speed used to time simulated freespace moves, rad/s.
const FREESPACE_SPEED: f64 = 0.5;

/// Upper bound on points in one interpolated move.
pub const MAX_INTERPOLATION_POINTS: usize = 10_000;

/// Simulated planning service.
#[derive(Debug, Clone)]
pub struct SimPlanningService {
    latency: Duration,
    points_per_metre: f64,
    forced_failure: Option<String>,
}

impl SimPlanningService {
    pub fn new() -> Self {
        Self {
            latency: Duration::ZERO,
            points_per_metre: 100.0,
            forced_failure: None,
        }
    }

    /// Delay every answer by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Density of freespace/start/end interpolation.
    pub fn with_points_per_metre(mut self, points_per_metre: f64) -> Self {
        self.points_per_metre = points_per_metre.max(1.0);
        self
    }

    /// Answer every request with `succeeded = false` and `message`.
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        self.forced_failure = Some(message.into());
        self
    }

    fn plan_path(&self, request: &ProcessRequest, path: &ToolProcessPath) -> ProcessMotionPlan {
        let names = joint_names(&request.start_position);
        let dof = names.len();

        let process_motions: Vec<Trajectory> = path
            .rasters
            .iter()
            .map(|strip| process_motion(strip, &names, request.tool_speed))
            .collect();

        let free_motions = process_motions
            .windows(2)
            .map(|w| self.interpolate(&names, last_positions(&w[0]), first_positions(&w[1])))
            .collect();

        let home_start = padded(&request.start_position.positions, dof);
        let home_end = padded(&request.end_position.positions, dof);
        let start = match process_motions.first() {
            Some(first) => self.interpolate(&names, home_start, first_positions(first)),
            None => Trajectory::default(),
        };
        let end = match process_motions.last() {
            Some(last) => self.interpolate(&names, last_positions(last), home_end),
            None => Trajectory::default(),
        };

        ProcessMotionPlan {
            start,
            process_motions,
            free_motions,
            end,
        }
    }

    /// Straight joint-space move; point count grows with distance, capped at
    /// [`MAX_INTERPOLATION_POINTS`].
    fn interpolate(&self, names: &[String], from: Vec<f64>, to: Vec<f64>) -> Trajectory {
        let dist = from
            .iter()
            .zip(&to)
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt();
        let wanted = (dist * self.points_per_metre).ceil();
        let n = if wanted.is_finite() {
            (wanted.min(MAX_INTERPOLATION_POINTS as f64) as usize).max(2)
        } else {
            MAX_INTERPOLATION_POINTS
        };
        let duration = (dist / FREESPACE_SPEED).max(0.1);
        let points = (0..n)
            .map(|i| {
                let s = i as f64 / (n - 1) as f64;
                TrajectoryPoint {
                    positions: from.iter().zip(&to).map(|(a, b)| a + (b - a) * s).collect(),
                    velocities: Vec::new(),
                    time_from_start_s: duration * s,
                }
            })
            .collect();
        Trajectory::new(names.to_vec(), points)
    }
}

impl Default for SimPlanningService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlanningService for SimPlanningService {
    async fn plan(&self, request: ProcessRequest) -> Result<PlanResponse, CrsError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if let Some(message) = &self.forced_failure {
            return Ok(PlanResponse::failure(message.clone()));
        }
        if let Some(problem) = validate(&request) {
            return Ok(PlanResponse::failure(problem));
        }

        let plans: Vec<ProcessMotionPlan> = request
            .process_paths
            .iter()
            .map(|path| self.plan_path(&request, path))
            .collect();
        debug!(plans = plans.len(), "simulated plans generated");
        Ok(PlanResponse::success(plans))
    }
}

fn validate(request: &ProcessRequest) -> Option<String> {
    if request.tool_speed <= 0.0 || !request.tool_speed.is_finite() {
        return Some(format!("invalid tool speed {}", request.tool_speed));
    }
    if request.process_paths.is_empty() {
        return Some("request contains no process paths".to_string());
    }
    for path in &request.process_paths {
        if path.rasters.is_empty() {
            return Some(format!("process path '{}' has no rasters", path.name));
        }
        if let Some(i) = path.rasters.iter().position(Strip::is_empty) {
            return Some(format!("raster {i} of process path '{}' is empty", path.name));
        }
    }
    None
}

fn joint_names(state: &JointState) -> Vec<String> {
    if state.names.is_empty() {
        DEFAULT_JOINTS.iter().map(|s| s.to_string()).collect()
    } else {
        state.names.clone()
    }
}

fn padded(values: &[f64], dof: usize) -> Vec<f64> {
    let mut out: Vec<f64> = values.iter().copied().take(dof).collect();
    out.resize(dof, 0.0);
    out
}

fn process_motion(strip: &Strip, names: &[String], tool_speed: f64) -> Trajectory {
    let dof = names.len();
    let mut elapsed = 0.0;
    let mut points = Vec::with_capacity(strip.len());
    for (i, pose) in strip.poses.iter().enumerate() {
        if i > 0 {
            elapsed += strip.poses[i - 1].position.distance(pose.position) / tool_speed;
        }
        let p = pose.position;
        points.push(TrajectoryPoint {
            positions: padded(&[p.x, p.y, p.z], dof),
            velocities: Vec::new(),
            time_from_start_s: elapsed,
        });
    }
    Trajectory::new(names.to_vec(), points)
}

fn first_positions(t: &Trajectory) -> Vec<f64> {
    t.points.first().map(|p| p.positions.clone()).unwrap_or_default()
}

fn last_positions(t: &Trajectory) -> Vec<f64> {
    t.points.last().map(|p| p.positions.clone()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crs_types::{Pose, Quaternion, Vec3};

    fn strip(y: f64, n: usize) -> Strip {
        Strip::new(
            "world",
            (0..n)
                .map(|i| Pose::new(Vec3::new(i as f64 * 0.1, y, 0.5), Quaternion::identity()))
                .collect(),
        )
    }

    fn request(rasters: Vec<Strip>) -> ProcessRequest {
        ProcessRequest {
            tool_link: "sander_center_link".into(),
            tool_speed: 0.4,
            approach_dist: 0.05,
            retreat_dist: 0.05,
            start_position: JointState::default(),
            end_position: JointState::default(),
            tool_offset: Pose::identity(),
            process_paths: vec![ToolProcessPath {
                name: "job".into(),
                rasters,
            }],
        }
    }

    #[tokio::test]
    async fn plan_has_one_freespace_between_each_raster() {
        let sim = SimPlanningService::new();
        let response = sim
            .plan(request(vec![strip(0.0, 5), strip(0.1, 4), strip(0.2, 6)]))
            .await
            .unwrap();
        assert!(response.succeeded);
        let plan = &response.plans[0];
        let lens: Vec<usize> = plan.process_motions.iter().map(Trajectory::len).collect();
        assert_eq!(lens, vec![5, 4, 6]);
        assert_eq!(plan.free_motions.len(), 2);
        assert!(!plan.start.is_empty());
        assert!(!plan.end.is_empty());
    }

    #[tokio::test]
    async fn process_motion_is_timed_by_tool_speed() {
        let sim = SimPlanningService::new();
        let response = sim.plan(request(vec![strip(0.0, 3)])).await.unwrap();
        // Two 0.1 m segments at 0.4 m/s.
        let d = response.plans[0].process_motions[0].duration_s();
        assert!((d - 0.5).abs() < 1e-9, "duration {d}");
    }

    #[tokio::test]
    async fn joints_follow_start_state_names() {
        let sim = SimPlanningService::new();
        let mut req = request(vec![strip(0.0, 2)]);
        req.start_position = JointState::at_positions(vec!["a".into(), "b".into()], vec![0.0, 0.0]);
        let response = sim.plan(req).await.unwrap();
        let plan = &response.plans[0];
        assert_eq!(plan.process_motions[0].joint_names, vec!["a", "b"]);
        assert_eq!(plan.process_motions[0].points[0].positions.len(), 2);
    }

    #[tokio::test]
    async fn empty_raster_fails() {
        let sim = SimPlanningService::new();
        let response = sim.plan(request(vec![strip(0.0, 2), strip(0.1, 0)])).await.unwrap();
        assert!(!response.succeeded);
        assert!(response.error_message.contains("raster 1"));
    }

    #[tokio::test]
    async fn forced_failure_wins() {
        let sim = SimPlanningService::new().with_failure("planner offline");
        let response = sim.plan(request(vec![strip(0.0, 2)])).await.unwrap();
        assert!(!response.succeeded);
        assert_eq!(response.error_message, "planner offline");
    }

    #[test]
    fn interpolation_has_at_least_two_points() {
        let sim = SimPlanningService::new();
        let names = vec!["j".to_string()];
        let t = sim.interpolate(&names, vec![0.0], vec![0.0]);
        assert_eq!(t.len(), 2);
        let t = sim.interpolate(&names, vec![0.0], vec![1.0]);
        assert_eq!(t.len(), 100);
        assert!((t.points[99].positions[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn interpolation_point_count_is_capped() {
        let sim = SimPlanningService::new();
        let names = vec!["j".to_string()];
        let t = sim.interpolate(&names, vec![0.0], vec![1e12]);
        assert_eq!(t.len(), MAX_INTERPOLATION_POINTS);
        assert_eq!(t.points[MAX_INTERPOLATION_POINTS - 1].positions[0], 1e12);

        let t = sim.interpolate(&names, vec![0.0], vec![f64::INFINITY]);
        assert_eq!(t.len(), MAX_INTERPOLATION_POINTS);
    }
}
