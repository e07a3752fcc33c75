//! Assembles the [`ProcessRequest`] sent to the planner.

use crs_types::{JointState, Pose, ProcessRequest, ToolPath, ToolProcessPath};
use serde::{Deserialize, Serialize};

/// Fixed tool parameters for every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Link the toolpath poses refer to.
    pub tool_link: String,
    /// Nominal surface speed, m/s.
    pub tool_speed: f64,
    pub approach_dist: f64,
    pub retreat_dist: f64,
    /// Name given to the process path in the request.
    pub path_name: String,
    /// Tool-center offset from `tool_link`.
    pub tool_offset: Pose,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            tool_link: "sander_center_link".to_string(),
            tool_speed: 0.4,
            approach_dist: 0.05,
            retreat_dist: 0.05,
            path_name: "toolpath".to_string(),
            tool_offset: Pose::identity(),
        }
    }
}

/// Builds planning requests from a world-frame path and a robot-state
/// snapshot.  Pure: the same inputs always give the same request.
#[derive(Debug, Clone, Default)]
pub struct ProcessRequestBuilder {
    tool: ToolConfig,
}

impl ProcessRequestBuilder {
    pub fn new(tool: ToolConfig) -> Self {
        Self { tool }
    }

    pub fn tool(&self) -> &ToolConfig {
        &self.tool
    }

    /// Build the request for `world_path`.
    ///
    /// Start and end configuration are both `robot_state`: the cell returns
    /// to where it started once the process is done.
    pub fn build(&self, world_path: ToolPath, robot_state: &JointState) -> ProcessRequest {
        ProcessRequest {
            tool_link: self.tool.tool_link.clone(),
            tool_speed: self.tool.tool_speed,
            approach_dist: self.tool.approach_dist,
            retreat_dist: self.tool.retreat_dist,
            start_position: robot_state.clone(),
            end_position: robot_state.clone(),
            tool_offset: self.tool.tool_offset,
            process_paths: vec![ToolProcessPath {
                name: self.tool.path_name.clone(),
                rasters: world_path.strips,
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crs_types::{Quaternion, Strip, Vec3};

    fn world_path() -> ToolPath {
        ToolPath::new(vec![
            Strip::new("world", vec![Pose::identity(); 4]),
            Strip::new("world", vec![Pose::identity(); 2]),
        ])
    }

    #[test]
    fn tool_parameters_round_trip() {
        let tool = ToolConfig {
            tool_link: "spindle_tip".into(),
            tool_speed: 0.25,
            approach_dist: 0.02,
            retreat_dist: 0.03,
            tool_offset: Pose::new(Vec3::new(0.0, 0.0, 0.1), Quaternion::from_yaw(0.5)),
            path_name: "deck".into(),
        };
        let req = ProcessRequestBuilder::new(tool.clone()).build(world_path(), &JointState::default());

        assert_eq!(req.tool_link, tool.tool_link);
        assert_eq!(req.tool_speed, tool.tool_speed);
        assert_eq!(req.approach_dist, tool.approach_dist);
        assert_eq!(req.retreat_dist, tool.retreat_dist);
        assert_eq!(req.tool_offset, tool.tool_offset);
        assert_eq!(req.process_paths[0].name, "deck");
    }

    #[test]
    fn start_and_end_are_the_same_snapshot() {
        let state = JointState::at_positions(vec!["j1".into(), "j2".into()], vec![0.1, 0.2]);
        let req = ProcessRequestBuilder::default().build(world_path(), &state);
        assert_eq!(req.start_position, state);
        assert_eq!(req.end_position, state);
    }

    #[test]
    fn strips_are_carried_in_order() {
        let req = ProcessRequestBuilder::default().build(world_path(), &JointState::default());
        assert_eq!(req.process_paths.len(), 1);
        let lens: Vec<usize> = req.process_paths[0].rasters.iter().map(Strip::len).collect();
        assert_eq!(lens, vec![4, 2]);
    }

    #[test]
    fn defaults_describe_the_sanding_tool() {
        let tool = ToolConfig::default();
        assert_eq!(tool.tool_link, "sander_center_link");
        assert_eq!(tool.tool_speed, 0.4);
        assert_eq!(tool.tool_offset, Pose::identity());
    }

    #[test]
    fn build_is_deterministic() {
        let builder = ProcessRequestBuilder::default();
        let state = JointState::at_positions(vec!["j1".into()], vec![0.3]);
        assert_eq!(builder.build(world_path(), &state), builder.build(world_path(), &state));
    }
}
