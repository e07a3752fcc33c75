//! Cell configuration – reads/writes `~/.crs/config.toml`.

use crs_runtime::{OrchestratorConfig, PlaybackTiming, ToolConfig};
use crs_types::{LookupTime, Quaternion, Transform3D, Vec3};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// A fixed edge of the transform tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticTransform {
    pub parent: String,
    pub child: String,
    /// Metres, `[x, y, z]`.
    #[serde(default)]
    pub translation: [f64; 3],
    /// Unit quaternion, `[w, x, y, z]`.
    #[serde(default = "identity_rotation")]
    pub rotation: [f64; 4],
}

impl StaticTransform {
    pub fn transform(&self) -> Transform3D {
        let [x, y, z] = self.translation;
        let [qw, qx, qy, qz] = self.rotation;
        Transform3D::new(Vec3::new(x, y, z), Quaternion::new(qw, qx, qy, qz).normalized())
    }
}

/// Settings for the in-process planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub latency_ms: u64,
    pub points_per_metre: f64,
    /// Joint names of the simulated robot.
    pub joint_names: Vec<String>,
    /// Configuration published as the initial robot state.
    pub home_positions: Vec<f64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            latency_ms: 250,
            points_per_metre: 100.0,
            joint_names: (1..=6).map(|i| format!("joint_{i}")).collect(),
            home_positions: vec![0.0; 6],
        }
    }
}

/// Persisted configuration stored in `~/.crs/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Raster JSON file loaded on every trigger.
    #[serde(default = "default_toolpath_file")]
    pub toolpath_file: String,

    /// Frame the toolpath file is authored in.
    #[serde(default = "default_toolpath_frame")]
    pub toolpath_frame: String,

    /// Frame the planner works in.
    #[serde(default = "default_world_frame")]
    pub world_frame: String,

    #[serde(default)]
    pub tool: ToolConfig,

    #[serde(default)]
    pub playback: PlaybackTiming,

    #[serde(default = "default_static_transforms")]
    pub static_transforms: Vec<StaticTransform>,

    #[serde(default)]
    pub sim: SimConfig,
}

fn default_toolpath_file() -> String {
    "demos/job_90degrees.json".to_string()
}
fn default_toolpath_frame() -> String {
    "part".to_string()
}
fn default_world_frame() -> String {
    "world".to_string()
}
fn identity_rotation() -> [f64; 4] {
    [1.0, 0.0, 0.0, 0.0]
}
fn default_static_transforms() -> Vec<StaticTransform> {
    vec![StaticTransform {
        parent: default_world_frame(),
        child: default_toolpath_frame(),
        translation: [0.8, 0.0, 0.4],
        rotation: identity_rotation(),
    }]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            toolpath_file: default_toolpath_file(),
            toolpath_frame: default_toolpath_frame(),
            world_frame: default_world_frame(),
            tool: ToolConfig::default(),
            playback: PlaybackTiming::default(),
            static_transforms: default_static_transforms(),
            sim: SimConfig::default(),
        }
    }
}

impl Config {
    /// Orchestrator settings derived from this file.
    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            toolpath_id: self.toolpath_file.clone(),
            toolpath_frame: self.toolpath_frame.clone(),
            world_frame: self.world_frame.clone(),
            lookup_time: LookupTime::Latest,
            tool: self.tool.clone(),
            timing: self.playback,
        }
    }
}

/// Return the path to `~/.crs/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".crs").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `CRS_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `CRS_TOOLPATH_FILE` | `toolpath_file` |
/// | `CRS_WORLD_FRAME` | `world_frame` |
/// | `CRS_TOOL_SPEED` | `tool.tool_speed` |
/// | `CRS_PLAYBACK_UNIT_MS` | `playback.unit_ms` |
///
/// Unparseable numbers are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("CRS_TOOLPATH_FILE") {
        cfg.toolpath_file = v;
    }
    if let Ok(v) = std::env::var("CRS_WORLD_FRAME") {
        cfg.world_frame = v;
    }
    if let Ok(v) = std::env::var("CRS_TOOL_SPEED")
        && let Ok(speed) = v.parse::<f64>()
        && speed > 0.0
    {
        cfg.tool.tool_speed = speed;
    }
    if let Ok(v) = std::env::var("CRS_PLAYBACK_UNIT_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.playback.unit_ms = ms;
    }
}

/// Write the config, creating `~/.crs/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))
}
