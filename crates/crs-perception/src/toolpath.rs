//! Toolpath sources.
//!
//! A toolpath file is a JSON document holding raster strips of poses:
//!
//! ```json
//! {
//!   "strips": [
//!     [ { "position": [0.0, 0.0, 0.0], "orientation": [1.0, 0.0, 0.0, 0.0] },
//!       { "position": [0.1, 0.0, 0.0] } ],
//!     [ { "position": [0.1, 0.05, 0.0] } ]
//!   ]
//! }
//! ```
//!
//! Orientation is `[w, x, y, z]`, optional (identity when absent) and
//! normalised on load.  The file carries no frame; the caller names it.

use std::fs;
use std::path::{Path, PathBuf};

use crs_types::{CrsError, Pose, Quaternion, Strip, ToolPath, Vec3};
use serde::Deserialize;
use tracing::info;

/// Yields raw pose strips for a named toolpath.
pub trait ToolpathSource: Send + Sync {
    /// Load `path_identifier` with every strip tagged as `frame_name`.
    ///
    /// # Errors
    ///
    /// [`CrsError::Parse`] when the toolpath cannot be read or is malformed.
    fn load(&self, path_identifier: &str, frame_name: &str) -> Result<ToolPath, CrsError>;
}

#[derive(Deserialize)]
struct RawToolpath {
    strips: Vec<Vec<RawPose>>,
}

#[derive(Deserialize)]
struct RawPose {
    position: [f64; 3],
    #[serde(default = "identity_wxyz")]
    orientation: [f64; 4],
}

fn identity_wxyz() -> [f64; 4] {
    [1.0, 0.0, 0.0, 0.0]
}

/// Parse the JSON toolpath format into a [`ToolPath`] in `frame_name`.
pub fn parse_toolpath(raw: &str, frame_name: &str) -> Result<ToolPath, CrsError> {
    let parsed: RawToolpath =
        serde_json::from_str(raw).map_err(|e| CrsError::Parse(format!("invalid toolpath JSON: {e}")))?;

    let mut strips = Vec::with_capacity(parsed.strips.len());
    for (s, raw_strip) in parsed.strips.into_iter().enumerate() {
        let mut poses = Vec::with_capacity(raw_strip.len());
        for (p, raw_pose) in raw_strip.into_iter().enumerate() {
            if raw_pose.position.iter().chain(&raw_pose.orientation).any(|v| !v.is_finite()) {
                return Err(CrsError::Parse(format!(
                    "strip {s} pose {p} contains a non-finite value"
                )));
            }
            let [x, y, z] = raw_pose.position;
            let [qw, qx, qy, qz] = raw_pose.orientation;
            let orientation = Quaternion::new(qw, qx, qy, qz);
            if orientation.norm() <= f64::EPSILON {
                return Err(CrsError::Parse(format!(
                    "strip {s} pose {p} has a zero-length orientation"
                )));
            }
            poses.push(Pose::new(Vec3::new(x, y, z), orientation.normalized()));
        }
        strips.push(Strip::new(frame_name, poses));
    }
    Ok(ToolPath::new(strips))
}

/// Reads toolpath files from disk, optionally relative to a root directory.
#[derive(Debug, Clone, Default)]
pub struct JsonToolpathLoader {
    root: Option<PathBuf>,
}

impl JsonToolpathLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative identifiers against `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, path_identifier: &str) -> PathBuf {
        let path = Path::new(path_identifier);
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl ToolpathSource for JsonToolpathLoader {
    fn load(&self, path_identifier: &str, frame_name: &str) -> Result<ToolPath, CrsError> {
        let file = self.resolve(path_identifier);
        let raw = fs::read_to_string(&file)
            .map_err(|e| CrsError::Parse(format!("failed to read {}: {e}", file.display())))?;
        let path = parse_toolpath(&raw, frame_name)?;
        info!(
            file = %file.display(),
            frame = frame_name,
            strips = path.strips.len(),
            poses = path.pose_count(),
            "loaded toolpath"
        );
        Ok(path)
    }
}

/// A fixed toolpath held in memory; the identifier is ignored.
#[derive(Debug, Clone)]
pub struct InMemoryToolpath {
    path: ToolPath,
}

impl InMemoryToolpath {
    pub fn new(path: ToolPath) -> Self {
        Self { path }
    }
}

impl ToolpathSource for InMemoryToolpath {
    fn load(&self, _path_identifier: &str, frame_name: &str) -> Result<ToolPath, CrsError> {
        Ok(ToolPath::new(
            self.path
                .strips
                .iter()
                .map(|s| Strip::new(frame_name, s.poses.clone()))
                .collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_STRIPS: &str = r#"{
        "strips": [
            [ { "position": [0.0, 0.0, 0.0], "orientation": [2.0, 0.0, 0.0, 0.0] },
              { "position": [0.1, 0.0, 0.0] } ],
            [ { "position": [0.1, 0.05, 0.0] } ]
        ]
    }"#;

    #[test]
    fn parses_strips_in_order() {
        let path = parse_toolpath(TWO_STRIPS, "part").unwrap();
        assert_eq!(path.shape(), vec![2, 1]);
        assert!(path.strips.iter().all(|s| s.frame_id == "part"));
        assert!((path.strips[0].poses[1].position.x - 0.1).abs() < 1e-12);
    }

    #[test]
    fn orientation_is_normalised_and_defaulted() {
        let path = parse_toolpath(TWO_STRIPS, "part").unwrap();
        assert_eq!(path.strips[0].poses[0].orientation, Quaternion::identity());
        assert_eq!(path.strips[0].poses[1].orientation, Quaternion::identity());
    }

    #[test]
    fn malformed_json_is_parse_error() {
        let err = parse_toolpath(r#"{"strips": [[{"position": [0.0]}]]}"#, "part").unwrap_err();
        assert!(matches!(err, CrsError::Parse(_)));
    }

    #[test]
    fn zero_orientation_is_parse_error() {
        let raw = r#"{"strips": [[{"position": [0,0,0], "orientation": [0,0,0,0]}]]}"#;
        let err = parse_toolpath(raw, "part").unwrap_err();
        assert!(err.to_string().contains("zero-length"));
    }

    #[test]
    fn loader_reads_relative_to_root() {
        let dir = tempfile::tempdir().expect("tmp dir");
        fs::write(dir.path().join("job.json"), TWO_STRIPS).expect("write");

        let loader = JsonToolpathLoader::with_root(dir.path());
        let path = loader.load("job.json", "part").unwrap();
        assert_eq!(path.pose_count(), 3);
    }

    #[test]
    fn loader_missing_file_is_parse_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let loader = JsonToolpathLoader::with_root(dir.path());
        let err = loader.load("missing.json", "part").unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }

    #[test]
    fn bundled_demo_job_loads() {
        let root = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../..");
        let path = JsonToolpathLoader::with_root(root)
            .load("demos/job_90degrees.json", "part")
            .unwrap();
        assert_eq!(path.shape(), vec![11; 6]);
        // The last three strips run at 90 degrees to the first three.
        let yaw = path.strips[3].poses[0].orientation;
        assert!(yaw.approx_eq(Quaternion::from_yaw(std::f64::consts::FRAC_PI_2), 1e-6));
    }

    #[test]
    fn in_memory_source_relabels_frame() {
        let src = InMemoryToolpath::new(parse_toolpath(TWO_STRIPS, "anything").unwrap());
        let path = src.load("ignored", "part").unwrap();
        assert_eq!(path.frame_id(), Some("part"));
        assert_eq!(path.shape(), vec![2, 1]);
    }
}
