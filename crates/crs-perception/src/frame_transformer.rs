//! Re-expresses a whole [`ToolPath`] in another frame.
//!
//! Strip count, strip order and per-strip pose order are preserved exactly;
//! only the coordinates and the strip frame labels change.

use crs_types::{CrsError, LookupTime, StampedTransform, Strip, ToolPath};
use tracing::debug;

use crate::transform::TransformProvider;

/// Apply `transform` to every pose of every strip in `path`.
///
/// # Errors
///
/// [`CrsError::FrameMismatch`] if any strip is not expressed in
/// `transform.source_frame`.
pub fn transform_path(path: &ToolPath, transform: &StampedTransform) -> Result<ToolPath, CrsError> {
    let strips = path
        .strips
        .iter()
        .map(|strip| {
            if strip.frame_id != transform.source_frame {
                return Err(CrsError::FrameMismatch {
                    expected: transform.source_frame.clone(),
                    found: strip.frame_id.clone(),
                });
            }
            Ok(Strip::new(
                transform.dest_frame.clone(),
                strip
                    .poses
                    .iter()
                    .map(|pose| transform.transform.apply_pose(pose))
                    .collect(),
            ))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ToolPath::new(strips))
}

/// The single frame every strip of `path` is expressed in.
///
/// Returns `Ok(None)` for an empty path.
pub fn common_frame(path: &ToolPath) -> Result<Option<&str>, CrsError> {
    let Some(first) = path.frame_id() else {
        return Ok(None);
    };
    if let Some(odd) = path.strips.iter().find(|s| s.frame_id != first) {
        return Err(CrsError::FrameMismatch {
            expected: first.to_string(),
            found: odd.frame_id.clone(),
        });
    }
    Ok(Some(first))
}

/// Look up the transform from the path's frame into `dest_frame` and apply
/// it.  Nothing is produced unless every step succeeds.
pub fn resolve_and_transform(
    provider: &dyn TransformProvider,
    path: &ToolPath,
    dest_frame: &str,
    time: LookupTime,
) -> Result<ToolPath, CrsError> {
    let Some(source_frame) = common_frame(path)? else {
        return Ok(ToolPath::default());
    };
    let transform = provider.lookup(source_frame, dest_frame, time)?;
    debug!(
        source = source_frame,
        dest = dest_frame,
        strips = path.strips.len(),
        poses = path.pose_count(),
        "transforming toolpath"
    );
    transform_path(path, &transform)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::TfEngine;
    use chrono::Utc;
    use crs_types::{Pose, Quaternion, Transform3D, Vec3};
    use std::f64::consts::FRAC_PI_2;

    fn raster(frame: &str, shape: &[usize]) -> ToolPath {
        ToolPath::new(
            shape
                .iter()
                .enumerate()
                .map(|(row, &n)| {
                    Strip::new(
                        frame,
                        (0..n)
                            .map(|i| {
                                Pose::new(
                                    Vec3::new(i as f64 * 0.01, row as f64 * 0.05, 0.0),
                                    Quaternion::from_yaw(0.1 * i as f64),
                                )
                            })
                            .collect(),
                    )
                })
                .collect(),
        )
    }

    fn stamped(t: Transform3D) -> StampedTransform {
        StampedTransform::new("part", "world", Utc::now(), t)
    }

    fn assert_same(a: &ToolPath, b: &ToolPath) {
        assert_eq!(a.shape(), b.shape());
        for (sa, sb) in a.strips.iter().zip(&b.strips) {
            for (pa, pb) in sa.poses.iter().zip(&sb.poses) {
                assert!(pa.approx_eq(pb, 1e-9), "{pa:?} != {pb:?}");
            }
        }
    }

    #[test]
    fn preserves_shape_for_any_raster() {
        let t = stamped(Transform3D::new(Vec3::new(0.3, -1.0, 0.8), Quaternion::from_yaw(1.2)));
        for shape in [vec![], vec![1], vec![0, 4], vec![7, 3, 12, 1]] {
            let path = raster("part", &shape);
            let out = transform_path(&path, &t).unwrap();
            assert_eq!(out.shape(), shape);
            assert!(out.strips.iter().all(|s| s.frame_id == "world"));
        }
    }

    #[test]
    fn identity_leaves_poses_unchanged() {
        let path = raster("part", &[5, 5]);
        let out = transform_path(&path, &stamped(Transform3D::identity())).unwrap();
        assert_same(&path, &out);
    }

    #[test]
    fn identity_is_idempotent_on_transformed_path() {
        let path = raster("part", &[4, 6, 2]);
        let world = transform_path(
            &path,
            &stamped(Transform3D::new(Vec3::new(1.0, 2.0, 3.0), Quaternion::from_yaw(0.4))),
        )
        .unwrap();
        let again = transform_path(
            &world,
            &StampedTransform::new("world", "world", Utc::now(), Transform3D::identity()),
        )
        .unwrap();
        assert_same(&world, &again);
    }

    #[test]
    fn keeps_pose_order_within_strip() {
        let path = raster("part", &[10]);
        let t = stamped(Transform3D::new(Vec3::new(5.0, 0.0, 0.0), Quaternion::identity()));
        let out = transform_path(&path, &t).unwrap();
        let xs: Vec<f64> = out.strips[0].poses.iter().map(|p| p.position.x).collect();
        assert!(xs.windows(2).all(|w| w[0] < w[1]));
        assert!((xs[0] - 5.0).abs() < 1e-9);
    }

    #[test]
    fn rotates_orientation_with_position() {
        let path = raster("part", &[1, 1]);
        let t = stamped(Transform3D::new(Vec3::zero(), Quaternion::from_yaw(FRAC_PI_2)));
        let out = transform_path(&path, &t).unwrap();
        // Row 1 starts at y = 0.05 in the part frame; a quarter turn moves it to -x.
        let p = out.strips[1].poses[0];
        assert!((p.position.x + 0.05).abs() < 1e-9);
        assert!(p.orientation.approx_eq(Quaternion::from_yaw(FRAC_PI_2), 1e-9));
    }

    #[test]
    fn input_is_not_mutated() {
        let path = raster("part", &[3]);
        let before = path.clone();
        let _ = transform_path(
            &path,
            &stamped(Transform3D::new(Vec3::new(1.0, 1.0, 1.0), Quaternion::identity())),
        )
        .unwrap();
        assert_eq!(path, before);
    }

    #[test]
    fn wrong_source_frame_is_rejected() {
        let path = raster("fixture", &[2]);
        let err = transform_path(&path, &stamped(Transform3D::identity())).unwrap_err();
        assert!(matches!(err, CrsError::FrameMismatch { .. }));
    }

    #[test]
    fn mixed_frames_are_rejected_before_lookup() {
        let mut path = raster("part", &[2, 2]);
        path.strips[1].frame_id = "fixture".into();
        let tf = TfEngine::new();
        let err = resolve_and_transform(&tf, &path, "world", LookupTime::Latest).unwrap_err();
        assert_eq!(
            err,
            CrsError::FrameMismatch {
                expected: "part".into(),
                found: "fixture".into()
            }
        );
    }

    #[test]
    fn resolve_uses_provider() {
        let mut tf = TfEngine::new();
        tf.set_static_transform(
            "world",
            "part",
            Transform3D::new(Vec3::new(0.0, 0.0, 0.9), Quaternion::identity()),
        );
        let path = raster("part", &[3, 3]);
        let out = resolve_and_transform(&tf, &path, "world", LookupTime::Latest).unwrap();
        assert_eq!(out.shape(), vec![3, 3]);
        assert!(out.strips[0].poses.iter().all(|p| (p.position.z - 0.9).abs() < 1e-9));
    }

    #[test]
    fn resolve_propagates_missing_transform() {
        let tf = TfEngine::new();
        let path = raster("part", &[3]);
        let err = resolve_and_transform(&tf, &path, "world", LookupTime::Latest).unwrap_err();
        assert!(matches!(err, CrsError::TransformUnavailable { .. }));
    }

    #[test]
    fn resolve_empty_path_needs_no_lookup() {
        let tf = TfEngine::new();
        let out = resolve_and_transform(&tf, &ToolPath::default(), "world", LookupTime::Latest)
            .unwrap();
        assert!(out.strips.is_empty());
    }
}
