//! Rigid-body geometry shared by every crate: vectors, quaternions, poses and
//! the raster containers (`Strip`, `ToolPath`) that toolpaths are made of.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Primitive types
// ────────────────────────────────────────────────────────────────────────────

/// A 3-D translation vector in metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }

    pub fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }

    /// Euclidean distance to `other`.
    pub fn distance(self, other: Self) -> f64 {
        let (dx, dy, dz) = (self.x - other.x, self.y - other.y, self.z - other.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// A unit quaternion representing a 3-D rotation (w, x, y, z convention).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Quaternion {
    /// Create a quaternion.  The caller is responsible for providing a unit
    /// quaternion; see [`Quaternion::normalized`].
    pub fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    /// Rotation of `angle_rad` around the Z axis.
    pub fn from_yaw(angle_rad: f64) -> Self {
        let half = angle_rad / 2.0;
        Self::new(half.cos(), 0.0, 0.0, half.sin())
    }

    /// Hamilton product: `self` applied after `rhs`.
    pub fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        )
    }

    /// Conjugate (== inverse for a unit quaternion).
    pub fn conjugate(self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    pub fn norm(self) -> f64 {
        (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Scale to unit length.  A zero quaternion becomes the identity.
    pub fn normalized(self) -> Self {
        let n = self.norm();
        if n <= f64::EPSILON {
            return Self::identity();
        }
        Self::new(self.w / n, self.x / n, self.y / n, self.z / n)
    }

    /// Rotate a vector by this quaternion: p' = q * p * q*.
    pub fn rotate(self, v: Vec3) -> Vec3 {
        let p = Self::new(0.0, v.x, v.y, v.z);
        let rotated = self.mul(p).mul(self.conjugate());
        Vec3::new(rotated.x, rotated.y, rotated.z)
    }

    /// True when `self` and `other` describe the same rotation within `eps`
    /// (q and -q are the same rotation).
    pub fn approx_eq(self, other: Self, eps: f64) -> bool {
        let dot = self.w * other.w + self.x * other.x + self.y * other.y + self.z * other.z;
        (dot.abs() - 1.0).abs() <= eps
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Transform3D
// ────────────────────────────────────────────────────────────────────────────

/// A rigid-body 3-D transform: rotation followed by translation.
///
/// Represents the pose of frame B relative to frame A: to convert a point
/// expressed in frame B into frame A, rotate it by `rotation` then add
/// `translation`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform3D {
    pub translation: Vec3,
    pub rotation: Quaternion,
}

impl Transform3D {
    pub fn new(translation: Vec3, rotation: Quaternion) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    pub fn identity() -> Self {
        Self::new(Vec3::zero(), Quaternion::identity())
    }

    /// Compose two transforms.  If `self` = T_A_B and `other` = T_B_C, the
    /// result is T_A_C.
    pub fn compose(self, other: Self) -> Self {
        let translated = self.translation.add(self.rotation.rotate(other.translation));
        let rotated = self.rotation.mul(other.rotation);
        Self::new(translated, rotated)
    }

    /// T_A_B → T_B_A.
    pub fn inverse(self) -> Self {
        let inv_rot = self.rotation.conjugate();
        Self::new(inv_rot.rotate(self.translation).neg(), inv_rot)
    }

    pub fn apply_point(self, p: Vec3) -> Vec3 {
        self.translation.add(self.rotation.rotate(p))
    }

    /// Re-express `pose` (given in frame B) in frame A.
    pub fn apply_pose(self, pose: &Pose) -> Pose {
        Pose {
            position: self.apply_point(pose.position),
            orientation: self.rotation.mul(pose.orientation),
        }
    }
}

impl Default for Transform3D {
    fn default() -> Self {
        Self::identity()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Poses and rasters
// ────────────────────────────────────────────────────────────────────────────

/// A tool pose: position plus orientation.  The frame is carried by the
/// enclosing [`Strip`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub orientation: Quaternion,
}

impl Pose {
    pub fn new(position: Vec3, orientation: Quaternion) -> Self {
        Self {
            position,
            orientation,
        }
    }

    pub fn identity() -> Self {
        Self::new(Vec3::zero(), Quaternion::identity())
    }

    pub fn approx_eq(&self, other: &Self, eps: f64) -> bool {
        self.position.distance(other.position) <= eps
            && self.orientation.approx_eq(other.orientation, eps)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

/// One continuous raster line of poses, all expressed in `frame_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strip {
    pub frame_id: String,
    pub poses: Vec<Pose>,
}

impl Strip {
    pub fn new(frame_id: impl Into<String>, poses: Vec<Pose>) -> Self {
        Self {
            frame_id: frame_id.into(),
            poses,
        }
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    /// Summed straight-line distance between consecutive poses.
    pub fn length_m(&self) -> f64 {
        self.poses
            .windows(2)
            .map(|w| w[0].position.distance(w[1].position))
            .sum()
    }
}

/// An ordered set of strips.  Strip order is processing order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolPath {
    pub strips: Vec<Strip>,
}

impl ToolPath {
    pub fn new(strips: Vec<Strip>) -> Self {
        Self { strips }
    }

    pub fn pose_count(&self) -> usize {
        self.strips.iter().map(Strip::len).sum()
    }

    /// Frame of the first strip, `None` for an empty path.
    pub fn frame_id(&self) -> Option<&str> {
        self.strips.first().map(|s| s.frame_id.as_str())
    }

    /// Pose counts per strip, in order.
    pub fn shape(&self) -> Vec<usize> {
        self.strips.iter().map(Strip::len).collect()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stamped transforms
// ────────────────────────────────────────────────────────────────────────────

/// When a transform should be valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LookupTime {
    /// Whatever the provider knows most recently.
    #[default]
    Latest,
    At(DateTime<Utc>),
}

/// A transform that re-expresses poses given in `source_frame` in
/// `dest_frame`, valid at `stamp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StampedTransform {
    pub source_frame: String,
    pub dest_frame: String,
    pub stamp: DateTime<Utc>,
    pub transform: Transform3D,
}

impl StampedTransform {
    pub fn new(
        source_frame: impl Into<String>,
        dest_frame: impl Into<String>,
        stamp: DateTime<Utc>,
        transform: Transform3D,
    ) -> Self {
        Self {
            source_frame: source_frame.into(),
            dest_frame: dest_frame.into(),
            stamp,
            transform,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn yaw_90_rotates_x_to_y() {
        let r = Quaternion::from_yaw(FRAC_PI_2).rotate(Vec3::new(1.0, 0.0, 0.0));
        assert!(r.x.abs() < 1e-9);
        assert!((r.y - 1.0).abs() < 1e-9);
    }

    #[test]
    fn inverse_composes_to_identity() {
        let t = Transform3D::new(Vec3::new(1.0, -2.0, 0.5), Quaternion::from_yaw(0.7));
        let id = t.compose(t.inverse());
        assert!(id.translation.distance(Vec3::zero()) < 1e-9);
        assert!(id.rotation.approx_eq(Quaternion::identity(), 1e-9));
    }

    #[test]
    fn apply_pose_moves_and_rotates() {
        let t = Transform3D::new(Vec3::new(0.0, 0.0, 1.0), Quaternion::from_yaw(FRAC_PI_2));
        let p = t.apply_pose(&Pose::new(Vec3::new(1.0, 0.0, 0.0), Quaternion::identity()));
        assert!(p.position.distance(Vec3::new(0.0, 1.0, 1.0)) < 1e-9);
        assert!(p.orientation.approx_eq(Quaternion::from_yaw(FRAC_PI_2), 1e-9));
    }

    #[test]
    fn negated_quaternion_is_same_rotation() {
        let q = Quaternion::from_yaw(0.3);
        let neg = Quaternion::new(-q.w, -q.x, -q.y, -q.z);
        assert!(q.approx_eq(neg, 1e-12));
    }

    #[test]
    fn normalized_zero_is_identity() {
        assert_eq!(Quaternion::new(0.0, 0.0, 0.0, 0.0).normalized(), Quaternion::identity());
    }

    #[test]
    fn strip_length_sums_segments() {
        let strip = Strip::new(
            "part",
            vec![
                Pose::new(Vec3::new(0.0, 0.0, 0.0), Quaternion::identity()),
                Pose::new(Vec3::new(3.0, 0.0, 0.0), Quaternion::identity()),
                Pose::new(Vec3::new(3.0, 4.0, 0.0), Quaternion::identity()),
            ],
        );
        assert!((strip.length_m() - 7.0).abs() < 1e-9);
    }

    #[test]
    fn path_shape_and_frame() {
        let path = ToolPath::new(vec![
            Strip::new("part", vec![Pose::identity(); 3]),
            Strip::new("part", vec![Pose::identity(); 5]),
        ]);
        assert_eq!(path.shape(), vec![3, 5]);
        assert_eq!(path.pose_count(), 8);
        assert_eq!(path.frame_id(), Some("part"));
        assert_eq!(ToolPath::default().frame_id(), None);
    }
}
