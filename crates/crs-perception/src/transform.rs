//! Transform Frame (TF) Engine.
//!
//! Maintains a graph of named reference frames and the stamped rigid-body
//! transforms that relate them.  Edges are stored parent → child, but a
//! lookup may walk them in either direction (the inverse is taken on the way
//! back up), so `lookup("part", "world", ..)` works whether the tree was
//! built as `world → part` or `part → world`.
//!
//! # Example
//!
//! ```rust
//! use crs_perception::transform::{TfEngine, TransformProvider};
//! use crs_types::{LookupTime, Quaternion, Transform3D, Vec3};
//!
//! let mut tf = TfEngine::new();
//! // The part sits 1 m in front of the world origin.
//! tf.set_static_transform("world", "part",
//!     Transform3D::new(Vec3::new(1.0, 0.0, 0.0), Quaternion::identity()));
//!
//! let t = tf.lookup("part", "world", LookupTime::Latest).unwrap();
//! let p = t.transform.apply_point(Vec3::new(0.5, 0.0, 0.0));
//! assert!((p.x - 1.5).abs() < 1e-9);
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use crs_types::{CrsError, LookupTime, StampedTransform, Transform3D};

/// Anything that can answer "how do I get from `source_frame` to
/// `dest_frame` at `time`".
pub trait TransformProvider: Send + Sync {
    /// Return the transform that re-expresses poses given in `source_frame`
    /// in `dest_frame`.
    ///
    /// # Errors
    ///
    /// [`CrsError::TransformUnavailable`] when the frames are not connected
    /// or no edge on the chain is valid at `time`.
    fn lookup(
        &self,
        source_frame: &str,
        dest_frame: &str,
        time: LookupTime,
    ) -> Result<StampedTransform, CrsError>;
}

#[derive(Debug, Clone, Copy)]
struct Edge {
    transform: Transform3D,
    stamp: DateTime<Utc>,
    is_static: bool,
}

impl Edge {
    fn valid_at(&self, time: LookupTime) -> bool {
        match time {
            LookupTime::Latest => true,
            LookupTime::At(t) => self.is_static || self.stamp <= t,
        }
    }
}

/// A graph of named frames and the [`Transform3D`]s that relate them.
///
/// `set_transform(parent, child, T)` records T = pose of `child` expressed in
/// `parent`, i.e. the map from child coordinates into parent coordinates.
#[derive(Debug, Default)]
pub struct TfEngine {
    /// `edges[parent][child]`
    edges: HashMap<String, HashMap<String, Edge>>,
    /// `parents[child]`, used to walk edges backwards.
    parents: HashMap<String, HashSet<String>>,
}

impl TfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or update a dynamic transform valid from `stamp` onwards.
    pub fn set_transform(
        &mut self,
        parent_frame: &str,
        child_frame: &str,
        transform: Transform3D,
        stamp: DateTime<Utc>,
    ) {
        self.insert(parent_frame, child_frame, Edge {
            transform,
            stamp,
            is_static: false,
        });
    }

    /// Register or update a transform that is valid at every time.
    pub fn set_static_transform(
        &mut self,
        parent_frame: &str,
        child_frame: &str,
        transform: Transform3D,
    ) {
        self.insert(parent_frame, child_frame, Edge {
            transform,
            stamp: Utc::now(),
            is_static: true,
        });
    }

    /// All frame names that appear in the tree.
    pub fn frames(&self) -> HashSet<&str> {
        self.edges
            .iter()
            .flat_map(|(parent, children)| {
                std::iter::once(parent.as_str()).chain(children.keys().map(String::as_str))
            })
            .collect()
    }

    fn insert(&mut self, parent_frame: &str, child_frame: &str, edge: Edge) {
        self.edges
            .entry(parent_frame.to_string())
            .or_default()
            .insert(child_frame.to_string(), edge);
        self.parents
            .entry(child_frame.to_string())
            .or_default()
            .insert(parent_frame.to_string());
    }

    /// Neighbours of `frame` reachable at `time`, each with T_frame_next.
    fn neighbours(&self, frame: &str, time: LookupTime) -> Vec<(&str, Transform3D, Edge)> {
        let mut out = Vec::new();
        if let Some(children) = self.edges.get(frame) {
            for (child, edge) in children {
                if edge.valid_at(time) {
                    out.push((child.as_str(), edge.transform, *edge));
                }
            }
        }
        if let Some(parents) = self.parents.get(frame) {
            for parent in parents {
                if let Some(edge) = self.edges.get(parent).and_then(|c| c.get(frame))
                    && edge.valid_at(time)
                {
                    out.push((parent.as_str(), edge.transform.inverse(), *edge));
                }
            }
        }
        out
    }

    /// BFS from `dest_frame` towards `source_frame`, composing T_dest_x along
    /// the way.  Returns the composed transform and the newest dynamic stamp
    /// on the chain.
    fn search(
        &self,
        source_frame: &str,
        dest_frame: &str,
        time: LookupTime,
    ) -> Option<(Transform3D, Option<DateTime<Utc>>)> {
        let mut queue: VecDeque<(&str, Transform3D, Option<DateTime<Utc>>)> = VecDeque::new();
        let mut visited: HashSet<&str> = HashSet::new();

        queue.push_back((dest_frame, Transform3D::identity(), None));
        visited.insert(dest_frame);

        while let Some((current, accumulated, newest)) = queue.pop_front() {
            for (next, edge_tf, edge) in self.neighbours(current, time) {
                if visited.contains(next) {
                    continue;
                }
                let composed = accumulated.compose(edge_tf);
                let newest = if edge.is_static {
                    newest
                } else {
                    Some(newest.map_or(edge.stamp, |n: DateTime<Utc>| n.max(edge.stamp)))
                };
                if next == source_frame {
                    return Some((composed, newest));
                }
                visited.insert(next);
                queue.push_back((next, composed, newest));
            }
        }
        None
    }
}

impl TransformProvider for TfEngine {
    fn lookup(
        &self,
        source_frame: &str,
        dest_frame: &str,
        time: LookupTime,
    ) -> Result<StampedTransform, CrsError> {
        let stamp_for = |newest: Option<DateTime<Utc>>| match time {
            LookupTime::At(t) => t,
            LookupTime::Latest => newest.unwrap_or_else(Utc::now),
        };

        if source_frame == dest_frame {
            return Ok(StampedTransform::new(
                source_frame,
                dest_frame,
                stamp_for(None),
                Transform3D::identity(),
            ));
        }

        match self.search(source_frame, dest_frame, time) {
            Some((transform, newest)) => Ok(StampedTransform::new(
                source_frame,
                dest_frame,
                stamp_for(newest),
                transform,
            )),
            None => {
                let known = self.frames();
                let reason = if !known.contains(source_frame) || !known.contains(dest_frame) {
                    let missing = if known.contains(source_frame) { dest_frame } else { source_frame };
                    format!("frame '{missing}' does not exist")
                } else if matches!(time, LookupTime::At(_))
                    && self.search(source_frame, dest_frame, LookupTime::Latest).is_some()
                {
                    "requested time is earlier than the available transform data".to_string()
                } else {
                    "frames are not connected".to_string()
                };
                Err(CrsError::TransformUnavailable {
                    source_frame: source_frame.to_string(),
                    dest_frame: dest_frame.to_string(),
                    reason,
                })
            }
        }
    }
}

/// A tree that other tasks may keep updating while lookups happen.
impl TransformProvider for RwLock<TfEngine> {
    fn lookup(
        &self,
        source_frame: &str,
        dest_frame: &str,
        time: LookupTime,
    ) -> Result<StampedTransform, CrsError> {
        let guard = self.read().map_err(|_| CrsError::TransformUnavailable {
            source_frame: source_frame.to_string(),
            dest_frame: dest_frame.to_string(),
            reason: "transform tree lock poisoned".to_string(),
        })?;
        guard.lookup(source_frame, dest_frame, time)
    }
}
