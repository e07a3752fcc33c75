//! Where played-back trajectories go.
//!
//! The sequencer never talks to the execution layer directly; it hands each
//! [`Trajectory`] to a [`TrajectorySink`].  [`BusTrajectorySink`] forwards
//! onto the [`EventBus`], [`RecordingSink`] keeps them for inspection.

use std::sync::{Arc, Mutex, PoisonError};

use crs_types::{CrsError, Event, EventPayload, Trajectory};

use crate::bus::{EventBus, Topic};

/// Fire-and-forget trajectory output.  No acknowledgment of execution.
pub trait TrajectorySink: Send + Sync {
    /// Hand `trajectory` to the execution layer.
    ///
    /// Returns the number of consumers that received it.
    fn publish(&self, trajectory: &Trajectory) -> Result<usize, CrsError>;
}

/// Publishes trajectories on [`Topic::Trajectories`].
#[derive(Clone)]
pub struct BusTrajectorySink {
    bus: Arc<EventBus>,
    source: String,
}

impl BusTrajectorySink {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            bus,
            source: "crs-middleware::trajectories".to_string(),
        }
    }
}

impl TrajectorySink for BusTrajectorySink {
    fn publish(&self, trajectory: &Trajectory) -> Result<usize, CrsError> {
        let event = Event::new(self.source.clone(), EventPayload::Trajectory(trajectory.clone()));
        self.bus.publish_to(Topic::Trajectories, event)
    }
}

/// Keeps every published trajectory, in order.
#[derive(Clone, Default)]
pub struct RecordingSink {
    published: Arc<Mutex<Vec<Trajectory>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything published so far.
    pub fn published(&self) -> Vec<Trajectory> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl TrajectorySink for RecordingSink {
    fn publish(&self, trajectory: &Trajectory) -> Result<usize, CrsError> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(trajectory.clone());
        Ok(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crs_types::TrajectoryPoint;

    fn traj(points: usize) -> Trajectory {
        Trajectory::new(
            vec!["joint_1".into()],
            (0..points)
                .map(|i| TrajectoryPoint {
                    positions: vec![i as f64],
                    velocities: vec![],
                    time_from_start_s: i as f64 * 0.1,
                })
                .collect(),
        )
    }

    #[tokio::test]
    async fn bus_sink_forwards_to_trajectory_topic() -> Result<(), Box<dyn std::error::Error>> {
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe_to(Topic::Trajectories);
        let sink = BusTrajectorySink::new(bus.clone());

        assert_eq!(sink.publish(&traj(3))?, 1);
        match rx.recv().await?.payload {
            EventPayload::Trajectory(t) => assert_eq!(t.len(), 3),
            other => panic!("unexpected payload {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn bus_sink_without_listeners_is_not_an_error() {
        let sink = BusTrajectorySink::new(Arc::new(EventBus::default()));
        assert_eq!(sink.publish(&traj(1)).unwrap(), 0);
    }

    #[test]
    fn recording_sink_keeps_order() {
        let sink = RecordingSink::new();
        for n in [1, 2, 3] {
            sink.publish(&traj(n)).unwrap();
        }
        let lens: Vec<usize> = sink.published().iter().map(Trajectory::len).collect();
        assert_eq!(lens, vec![1, 2, 3]);
    }

    #[test]
    fn recording_sink_survives_a_poisoned_lock() {
        let sink = RecordingSink::new();
        sink.publish(&traj(2)).unwrap();

        let shared = Arc::clone(&sink.published);
        let crashed = std::thread::spawn(move || {
            let _guard = shared.lock().unwrap();
            panic!("recorder thread died while holding the lock");
        })
        .join();
        assert!(crashed.is_err());
        assert!(sink.published.is_poisoned());

        assert_eq!(sink.published().len(), 1);
        sink.publish(&traj(4)).unwrap();
        let lens: Vec<usize> = sink.published().iter().map(Trajectory::len).collect();
        assert_eq!(lens, vec![2, 4]);
    }
}
