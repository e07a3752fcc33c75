//! In-process event bus for the cell.
//!
//! One [`tokio::sync::broadcast`] channel per [`Topic`].  Every receiver sees
//! every event published after it subscribed; a receiver that falls more
//! than `capacity` events behind gets `RecvError::Lagged` and skips ahead.
//!
//! | Topic | Carries |
//! |---|---|
//! | [`Topic::Trajectories`] | segments handed to the execution layer |
//! | [`Topic::JointStates`] | robot-state feed |
//! | [`Topic::CycleStatus`] | trigger/plan/playback progress |

use std::fmt;

use crs_types::{CrsError, Event};
use tokio::sync::broadcast;
use tracing::trace;

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Trajectories,
    JointStates,
    CycleStatus,
}

impl Topic {
    pub const ALL: [Topic; 3] = [Topic::Trajectories, Topic::JointStates, Topic::CycleStatus];

    fn index(self) -> usize {
        match self {
            Topic::Trajectories => 0,
            Topic::JointStates => 1,
            Topic::CycleStatus => 2,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Topic::Trajectories => "trajectories",
            Topic::JointStates => "joint_states",
            Topic::CycleStatus => "cycle_status",
        })
    }
}

/// Cloning shares the channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    lanes: [broadcast::Sender<Event>; 3],
}

impl EventBus {
    /// `capacity` is per topic.
    pub fn new(capacity: usize) -> Self {
        Self {
            lanes: Topic::ALL.map(|_| broadcast::channel(capacity).0),
        }
    }

    /// Fire-and-forget publish.  Yields the number of receivers reached,
    /// which is `Ok(0)` when nobody listens on `topic`.
    pub fn publish_to(&self, topic: Topic, event: Event) -> Result<usize, CrsError> {
        let lane = &self.lanes[topic.index()];
        if lane.receiver_count() == 0 {
            trace!(%topic, source = %event.source, "no subscribers; event dropped");
            return Ok(0);
        }
        lane.send(event)
            .map_err(|e| CrsError::Channel(format!("publish on {topic} failed: {e}")))
    }

    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.lanes[topic.index()].subscribe(),
        }
    }

    /// Live receivers on `topic`.
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.lanes[topic.index()].receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Receiving end of one topic.
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Next event; `Lagged(n)` means `n` events were skipped, `Closed` that
    /// every [`EventBus`] clone is gone.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Result<Event, broadcast::error::TryRecvError> {
        self.receiver.try_recv()
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }
}
