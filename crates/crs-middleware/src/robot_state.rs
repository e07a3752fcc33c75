//! Latest-known robot state.
//!
//! [`RobotStateCell`] is a versioned single-value cell built on
//! [`tokio::sync::watch`].  The feed task writes every update, the request
//! builder reads a snapshot by value.  Readers never wait on writers; they
//! get whatever was observed last.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crs_types::{EventPayload, JointState};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::bus::{EventBus, Topic};

/// Shared, cheaply clonable latest-value cell for the robot's joint state.
#[derive(Clone)]
pub struct RobotStateCell {
    tx: Arc<watch::Sender<JointState>>,
    version: Arc<AtomicU64>,
}

impl RobotStateCell {
    /// A cell holding an empty [`JointState`] at version 0.
    pub fn new() -> Self {
        Self::with_initial(JointState::default())
    }

    pub fn with_initial(state: JointState) -> Self {
        let (tx, _rx) = watch::channel(state);
        Self {
            tx: Arc::new(tx),
            version: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Replace the stored state.  Returns the new version.
    pub fn update(&self, state: JointState) -> u64 {
        let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;
        self.tx.send_replace(state);
        version
    }

    /// Copy of the most recently observed state.
    pub fn snapshot(&self) -> JointState {
        self.tx.borrow().clone()
    }

    /// Number of updates applied so far.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Receiver that wakes on every update.
    pub fn subscribe(&self) -> watch::Receiver<JointState> {
        self.tx.subscribe()
    }

    /// Spawn a task that copies every [`EventPayload::JointState`] published
    /// on [`Topic::JointStates`] into this cell.  Ends when the bus closes.
    pub fn spawn_feed(&self, bus: &EventBus) -> JoinHandle<()> {
        let mut rx = bus.subscribe_to(Topic::JointStates);
        let cell = self.clone();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if let EventPayload::JointState(state) = event.payload {
                            let version = cell.update(state);
                            debug!(version, "robot state updated");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(lagged_by = n, "robot-state feed lagged; keeping newest");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

impl Default for RobotStateCell {
    fn default() -> Self {
        Self::new()
    }
}
