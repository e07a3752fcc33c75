//! Wires one simulated sanding cell from a [`Config`].

use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use crs_middleware::{
    BusTrajectorySink, EventBus, RobotStateCell, SimPlanningService, Topic, TopicReceiver,
};
use crs_perception::{JsonToolpathLoader, TfEngine};
use crs_runtime::{Collaborators, Orchestrator, TokioPacer};
use crs_types::{CycleStatus, Event, EventPayload, JointState};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::Config;

const SOURCE: &str = "crs-cli";

/// Running cell: orchestrator plus the background tasks feeding it.
pub struct Cell {
    pub orchestrator: Orchestrator,
    pub robot_state: RobotStateCell,
    tf: Arc<TfEngine>,
    bus: Arc<EventBus>,
    tasks: Vec<JoinHandle<()>>,
}

impl Cell {
    /// Build the cell.  Must be called from within a Tokio runtime.
    pub fn start(cfg: &Config) -> Self {
        let bus = Arc::new(EventBus::default());

        let mut tf = TfEngine::new();
        for edge in &cfg.static_transforms {
            tf.set_static_transform(&edge.parent, &edge.child, edge.transform());
            info!(parent = %edge.parent, child = %edge.child, "static transform registered");
        }
        let tf = Arc::new(tf);

        let robot_state = RobotStateCell::new();
        let feed = robot_state.spawn_feed(&bus);

        let planner = SimPlanningService::new()
            .with_latency(Duration::from_millis(cfg.sim.latency_ms))
            .with_points_per_metre(cfg.sim.points_per_metre);

        let orchestrator = Orchestrator::new(
            cfg.orchestrator(),
            Collaborators {
                toolpaths: Arc::new(JsonToolpathLoader::new()),
                transforms: tf.clone(),
                planner: Arc::new(planner),
                sink: Arc::new(BusTrajectorySink::new(bus.clone())),
                pacer: Arc::new(TokioPacer::new(cfg.playback.unit())),
                robot_state: robot_state.clone(),
                bus: bus.clone(),
            },
        );

        let cell = Self {
            orchestrator,
            robot_state,
            tf,
            bus,
            tasks: vec![feed],
        };
        cell.publish_home(cfg);
        cell
    }

    /// Publish the configured home position on the joint-state topic.
    fn publish_home(&self, cfg: &Config) {
        let home = JointState::at_positions(cfg.sim.joint_names.clone(), cfg.sim.home_positions.clone());
        let event = Event::new(SOURCE, EventPayload::JointState(home));
        if let Err(e) = self.bus.publish_to(Topic::JointStates, event) {
            warn!(error = %e, "failed to publish home joint state");
        }
    }

    /// Print cycle status and published trajectories as they arrive.
    pub fn spawn_console(&mut self) {
        let status = self.orchestrator.subscribe_status();
        let trajectories = self.bus.subscribe_to(Topic::Trajectories);
        self.tasks.push(tokio::spawn(print_status(status)));
        self.tasks.push(tokio::spawn(print_trajectories(trajectories)));
    }

    /// Known frame names, sorted.
    pub fn frames(&self) -> Vec<String> {
        let mut frames: Vec<String> = self.tf.frames().into_iter().map(str::to_string).collect();
        frames.sort();
        frames
    }
}

impl Drop for Cell {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn print_status(mut rx: TopicReceiver) {
    loop {
        match rx.recv().await {
            Ok(Event {
                payload: EventPayload::CycleStatus(status),
                ..
            }) => println!("  {}", describe(&status)),
            Ok(_) => {}
            Err(RecvError::Lagged(n)) => warn!(skipped = n, "status console lagged"),
            Err(RecvError::Closed) => break,
        }
    }
}

async fn print_trajectories(mut rx: TopicReceiver) {
    let mut count = 0usize;
    loop {
        match rx.recv().await {
            Ok(Event {
                payload: EventPayload::Trajectory(t),
                ..
            }) => {
                count += 1;
                println!(
                    "  {} trajectory #{} – {} points, {:.2} s",
                    "→".cyan(),
                    count,
                    t.len(),
                    t.duration_s()
                );
            }
            Ok(_) => {}
            Err(RecvError::Lagged(n)) => warn!(skipped = n, "trajectory console lagged"),
            Err(RecvError::Closed) => break,
        }
    }
}

fn describe(status: &CycleStatus) -> String {
    match status {
        CycleStatus::Accepted { cycle_id, strips } => {
            format!("{} cycle {} accepted ({} strips)", "●".yellow(), cycle_id, strips)
        }
        CycleStatus::TriggerRefused { reason } => {
            format!("{} trigger refused: {}", "✗".red(), reason)
        }
        CycleStatus::Aborted { cycle_id, reason } => {
            format!("{} cycle {} aborted before planning: {}", "✗".red(), cycle_id, reason)
        }
        CycleStatus::PlanReceived { cycle_id, plans } => {
            format!("{} cycle {} planned ({} plans)", "●".yellow(), cycle_id, plans)
        }
        CycleStatus::PlanningFailed { cycle_id, message } => {
            format!("{} cycle {} planning failed: {}", "✗".red(), cycle_id, message)
        }
        CycleStatus::PlaybackComplete { cycle_id, emitted } => format!(
            "{} cycle {} done – {} trajectories published",
            "✓".green().bold(),
            cycle_id,
            emitted
        ),
        CycleStatus::PlaybackAborted { cycle_id, reason } => {
            format!("{} cycle {} aborted: {}", "✗".red(), cycle_id, reason)
        }
    }
}
