//! `crs-middleware` – plumbing between the cell and the outside world.
//!
//! Routes data between the planner, the robot-state feed, and the execution
//! layer without caring about its meaning.
//!
//! # Modules
//!
//! - [`bus`] – typed, topic-based publish/subscribe event bus built on Tokio
//!   broadcast channels.
//! - [`sink`] – [`TrajectorySink`][sink::TrajectorySink]: fire-and-forget
//!   trajectory output.
//! - [`robot_state`] – [`RobotStateCell`][robot_state::RobotStateCell]:
//!   latest-value joint-state cell and its bus feed.
//! - [`planning`] – [`PlanningClient`][planning::PlanningClient]: async
//!   request/continuation channel to a
//!   [`PlanningService`][planning::PlanningService].
//! - [`sim_planner`] – a kinematics-free planning service for headless runs.

pub mod bus;
pub mod planning;
pub mod robot_state;
pub mod sim_planner;
pub mod sink;

pub use bus::{EventBus, Topic, TopicReceiver};
pub use planning::{PlanHandle, PlanningClient, PlanningService};
pub use robot_state::RobotStateCell;
pub use sim_planner::SimPlanningService;
pub use sink::{BusTrajectorySink, RecordingSink, TrajectorySink};
