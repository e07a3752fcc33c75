//! `crs-runtime` – trigger, plan and playback for one sanding cell.
//!
//! # Modules
//!
//! - [`orchestrator`] – [`Orchestrator`][orchestrator::Orchestrator]: the
//!   cycle state machine.  A trigger loads the toolpath, moves it into the
//!   world frame, snapshots the robot state and submits the planning request;
//!   the response drives playback.
//! - [`request_builder`] – [`ProcessRequestBuilder`][request_builder::ProcessRequestBuilder]:
//!   turns a world-frame path and a joint-state snapshot into a
//!   [`ProcessRequest`][crs_types::ProcessRequest].
//! - [`sequencer`] – [`PlaybackSequencer`][sequencer::PlaybackSequencer]:
//!   emits the segments of each plan in execution order with paced waits.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: console/JSON
//!   logging plus optional OTLP span export.

pub mod orchestrator;
pub mod request_builder;
pub mod sequencer;
pub mod telemetry;

pub use orchestrator::{
    Collaborators, CycleState, Orchestrator, OrchestratorConfig, TriggerResponse,
};
pub use request_builder::{ProcessRequestBuilder, ToolConfig};
pub use sequencer::{
    Pacer, PlaybackReport, PlaybackSequencer, PlaybackTiming, SegmentKind, TokioPacer,
};
pub use telemetry::{TelemetryConfig, TracerProviderGuard, init_tracing};
