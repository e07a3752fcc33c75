//! [`PlaybackSequencer`] – replays a process plan to the execution layer.
//!
//! For every [`ProcessMotionPlan`], in order:
//!
//! 1. the start trajectory (if it has points), then a pause sized to it;
//! 2. for each freespace motion `i`: process motion `i`, the settle pause,
//!    freespace motion `i`, a pause sized to it;
//! 3. the last process motion again, then the settle pause;
//! 4. the end trajectory (if it has points).
//!
//! The execution layer gives no completion acknowledgment, so each pause
//! stands in for "the previous segment has finished".  A sized pause is one
//! unit per `points_per_unit` points, rounded up, at least one unit.
//!
//! Step 3 re-publishes the final surface pass when the plan has as many
//! freespace motions as process motions; with the usual shape (one fewer
//! freespace motion) it is the first and only time that pass is published.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use crs_middleware::TrajectorySink;
use crs_types::{CrsError, PlanResponse, ProcessMotionPlan, Trajectory};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Pacing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackTiming {
    /// Length of one pause unit in milliseconds.
    pub unit_ms: u64,
    /// Pause after each process motion, in units.
    pub settle_units: u32,
    /// Trajectory points covered by one unit of pause.
    pub points_per_unit: u32,
}

impl Default for PlaybackTiming {
    fn default() -> Self {
        Self {
            unit_ms: 1000,
            settle_units: 2,
            points_per_unit: 10,
        }
    }
}

impl PlaybackTiming {
    pub fn unit(&self) -> Duration {
        Duration::from_millis(self.unit_ms)
    }

    /// Pause length, in units, after publishing `trajectory`.
    pub fn units_for(&self, trajectory: &Trajectory) -> u32 {
        let per_unit = self.points_per_unit.max(1) as usize;
        let units = trajectory.len().div_ceil(per_unit);
        u32::try_from(units).unwrap_or(u32::MAX).max(1)
    }
}

/// Waits between emissions.
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self, units: u32);
}

/// Timer-based pacer: awaits a Tokio sleep, never blocks a worker thread.
#[derive(Debug, Clone, Copy)]
pub struct TokioPacer {
    unit: Duration,
}

impl TokioPacer {
    pub fn new(unit: Duration) -> Self {
        Self { unit }
    }
}

#[async_trait]
impl Pacer for TokioPacer {
    async fn pause(&self, units: u32) {
        tokio::time::sleep(self.unit * units).await;
    }
}

/// Which part of a plan a published trajectory came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Start,
    Process,
    Freespace,
    /// The closing re-emission of the last process motion.
    Finish,
    End,
}

/// Outcome of a completed playback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackReport {
    pub plans: usize,
    pub emitted: usize,
    pub pause_units: u64,
}

/// Replays plans to a [`TrajectorySink`] with the pacing described in the
/// module docs.
pub struct PlaybackSequencer {
    sink: Arc<dyn TrajectorySink>,
    pacer: Arc<dyn Pacer>,
    timing: PlaybackTiming,
}

impl PlaybackSequencer {
    pub fn new(sink: Arc<dyn TrajectorySink>, pacer: Arc<dyn Pacer>, timing: PlaybackTiming) -> Self {
        Self {
            sink,
            pacer,
            timing,
        }
    }

    pub fn timing(&self) -> PlaybackTiming {
        self.timing
    }

    /// Check every plan before anything is published.
    ///
    /// # Errors
    ///
    /// [`CrsError::MalformedPlan`] when a plan has no process motions or has
    /// more freespace motions than process motions.
    pub fn validate(plans: &[ProcessMotionPlan]) -> Result<(), CrsError> {
        for (j, plan) in plans.iter().enumerate() {
            if plan.process_motions.is_empty() {
                return Err(CrsError::MalformedPlan(format!(
                    "plan {j} has no process motions"
                )));
            }
            if plan.free_motions.len() > plan.process_motions.len() {
                return Err(CrsError::MalformedPlan(format!(
                    "plan {j} has {} freespace motions but only {} process motions",
                    plan.free_motions.len(),
                    plan.process_motions.len()
                )));
            }
        }
        Ok(())
    }

    /// Play a planner response.  A failed response publishes nothing.
    pub async fn play_response(&self, response: &PlanResponse) -> Result<PlaybackReport, CrsError> {
        if !response.succeeded {
            return Err(CrsError::PlanningFailed(response.error_message.clone()));
        }
        self.play(&response.plans).await
    }

    /// Play `plans` in order, returning once the last emission is done.
    pub async fn play(&self, plans: &[ProcessMotionPlan]) -> Result<PlaybackReport, CrsError> {
        Self::validate(plans)?;

        let mut report = PlaybackReport {
            plans: plans.len(),
            ..PlaybackReport::default()
        };

        for (j, plan) in plans.iter().enumerate() {
            info!(plan = j + 1, of = plans.len(), "publishing process");
            let process_count = plan.process_motions.len();

            if !plan.start.is_empty() {
                self.emit(SegmentKind::Start, j, 0, &plan.start, &mut report);
                self.pause(self.timing.units_for(&plan.start), &mut report).await;
            }

            for (i, freespace) in plan.free_motions.iter().enumerate() {
                self.emit(SegmentKind::Process, j, i, &plan.process_motions[i], &mut report);
                self.pause(self.timing.settle_units, &mut report).await;
                self.emit(SegmentKind::Freespace, j, i, freespace, &mut report);
                self.pause(self.timing.units_for(freespace), &mut report).await;
            }

            if let Some(last) = plan.process_motions.last() {
                self.emit(SegmentKind::Finish, j, process_count - 1, last, &mut report);
                self.pause(self.timing.settle_units, &mut report).await;
            }

            if !plan.end.is_empty() {
                self.emit(SegmentKind::End, j, 0, &plan.end, &mut report);
            }
        }

        info!(emitted = report.emitted, plans = report.plans, "all done");
        Ok(report)
    }

    fn emit(
        &self,
        kind: SegmentKind,
        plan: usize,
        index: usize,
        trajectory: &Trajectory,
        report: &mut PlaybackReport,
    ) {
        info!(?kind, plan = plan + 1, segment = index + 1, points = trajectory.len(), "publishing segment");
        if let Err(e) = self.sink.publish(trajectory) {
            warn!(?kind, plan = plan + 1, segment = index + 1, error = %e, "trajectory sink rejected segment");
        }
        report.emitted += 1;
    }

    async fn pause(&self, units: u32, report: &mut PlaybackReport) {
        debug!(units, "waiting for segment to finish");
        self.pacer.pause(units).await;
        report.pause_units += u64::from(units);
    }
}
