//! Summary of a simulated stage run, printable as text or JSON.

use std::fmt;

use glam::Vec3;
use serde::Serialize;
use stage_spawner_core::{Event, SpawnQuota, StageId};
use stage_spawner_system_spawning::{SpawnProgressView, TaskStatus};
use stage_spawner_world::{query::UnitSnapshot, PoolStats};

/// Running totals of the diagnostics observed during a run.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct EventTally {
    units_spawned: u32,
    warnings: u32,
    errors: u32,
    rules_missing: bool,
}

impl EventTally {
    /// Folds a batch of events into the totals.
    pub(crate) fn observe(&mut self, events: &[Event]) {
        for event in events {
            match event {
                Event::UnitSpawned { .. } => self.units_spawned += 1,
                Event::AcquisitionFailed { .. } => self.warnings += 1,
                Event::UnitSkipped { .. } => self.errors += 1,
                Event::RulesMissing { .. } => {
                    self.errors += 1;
                    self.rules_missing = true;
                }
                _ => {}
            }
        }
    }
}

/// Outcome of one stage run.
#[derive(Debug, Serialize)]
pub(crate) struct RunSummary {
    stage: u32,
    seed: u64,
    simulated_secs: f32,
    ended_early: bool,
    rules_missing: bool,
    units_spawned: u32,
    warnings: u32,
    errors: u32,
    tasks: Vec<TaskSummary>,
    units_on_field: Vec<UnitSummary>,
    pool: PoolSummary,
}

impl RunSummary {
    /// Assembles the summary from the final state of a run.
    pub(crate) fn new(
        stage: StageId,
        seed: u64,
        simulated_secs: f32,
        ended_early: bool,
        tally: EventTally,
        progress: SpawnProgressView,
        units: Vec<UnitSnapshot>,
        pool: PoolStats,
    ) -> Self {
        Self {
            stage: stage.get(),
            seed,
            simulated_secs,
            ended_early,
            rules_missing: tally.rules_missing,
            units_spawned: tally.units_spawned,
            warnings: tally.warnings,
            errors: tally.errors,
            tasks: progress
                .into_vec()
                .into_iter()
                .map(|snapshot| TaskSummary {
                    task: snapshot.task.get(),
                    unit: snapshot.key.to_string(),
                    spawned: snapshot.spawned,
                    quota: snapshot.quota.to_raw(),
                    status: status_label(snapshot.status),
                })
                .collect(),
            units_on_field: units
                .into_iter()
                .map(|snapshot| UnitSummary {
                    unit: snapshot.unit.get(),
                    key: snapshot.key.to_string(),
                    position: snapshot.position,
                })
                .collect(),
            pool: PoolSummary {
                acquired: pool.acquired,
                exhausted: pool.exhausted,
                released: pool.released,
            },
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "stage {} (seed {}) after {:.2}s{}",
            self.stage,
            self.seed,
            self.simulated_secs,
            if self.ended_early { ", ended early" } else { "" }
        )?;
        if self.rules_missing {
            writeln!(f, "  no spawn rules configured for this stage")?;
        }
        for task in &self.tasks {
            let quota = match SpawnQuota::from_raw(task.quota) {
                Ok(SpawnQuota::Limited(total)) => total.to_string(),
                _ => "unbounded".to_owned(),
            };
            writeln!(
                f,
                "  task {:>2} {:<12} {:>4}/{:<9} {}",
                task.task, task.unit, task.spawned, quota, task.status
            )?;
        }
        writeln!(
            f,
            "  {} units spawned, {} on the field",
            self.units_spawned,
            self.units_on_field.len()
        )?;
        writeln!(
            f,
            "  pool: {} acquired, {} refused, {} released",
            self.pool.acquired, self.pool.exhausted, self.pool.released
        )?;
        writeln!(f, "  {} warnings, {} errors", self.warnings, self.errors)
    }
}

#[derive(Debug, Serialize)]
struct TaskSummary {
    task: u32,
    unit: String,
    spawned: u32,
    quota: i64,
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct UnitSummary {
    unit: u32,
    key: String,
    position: Vec3,
}

#[derive(Debug, Serialize)]
struct PoolSummary {
    acquired: u32,
    exhausted: u32,
    released: u32,
}

fn status_label(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::WaitingInterval => "waiting",
        TaskStatus::RetryingAcquisition { .. } => "retrying",
        TaskStatus::Completed => "completed",
        TaskStatus::Cancelled => "cancelled",
    }
}
