#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic spawning system that runs one timed task per spawn rule.
//!
//! The scheduler reacts to stage lifecycle and clock events. On
//! [`Event::StageStarted`] it resolves the stage's rules and launches a task
//! per rule; on [`Event::TimeAdvanced`] every running task consumes the
//! elapsed time, waiting out random intervals, spawning random batches from
//! the shared [`UnitPool`] and retrying exhausted acquisitions; on
//! [`Event::StageEnded`] every task is cancelled. Everything the system does
//! is reported back as events and through the `log` facade.

use std::time::Duration;

use glam::Vec3;
use log::{debug, error, info};
use rand::Rng;
use stage_spawner_core::{
    Event, RuleRepository, SpawnQuota, StageId, TaskId, UnitCatalog, UnitKey, UnitPool,
};

mod retry;
mod seed;
mod task;

pub use retry::RetryPolicy;
pub use task::TaskStatus;

use task::{PerRuleSpawnTask, SpawnEnv};

const DEFAULT_MIN_Y: f32 = -0.6;
const DEFAULT_MAX_Y: f32 = 0.0;

/// Region in which spawned units are placed.
///
/// Units appear at the anchor's x coordinate, on the z = 0 plane, with a y
/// coordinate drawn from the half-open range `[min_y, max_y)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpawnArea {
    anchor_x: f32,
    min_y: f32,
    max_y: f32,
}

impl SpawnArea {
    /// Creates an area at the provided anchor using the default vertical range.
    #[must_use]
    pub const fn at_anchor(anchor_x: f32) -> Self {
        Self {
            anchor_x,
            min_y: DEFAULT_MIN_Y,
            max_y: DEFAULT_MAX_Y,
        }
    }

    /// Overrides the vertical range units are spread across.
    #[must_use]
    pub const fn with_vertical_range(mut self, min_y: f32, max_y: f32) -> Self {
        self.min_y = min_y;
        self.max_y = max_y;
        self
    }

    /// X coordinate shared by every spawned unit.
    #[must_use]
    pub const fn anchor_x(&self) -> f32 {
        self.anchor_x
    }

    /// Inclusive lower bound of the y coordinate.
    #[must_use]
    pub const fn min_y(&self) -> f32 {
        self.min_y
    }

    /// Exclusive upper bound of the y coordinate.
    #[must_use]
    pub const fn max_y(&self) -> f32 {
        self.max_y
    }

    pub(crate) fn sample(&self, rng: &mut impl Rng) -> Vec3 {
        let y = if self.min_y < self.max_y {
            rng.gen_range(self.min_y..self.max_y)
        } else {
            self.min_y
        };
        Vec3::new(self.anchor_x, y, 0.0)
    }
}

impl Default for SpawnArea {
    fn default() -> Self {
        Self::at_anchor(0.0)
    }
}

/// Configuration parameters required to construct the spawning system.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    rng_seed: u64,
    retry: RetryPolicy,
    area: SpawnArea,
}

impl Config {
    /// Creates a configuration using the provided seed and spawn area.
    #[must_use]
    pub const fn new(rng_seed: u64, area: SpawnArea) -> Self {
        Self {
            rng_seed,
            retry: RetryPolicy::DEFAULT,
            area,
        }
    }

    /// Overrides the acquisition retry policy.
    #[must_use]
    pub const fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Seed every task stream is derived from.
    #[must_use]
    pub const fn rng_seed(&self) -> u64 {
        self.rng_seed
    }

    /// Acquisition retry policy.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Area units are placed in.
    #[must_use]
    pub const fn area(&self) -> SpawnArea {
        self.area
    }
}

/// Pure system that owns the spawn tasks of the running stage.
#[derive(Debug)]
pub struct SpawnScheduler {
    config: Config,
    stage: Option<StageId>,
    tasks: Vec<PerRuleSpawnTask>,
    tick_index: u64,
}

impl SpawnScheduler {
    /// Creates a new scheduler using the supplied configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            stage: None,
            tasks: Vec::new(),
            tick_index: 0,
        }
    }

    /// Stage whose tasks are currently running, if any.
    #[must_use]
    pub const fn stage(&self) -> Option<StageId> {
        self.stage
    }

    /// Consumes lifecycle and clock events, spawning units as tasks fall due.
    pub fn handle<R, C, P>(
        &mut self,
        events: &[Event],
        rules: &R,
        catalog: &C,
        pool: &mut P,
        out: &mut Vec<Event>,
    ) where
        R: RuleRepository,
        C: UnitCatalog,
        P: UnitPool,
    {
        for event in events {
            match event {
                Event::StageStarted { stage } => self.start(*stage, rules, out),
                Event::StageEnded { stage } => {
                    if self.stage == Some(*stage) {
                        let _ = self.on_stage_end(out);
                    } else {
                        debug!("ignoring end of stage {stage}, not the running stage");
                    }
                }
                Event::TimeAdvanced { dt } => self.advance(*dt, catalog, pool, out),
                _ => {}
            }
        }
    }

    /// Launches one task per rule of `stage`, cancelling any running stage first.
    ///
    /// A stage without rules is reported and runs without tasks.
    pub fn start<R>(&mut self, stage: StageId, rules: &R, out: &mut Vec<Event>)
    where
        R: RuleRepository,
    {
        if self.stage.is_some() {
            let _ = self.on_stage_end(out);
        }

        self.tasks.clear();
        self.stage = Some(stage);

        let Some(stage_rules) = rules.rules_for(stage) else {
            error!("no spawn rules found for stage {stage}");
            out.push(Event::RulesMissing { stage });
            return;
        };

        let rng_seed = self.config.rng_seed;
        let tick = self.tick_index;
        self.tasks = stage_rules
            .into_iter()
            .filter(|rule| rule.stage() == stage)
            .enumerate()
            .map(|(index, rule)| {
                let id = TaskId::new(index as u32);
                let task_seed = seed::derive_task_seed(rng_seed, stage, id);
                PerRuleSpawnTask::start(id, rule, task_seed, tick)
            })
            .collect();

        let tasks = self.tasks.len() as u32;
        info!("stage {stage} started with {tasks} spawn tasks");
        out.push(Event::SpawningStarted { stage, tasks });

        for task in &self.tasks {
            if task.status() == TaskStatus::Completed {
                out.push(Event::RuleCompleted {
                    task: task.id(),
                    spawned: task.counter().get(),
                });
            }
        }
    }

    /// Cancels every running task of the current stage.
    ///
    /// Returns the number of tasks that were still running. Calling this
    /// without a running stage does nothing.
    pub fn on_stage_end(&mut self, out: &mut Vec<Event>) -> u32 {
        let Some(stage) = self.stage.take() else {
            return 0;
        };

        let mut cancelled = 0;
        for task in &mut self.tasks {
            if task.cancel() {
                cancelled += 1;
            }
        }
        info!("stage {stage} ended, cancelled {cancelled} spawn tasks");
        out.push(Event::SpawningCancelled { stage, cancelled });
        cancelled
    }

    /// Advances every running task by `dt` of simulated time.
    pub fn advance<C, P>(&mut self, dt: Duration, catalog: &C, pool: &mut P, out: &mut Vec<Event>)
    where
        C: UnitCatalog,
        P: UnitPool,
    {
        if self.stage.is_none() {
            return;
        }

        self.tick_index = self.tick_index.saturating_add(1);
        let mut env = SpawnEnv {
            catalog,
            pool,
            retry: self.config.retry,
            area: self.config.area,
        };
        for task in &mut self.tasks {
            task.advance(dt, self.tick_index, &mut env, out);
        }
    }

    /// Captures the progress of every task launched for the last stage.
    ///
    /// Cancelled tasks stay visible until the next stage starts.
    #[must_use]
    pub fn progress(&self) -> SpawnProgressView {
        SpawnProgressView {
            snapshots: self
                .tasks
                .iter()
                .map(|task| TaskSnapshot {
                    task: task.id(),
                    key: task.rule().key().clone(),
                    spawned: task.counter().get(),
                    quota: task.rule().quota(),
                    status: task.status(),
                })
                .collect(),
        }
    }
}

/// Read-only snapshot describing the spawn tasks of a stage.
#[derive(Clone, Debug, Default)]
pub struct SpawnProgressView {
    snapshots: Vec<TaskSnapshot>,
}

impl SpawnProgressView {
    /// Iterator over the captured task snapshots in task order.
    pub fn iter(&self) -> impl Iterator<Item = &TaskSnapshot> {
        self.snapshots.iter()
    }

    /// Looks up the snapshot of a single task.
    #[must_use]
    pub fn task(&self, task: TaskId) -> Option<&TaskSnapshot> {
        self.snapshots.iter().find(|snapshot| snapshot.task == task)
    }

    /// Reports whether every task reached a terminal phase.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.snapshots
            .iter()
            .all(|snapshot| snapshot.status.is_terminal())
    }

    /// Consumes the view, yielding the underlying snapshots.
    #[must_use]
    pub fn into_vec(self) -> Vec<TaskSnapshot> {
        self.snapshots
    }
}

/// Immutable representation of a single task used for queries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskSnapshot {
    /// Identifier of the task.
    pub task: TaskId,
    /// Unit type spawned by the task.
    pub key: UnitKey,
    /// Units attempted so far.
    pub spawned: u32,
    /// Quota of the task's rule.
    pub quota: SpawnQuota,
    /// Current phase.
    pub status: TaskStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn spawn_area_samples_within_vertical_range() {
        let area = SpawnArea::at_anchor(8.5);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..256 {
            let position = area.sample(&mut rng);
            assert_eq!(position.x, 8.5);
            assert_eq!(position.z, 0.0);
            assert!(position.y >= -0.6 && position.y < 0.0, "y = {}", position.y);
        }
    }

    #[test]
    fn degenerate_vertical_range_uses_lower_bound() {
        let area = SpawnArea::at_anchor(1.0).with_vertical_range(0.25, 0.25);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        assert_eq!(area.sample(&mut rng), Vec3::new(1.0, 0.25, 0.0));
    }

    #[test]
    fn stage_end_without_running_stage_is_a_no_op() {
        let mut scheduler = SpawnScheduler::new(Config::new(1, SpawnArea::default()));
        let mut out = Vec::new();
        assert_eq!(scheduler.on_stage_end(&mut out), 0);
        assert!(out.is_empty());
    }
}
