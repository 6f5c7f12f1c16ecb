//! Per-rule spawn task: interval waits, batches, bounded retries and quota.

use std::time::Duration;

use log::{debug, error, info, warn};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use stage_spawner_core::{
    Event, SkipReason, SpawnRule, TaskId, UnitCatalog, UnitHandle, UnitInstance, UnitPool,
};

use crate::{RetryPolicy, SpawnArea};

/// Observable phase of a spawn task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// Suspended until the next batch is due.
    WaitingInterval,
    /// Suspended after a failed acquisition, before the next attempt or the skip.
    RetryingAcquisition {
        /// Number of failed attempts made so far for the current unit.
        failed_attempts: u32,
    },
    /// Quota met; the task makes no further acquisitions.
    Completed,
    /// Stage ended before the quota was met.
    Cancelled,
}

impl TaskStatus {
    /// Reports whether the task reached a terminal phase.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// Units attempted so far by one task.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct SpawnCounter {
    spawned: u32,
}

impl SpawnCounter {
    pub(crate) const fn get(self) -> u32 {
        self.spawned
    }

    fn record(&mut self, attempted: u32) {
        self.spawned = self.spawned.saturating_add(attempted);
    }
}

/// Collaborators and tuning a task needs while it spawns.
pub(crate) struct SpawnEnv<'a, C, P> {
    pub(crate) catalog: &'a C,
    pub(crate) pool: &'a mut P,
    pub(crate) retry: RetryPolicy,
    pub(crate) area: SpawnArea,
}

/// Pending wait measured in simulated time.
///
/// A wait of zero length armed during a tick resolves on the following tick,
/// never the one that armed it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Suspension {
    remaining: Duration,
    armed_at: u64,
}

impl Suspension {
    const fn new(remaining: Duration, armed_at: u64) -> Self {
        Self {
            remaining,
            armed_at,
        }
    }

    fn resume(&mut self, budget: &mut Duration, tick: u64) -> bool {
        if self.remaining > *budget {
            self.remaining -= *budget;
            *budget = Duration::ZERO;
            return false;
        }

        if self.remaining.is_zero() && self.armed_at == tick {
            return false;
        }

        *budget -= self.remaining;
        self.remaining = Duration::ZERO;
        true
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct BatchProgress {
    size: u32,
    next_unit: u32,
    failed_attempts: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    WaitingInterval(Suspension),
    RetryDelay {
        batch: BatchProgress,
        wait: Suspension,
    },
    Completed,
    Cancelled,
}

/// State machine that spawns the units of a single rule.
#[derive(Debug)]
pub(crate) struct PerRuleSpawnTask {
    id: TaskId,
    rule: SpawnRule,
    counter: SpawnCounter,
    rng: ChaCha8Rng,
    phase: Phase,
}

impl PerRuleSpawnTask {
    /// Launches a task whose first interval is armed at `tick`.
    pub(crate) fn start(id: TaskId, rule: SpawnRule, seed: u64, tick: u64) -> Self {
        let mut task = Self {
            id,
            rule,
            counter: SpawnCounter::default(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            phase: Phase::Completed,
        };
        task.phase = if task.rule.quota().is_met(0) {
            Phase::Completed
        } else {
            Phase::WaitingInterval(task.draw_interval(tick))
        };
        task
    }

    pub(crate) const fn id(&self) -> TaskId {
        self.id
    }

    pub(crate) const fn rule(&self) -> &SpawnRule {
        &self.rule
    }

    pub(crate) const fn counter(&self) -> SpawnCounter {
        self.counter
    }

    pub(crate) const fn status(&self) -> TaskStatus {
        match self.phase {
            Phase::WaitingInterval(_) => TaskStatus::WaitingInterval,
            Phase::RetryDelay { batch, .. } => TaskStatus::RetryingAcquisition {
                failed_attempts: batch.failed_attempts,
            },
            Phase::Completed => TaskStatus::Completed,
            Phase::Cancelled => TaskStatus::Cancelled,
        }
    }

    /// Stops the task. Reports whether it was still running.
    pub(crate) fn cancel(&mut self) -> bool {
        if self.status().is_terminal() {
            return false;
        }
        self.phase = Phase::Cancelled;
        true
    }

    /// Consumes `dt` of simulated time, running every phase that falls due.
    pub(crate) fn advance<C, P>(
        &mut self,
        dt: Duration,
        tick: u64,
        env: &mut SpawnEnv<'_, C, P>,
        out: &mut Vec<Event>,
    ) where
        C: UnitCatalog,
        P: UnitPool,
    {
        let mut budget = dt;
        loop {
            let batch = match &mut self.phase {
                Phase::Completed | Phase::Cancelled => return,
                Phase::WaitingInterval(wait) => {
                    if !wait.resume(&mut budget, tick) {
                        return;
                    }
                    self.draw_batch(out)
                }
                Phase::RetryDelay { batch, wait } => {
                    if !wait.resume(&mut budget, tick) {
                        return;
                    }
                    *batch
                }
            };
            self.run_batch(batch, tick, env, out);
        }
    }

    fn draw_interval(&mut self, tick: u64) -> Suspension {
        let range = self.rule.interval();
        let secs = if range.min_secs() < range.max_secs() {
            self.rng.gen_range(range.min_secs()..=range.max_secs())
        } else {
            range.min_secs()
        };
        Suspension::new(range.to_duration(secs), tick)
    }

    fn draw_batch(&mut self, out: &mut Vec<Event>) -> BatchProgress {
        let range = self.rule.batch();
        let size = if range.min() < range.max() {
            self.rng.gen_range(range.min()..=range.max())
        } else {
            range.min()
        };

        debug!(
            "task {} spawning a batch of {size} '{}'",
            self.id.get(),
            self.rule.key()
        );
        out.push(Event::BatchStarted {
            task: self.id,
            size,
        });

        BatchProgress {
            size,
            next_unit: 0,
            failed_attempts: 0,
        }
    }

    fn run_batch<C, P>(
        &mut self,
        mut batch: BatchProgress,
        tick: u64,
        env: &mut SpawnEnv<'_, C, P>,
        out: &mut Vec<Event>,
    ) where
        C: UnitCatalog,
        P: UnitPool,
    {
        while batch.next_unit < batch.size {
            let max_attempts = env.retry.max_attempts();
            if !env.retry.allows_retry(batch.failed_attempts) {
                error!(
                    "task {} skipped '{}' after {max_attempts} failed attempts",
                    self.id.get(),
                    self.rule.key()
                );
                out.push(Event::UnitSkipped {
                    task: self.id,
                    key: self.rule.key().clone(),
                    reason: SkipReason::PoolExhausted {
                        attempts: max_attempts,
                    },
                });
                batch.next_unit += 1;
                batch.failed_attempts = 0;
                continue;
            }

            if let Some(unit) = env.pool.acquire(self.rule.key()) {
                self.place_unit(unit, env, out);
                batch.next_unit += 1;
                batch.failed_attempts = 0;
                continue;
            }

            batch.failed_attempts += 1;
            warn!(
                "task {} could not acquire '{}' from the pool, attempt {}/{max_attempts}",
                self.id.get(),
                self.rule.key(),
                batch.failed_attempts
            );
            out.push(Event::AcquisitionFailed {
                task: self.id,
                key: self.rule.key().clone(),
                attempt: batch.failed_attempts,
                max_attempts,
            });

            self.phase = Phase::RetryDelay {
                batch,
                wait: Suspension::new(env.retry.delay(), tick),
            };
            return;
        }

        self.finish_batch(batch.size, tick, out);
    }

    fn place_unit<C, P>(
        &mut self,
        unit: UnitHandle,
        env: &mut SpawnEnv<'_, C, P>,
        out: &mut Vec<Event>,
    ) where
        C: UnitCatalog,
        P: UnitPool,
    {
        let key = self.rule.key();
        let Some(stats) = env.catalog.lookup_stats(key) else {
            let _ = env.pool.release(unit);
            error!("task {} found no stats for '{key}'", self.id.get());
            out.push(Event::UnitSkipped {
                task: self.id,
                key: key.clone(),
                reason: SkipReason::StatsMissing,
            });
            return;
        };

        let position = env.area.sample(&mut self.rng);
        let Some(instance) = env.pool.instance_mut(unit) else {
            let _ = env.pool.release(unit);
            error!(
                "pool handed out unit {} for '{key}' but cannot resolve it",
                unit.get()
            );
            return;
        };
        instance.initialize(&stats);
        instance.set_collision_enabled(true);
        instance.set_position(position);

        out.push(Event::UnitSpawned {
            task: self.id,
            unit,
            key: key.clone(),
            position,
        });
    }

    fn finish_batch(&mut self, attempted: u32, tick: u64, out: &mut Vec<Event>) {
        self.counter.record(attempted);
        let spawned = self.counter.get();

        if self.rule.quota().is_met(spawned) {
            info!(
                "task {} completed '{}' after {spawned} units",
                self.id.get(),
                self.rule.key()
            );
            self.phase = Phase::Completed;
            out.push(Event::RuleCompleted {
                task: self.id,
                spawned,
            });
            return;
        }

        self.phase = Phase::WaitingInterval(self.draw_interval(tick));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suspension_carries_leftover_budget() {
        let mut wait = Suspension::new(Duration::from_millis(300), 0);
        let mut budget = Duration::from_millis(200);
        assert!(!wait.resume(&mut budget, 1));
        assert_eq!(budget, Duration::ZERO);

        let mut budget = Duration::from_millis(250);
        assert!(wait.resume(&mut budget, 2));
        assert_eq!(budget, Duration::from_millis(150));
    }

    #[test]
    fn zero_suspension_waits_for_the_next_tick() {
        let mut wait = Suspension::new(Duration::ZERO, 4);
        let mut budget = Duration::from_secs(1);
        assert!(!wait.resume(&mut budget, 4));
        assert_eq!(budget, Duration::from_secs(1));
        assert!(wait.resume(&mut budget, 5));
    }

    #[test]
    fn counter_accumulates_attempts() {
        let mut counter = SpawnCounter::default();
        counter.record(2);
        counter.record(0);
        counter.record(3);
        assert_eq!(counter.get(), 5);
    }
}
