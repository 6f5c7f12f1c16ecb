#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative stage state management for the stage spawner.

use std::time::Duration;

use stage_spawner_core::{Command, Event, SpawnRule, StageId, UnitKey, UnitPool, UnitStats};

mod catalog;
mod pool;

pub use catalog::{RuleTable, StatsTable};
pub use pool::{PoolStats, PooledUnit, UnitPoolStore};

/// Represents the authoritative world state of a stage session.
#[derive(Debug)]
pub struct World {
    rules: RuleTable,
    catalog: StatsTable,
    pool: UnitPoolStore,
    stage: Option<StageId>,
    elapsed: Duration,
    tick_index: u64,
}

impl World {
    /// Creates a world from stage data. No stage is running yet.
    #[must_use]
    pub fn new(
        rules: Vec<SpawnRule>,
        stats: Vec<UnitStats>,
        capacities: impl IntoIterator<Item = (UnitKey, u32)>,
    ) -> Self {
        Self {
            rules: RuleTable::new(rules),
            catalog: StatsTable::new(stats),
            pool: UnitPoolStore::with_capacities(capacities),
            stage: None,
            elapsed: Duration::ZERO,
            tick_index: 0,
        }
    }

    fn end_stage(&mut self, out_events: &mut Vec<Event>) {
        let Some(stage) = self.stage.take() else {
            return;
        };

        for (unit, key) in self.pool.reclaim_all() {
            out_events.push(Event::UnitReleased { unit, key });
        }
        out_events.push(Event::StageEnded { stage });
    }
}

/// Disjoint borrows of the collaborators the spawning system works with.
#[derive(Debug)]
pub struct SpawnResources<'a> {
    /// Rule repository of the loaded stage data.
    pub rules: &'a RuleTable,
    /// Unit stats catalog.
    pub catalog: &'a StatsTable,
    /// Shared unit pool.
    pub pool: &'a mut UnitPoolStore,
}

/// Splits the world into the collaborators consumed by the spawning system.
pub fn spawn_resources(world: &mut World) -> SpawnResources<'_> {
    SpawnResources {
        rules: &world.rules,
        catalog: &world.catalog,
        pool: &mut world.pool,
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::StartStage { stage } => {
            world.end_stage(out_events);
            world.stage = Some(stage);
            world.elapsed = Duration::ZERO;
            world.tick_index = 0;
            out_events.push(Event::StageStarted { stage });
        }
        Command::EndStage => world.end_stage(out_events),
        Command::Tick { dt } => {
            if world.stage.is_none() {
                return;
            }
            world.tick_index = world.tick_index.saturating_add(1);
            world.elapsed = world.elapsed.saturating_add(dt);
            out_events.push(Event::TimeAdvanced { dt });
        }
        Command::ReleaseUnit { unit } => {
            let key = world.pool.unit(unit).map(|instance| instance.key().clone());
            if let Some(key) = key {
                if world.pool.release(unit) {
                    out_events.push(Event::UnitReleased { unit, key });
                }
            }
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use std::time::Duration;

    use glam::Vec3;
    use stage_spawner_core::{StageId, UnitHandle, UnitKey, UnitStats};

    use super::{PoolStats, RuleTable, World};

    /// Stage that is currently running, if any.
    #[must_use]
    pub fn stage(world: &World) -> Option<StageId> {
        world.stage
    }

    /// Simulated time elapsed since the running stage started.
    #[must_use]
    pub fn elapsed(world: &World) -> Duration {
        world.elapsed
    }

    /// Number of ticks processed since the running stage started.
    #[must_use]
    pub fn tick_index(world: &World) -> u64 {
        world.tick_index
    }

    /// Provides read-only access to the loaded rules.
    #[must_use]
    pub fn rules(world: &World) -> &RuleTable {
        &world.rules
    }

    /// Number of dormant pool instances left for `key`.
    #[must_use]
    pub fn available_units(world: &World, key: &UnitKey) -> u32 {
        world.pool.available(key)
    }

    /// Usage totals of the unit pool.
    #[must_use]
    pub fn pool_stats(world: &World) -> PoolStats {
        world.pool.stats()
    }

    /// Captures the units currently active in the stage, in handle order.
    #[must_use]
    pub fn active_units(world: &World) -> Vec<UnitSnapshot> {
        world
            .pool
            .iter()
            .filter(|unit| unit.is_active())
            .map(|unit| UnitSnapshot {
                unit: unit.handle(),
                key: unit.key().clone(),
                stats: unit.stats().cloned(),
                collision_enabled: unit.collision_enabled(),
                position: unit.position(),
            })
            .collect()
    }

    /// Immutable representation of an active unit used for queries.
    #[derive(Clone, Debug, PartialEq)]
    pub struct UnitSnapshot {
        /// Pool handle of the unit.
        pub unit: UnitHandle,
        /// Unit type.
        pub key: UnitKey,
        /// Stats assigned at spawn, if the unit was initialized.
        pub stats: Option<UnitStats>,
        /// Indicates whether collision is enabled.
        pub collision_enabled: bool,
        /// World position of the unit.
        pub position: Vec3,
    }
}
