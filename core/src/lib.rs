#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the stage spawner.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Adapters submit [`Command`] values
//! describing desired mutations, the world executes those commands via its
//! `apply` entry point, and then broadcasts [`Event`] values for systems to
//! react to deterministically. Systems consume event streams, talk to the
//! world through the collaborator traits declared here ([`RuleRepository`],
//! [`UnitCatalog`], [`UnitPool`]) and report what they did as new events.

use std::{fmt, time::Duration};

use glam::Vec3;
use serde::{Deserialize, Serialize};

mod rule;

pub use rule::{BatchRange, IntervalRange, RuleError, SpawnQuota, SpawnRule, UNBOUNDED_QUOTA};

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Starts the provided stage, ending any stage that is still running.
    StartStage {
        /// Stage that should become active.
        stage: StageId,
    },
    /// Ends the running stage.
    EndStage,
    /// Advances the simulation clock by the provided delta time.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
    /// Returns an active unit to the pool, typically after it was defeated.
    ReleaseUnit {
        /// Handle of the unit to reclaim.
        unit: UnitHandle,
    },
}

/// Events broadcast by the world and by systems after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Announces that a stage became active.
    StageStarted {
        /// Stage that started.
        stage: StageId,
    },
    /// Announces that the active stage ended.
    StageEnded {
        /// Stage that ended.
        stage: StageId,
    },
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
    },
    /// Confirms that a unit returned to the pool.
    UnitReleased {
        /// Handle of the reclaimed unit.
        unit: UnitHandle,
        /// Unit type of the reclaimed instance.
        key: UnitKey,
    },
    /// Reports that spawn tasks were launched for a stage.
    SpawningStarted {
        /// Stage the tasks belong to.
        stage: StageId,
        /// Number of tasks launched.
        tasks: u32,
    },
    /// Reports that no spawn rules exist for a stage.
    RulesMissing {
        /// Stage that has no rules.
        stage: StageId,
    },
    /// Reports that a task drew a batch and began spawning it.
    BatchStarted {
        /// Task spawning the batch.
        task: TaskId,
        /// Number of units attempted in the batch.
        size: u32,
    },
    /// Confirms that a unit was initialized, activated and placed.
    UnitSpawned {
        /// Task that spawned the unit.
        task: TaskId,
        /// Pool handle of the spawned unit.
        unit: UnitHandle,
        /// Unit type that was spawned.
        key: UnitKey,
        /// World position assigned to the unit.
        position: Vec3,
    },
    /// Warns that a pool acquisition attempt failed.
    AcquisitionFailed {
        /// Task that attempted the acquisition.
        task: TaskId,
        /// Unit type requested from the pool.
        key: UnitKey,
        /// One-based attempt number that failed.
        attempt: u32,
        /// Maximum number of attempts allowed per unit.
        max_attempts: u32,
    },
    /// Reports that a unit of a batch was given up on.
    UnitSkipped {
        /// Task that skipped the unit.
        task: TaskId,
        /// Unit type that could not be spawned.
        key: UnitKey,
        /// Specific reason the unit was skipped.
        reason: SkipReason,
    },
    /// Reports that a task met its quota and stopped.
    RuleCompleted {
        /// Task that completed.
        task: TaskId,
        /// Number of attempted units recorded by the task.
        spawned: u32,
    },
    /// Reports that the running tasks of a stage were cancelled.
    SpawningCancelled {
        /// Stage whose tasks were cancelled.
        stage: StageId,
        /// Number of tasks that were still running.
        cancelled: u32,
    },
}

/// Reasons a unit within a batch may be skipped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkipReason {
    /// Every acquisition attempt found the pool exhausted.
    PoolExhausted {
        /// Number of attempts made before giving up.
        attempts: u32,
    },
    /// The unit catalog has no stats for the requested key.
    StatsMissing,
}

/// Identifier of a stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StageId(u32);

impl StageId {
    /// Creates a new stage identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a spawn task within the running stage.
///
/// Tasks are numbered by the position of their rule in the stage's rule list,
/// so two identical rules still yield two distinct tasks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(u32);

impl TaskId {
    /// Creates a new task identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Handle of a pooled unit instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitHandle(u32);

impl UnitHandle {
    /// Creates a new unit handle with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the handle.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Name of a unit type, shared by rules, stats and the pool.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitKey(String);

impl UnitKey {
    /// Creates a new unit key.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrows the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Static combat statistics assigned to a freshly spawned unit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnitStats {
    /// Unit type the stats describe.
    pub key: UnitKey,
    /// Damage dealt per attack.
    pub attack: u32,
    /// Movement speed in world units per second.
    pub speed: f32,
    /// Hit points at spawn.
    pub health: u32,
}

/// Resolves the spawn rules configured for a stage.
pub trait RuleRepository {
    /// Returns the rules of `stage`, or `None` when the stage has none.
    fn rules_for(&self, stage: StageId) -> Option<Vec<SpawnRule>>;
}

/// Resolves static stats by unit type.
pub trait UnitCatalog {
    /// Returns the stats of `key`, if the unit type is known.
    fn lookup_stats(&self, key: &UnitKey) -> Option<UnitStats>;
}

/// Side-effecting operations available on a pooled unit instance.
pub trait UnitInstance {
    /// Assigns combat statistics.
    fn initialize(&mut self, stats: &UnitStats);

    /// Enables or disables collision.
    fn set_collision_enabled(&mut self, enabled: bool);

    /// Moves the instance to `position`.
    fn set_position(&mut self, position: Vec3);
}

/// Shared object pool supplying unit instances.
///
/// Acquisition may fail whenever the pool is exhausted; callers must treat
/// `None` as an expected, recoverable outcome.
pub trait UnitPool {
    /// Instance type managed by the pool.
    type Instance: UnitInstance;

    /// Takes a dormant instance of `key` out of the pool.
    fn acquire(&mut self, key: &UnitKey) -> Option<UnitHandle>;

    /// Grants mutable access to an acquired instance.
    fn instance_mut(&mut self, unit: UnitHandle) -> Option<&mut Self::Instance>;

    /// Returns an acquired instance to the pool. Reports whether it was active.
    fn release(&mut self, unit: UnitHandle) -> bool;
}
