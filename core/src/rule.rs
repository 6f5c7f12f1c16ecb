//! Spawn rule configuration and its validation.

use std::time::Duration;

use thiserror::Error;

use crate::{StageId, UnitKey};

/// Raw quota value used by stage data to mark a rule as unbounded.
pub const UNBOUNDED_QUOTA: i64 = -1;

/// Reasons a spawn rule may be rejected while it is constructed.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum RuleError {
    /// An interval bound was negative, NaN, or too large for a [`Duration`].
    #[error("interval bound {value} must be a non-negative number of seconds that fits a duration")]
    InvalidInterval {
        /// Offending bound in seconds.
        value: f32,
    },
    /// The lower interval bound exceeded the upper bound.
    #[error("minimum interval {min}s exceeds maximum interval {max}s")]
    InvertedInterval {
        /// Lower bound in seconds.
        min: f32,
        /// Upper bound in seconds.
        max: f32,
    },
    /// The lower batch bound exceeded the upper bound.
    #[error("minimum spawn count {min} exceeds maximum spawn count {max}")]
    InvertedBatch {
        /// Lower bound of the batch size.
        min: u32,
        /// Upper bound of the batch size.
        max: u32,
    },
    /// The raw quota was below `-1`.
    #[error("spawn count {0} is invalid; expected -1 or a non-negative total")]
    InvalidQuota(i64),
}

/// Inclusive range of seconds a task waits before each batch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IntervalRange {
    min_secs: f32,
    max_secs: f32,
}

impl IntervalRange {
    /// Validates and creates a new interval range.
    pub fn new(min_secs: f32, max_secs: f32) -> Result<Self, RuleError> {
        for value in [min_secs, max_secs] {
            if Duration::try_from_secs_f32(value).is_err() {
                return Err(RuleError::InvalidInterval { value });
            }
        }

        if min_secs > max_secs {
            return Err(RuleError::InvertedInterval {
                min: min_secs,
                max: max_secs,
            });
        }

        Ok(Self { min_secs, max_secs })
    }

    /// Shortest wait in seconds.
    #[must_use]
    pub const fn min_secs(&self) -> f32 {
        self.min_secs
    }

    /// Longest wait in seconds.
    #[must_use]
    pub const fn max_secs(&self) -> f32 {
        self.max_secs
    }

    /// Converts a sampled number of seconds into a clamped [`Duration`].
    #[must_use]
    pub fn to_duration(&self, secs: f32) -> Duration {
        Duration::try_from_secs_f32(secs.clamp(self.min_secs, self.max_secs))
            .unwrap_or(Duration::MAX)
    }
}

/// Inclusive range of units attempted in a single batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BatchRange {
    min: u32,
    max: u32,
}

impl BatchRange {
    /// Validates and creates a new batch range.
    pub const fn new(min: u32, max: u32) -> Result<Self, RuleError> {
        if min > max {
            return Err(RuleError::InvertedBatch { min, max });
        }
        Ok(Self { min, max })
    }

    /// Smallest batch size.
    #[must_use]
    pub const fn min(&self) -> u32 {
        self.min
    }

    /// Largest batch size.
    #[must_use]
    pub const fn max(&self) -> u32 {
        self.max
    }

    /// Reports whether `size` lies within the inclusive range.
    #[must_use]
    pub const fn contains(&self, size: u32) -> bool {
        size >= self.min && size <= self.max
    }
}

/// Total number of units a rule may attempt during a stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SpawnQuota {
    /// The rule keeps spawning until the stage ends.
    Unbounded,
    /// The rule completes once this many units were attempted.
    Limited(u32),
}

impl SpawnQuota {
    /// Converts the stage data convention (`-1` for unbounded) into a quota.
    pub fn from_raw(raw: i64) -> Result<Self, RuleError> {
        match raw {
            UNBOUNDED_QUOTA => Ok(Self::Unbounded),
            value if value >= 0 => u32::try_from(value)
                .map(Self::Limited)
                .map_err(|_| RuleError::InvalidQuota(raw)),
            _ => Err(RuleError::InvalidQuota(raw)),
        }
    }

    /// Converts the quota back into the stage data convention.
    #[must_use]
    pub fn to_raw(self) -> i64 {
        match self {
            Self::Unbounded => UNBOUNDED_QUOTA,
            Self::Limited(total) => i64::from(total),
        }
    }

    /// Reports whether `spawned` attempts satisfy the quota.
    ///
    /// Unbounded quotas are never met.
    #[must_use]
    pub const fn is_met(self, spawned: u32) -> bool {
        match self {
            Self::Unbounded => false,
            Self::Limited(total) => spawned >= total,
        }
    }
}

/// Immutable configuration describing one spawn pattern within a stage.
#[derive(Clone, Debug, PartialEq)]
pub struct SpawnRule {
    stage: StageId,
    key: UnitKey,
    interval: IntervalRange,
    batch: BatchRange,
    quota: SpawnQuota,
}

impl SpawnRule {
    /// Creates a rule from already validated parts.
    #[must_use]
    pub fn new(
        stage: StageId,
        key: UnitKey,
        interval: IntervalRange,
        batch: BatchRange,
        quota: SpawnQuota,
    ) -> Self {
        Self {
            stage,
            key,
            interval,
            batch,
            quota,
        }
    }

    /// Creates a rule from the raw values used by stage data files.
    pub fn from_raw(
        stage: StageId,
        key: UnitKey,
        interval_secs: (f32, f32),
        spawn_count: (u32, u32),
        quota: i64,
    ) -> Result<Self, RuleError> {
        Ok(Self::new(
            stage,
            key,
            IntervalRange::new(interval_secs.0, interval_secs.1)?,
            BatchRange::new(spawn_count.0, spawn_count.1)?,
            SpawnQuota::from_raw(quota)?,
        ))
    }

    /// Stage the rule belongs to.
    #[must_use]
    pub const fn stage(&self) -> StageId {
        self.stage
    }

    /// Unit type spawned by the rule.
    #[must_use]
    pub const fn key(&self) -> &UnitKey {
        &self.key
    }

    /// Wait bounds applied before each batch.
    #[must_use]
    pub const fn interval(&self) -> IntervalRange {
        self.interval
    }

    /// Batch size bounds.
    #[must_use]
    pub const fn batch(&self) -> BatchRange {
        self.batch
    }

    /// Total quota of attempted units.
    #[must_use]
    pub const fn quota(&self) -> SpawnQuota {
        self.quota
    }
}
