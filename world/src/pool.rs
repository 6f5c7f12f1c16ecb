//! Fixed-capacity object pool that owns every unit instance of the stage.

use std::collections::BTreeMap;

use glam::Vec3;
use stage_spawner_core::{UnitHandle, UnitInstance, UnitKey, UnitPool, UnitStats};

/// Unit instance stored inside the pool.
#[derive(Clone, Debug, PartialEq)]
pub struct PooledUnit {
    handle: UnitHandle,
    key: UnitKey,
    active: bool,
    stats: Option<UnitStats>,
    collision_enabled: bool,
    position: Vec3,
}

impl PooledUnit {
    fn dormant(handle: UnitHandle, key: UnitKey) -> Self {
        Self {
            handle,
            key,
            active: false,
            stats: None,
            collision_enabled: false,
            position: Vec3::ZERO,
        }
    }

    fn reset(&mut self) {
        self.active = false;
        self.stats = None;
        self.collision_enabled = false;
        self.position = Vec3::ZERO;
    }

    /// Handle that identifies the instance.
    #[must_use]
    pub const fn handle(&self) -> UnitHandle {
        self.handle
    }

    /// Unit type of the instance.
    #[must_use]
    pub const fn key(&self) -> &UnitKey {
        &self.key
    }

    /// Reports whether the instance is currently handed out.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Stats assigned during initialization, if any.
    #[must_use]
    pub const fn stats(&self) -> Option<&UnitStats> {
        self.stats.as_ref()
    }

    /// Reports whether collision is enabled.
    #[must_use]
    pub const fn collision_enabled(&self) -> bool {
        self.collision_enabled
    }

    /// Current world position.
    #[must_use]
    pub const fn position(&self) -> Vec3 {
        self.position
    }
}

impl UnitInstance for PooledUnit {
    fn initialize(&mut self, stats: &UnitStats) {
        self.stats = Some(stats.clone());
    }

    fn set_collision_enabled(&mut self, enabled: bool) {
        self.collision_enabled = enabled;
    }

    fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }
}

/// Running totals describing how the pool was used.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Successful acquisitions.
    pub acquired: u32,
    /// Acquisitions refused because the key was exhausted or unknown.
    pub exhausted: u32,
    /// Instances returned to the pool.
    pub released: u32,
}

/// Pool that preallocates a fixed number of instances per unit type.
#[derive(Debug, Default)]
pub struct UnitPoolStore {
    units: Vec<PooledUnit>,
    by_key: BTreeMap<UnitKey, Vec<usize>>,
    stats: PoolStats,
}

impl UnitPoolStore {
    /// Creates a pool holding `capacity` dormant instances for each key.
    #[must_use]
    pub fn with_capacities(capacities: impl IntoIterator<Item = (UnitKey, u32)>) -> Self {
        let mut pool = Self::default();
        for (key, capacity) in capacities {
            for _ in 0..capacity {
                let index = pool.units.len();
                let handle = UnitHandle::new(index as u32);
                pool.units.push(PooledUnit::dormant(handle, key.clone()));
                pool.by_key.entry(key.clone()).or_default().push(index);
            }
        }
        pool
    }

    /// Number of dormant instances left for `key`.
    #[must_use]
    pub fn available(&self, key: &UnitKey) -> u32 {
        self.by_key.get(key).map_or(0, |indices| {
            indices
                .iter()
                .filter(|&&index| !self.units[index].active)
                .count() as u32
        })
    }

    /// Total number of instances allocated for `key`.
    #[must_use]
    pub fn capacity(&self, key: &UnitKey) -> u32 {
        self.by_key.get(key).map_or(0, |indices| indices.len() as u32)
    }

    /// Usage totals accumulated since the pool was created.
    #[must_use]
    pub const fn stats(&self) -> PoolStats {
        self.stats
    }

    /// Looks up an instance by handle.
    #[must_use]
    pub fn unit(&self, unit: UnitHandle) -> Option<&PooledUnit> {
        self.units.get(unit.get() as usize)
    }

    /// Iterates over every instance in handle order.
    pub fn iter(&self) -> impl Iterator<Item = &PooledUnit> {
        self.units.iter()
    }

    /// Returns every active instance to the pool, yielding the reclaimed handles.
    pub(crate) fn reclaim_all(&mut self) -> Vec<(UnitHandle, UnitKey)> {
        let mut reclaimed = Vec::new();
        for unit in self.units.iter_mut().filter(|unit| unit.active) {
            reclaimed.push((unit.handle, unit.key.clone()));
            unit.reset();
        }
        self.stats.released = self.stats.released.saturating_add(reclaimed.len() as u32);
        reclaimed
    }
}

impl UnitPool for UnitPoolStore {
    type Instance = PooledUnit;

    fn acquire(&mut self, key: &UnitKey) -> Option<UnitHandle> {
        let found = self.by_key.get(key).and_then(|indices| {
            indices
                .iter()
                .copied()
                .find(|&index| !self.units[index].active)
        });

        match found {
            Some(index) => {
                let unit = &mut self.units[index];
                unit.active = true;
                self.stats.acquired = self.stats.acquired.saturating_add(1);
                Some(unit.handle)
            }
            None => {
                self.stats.exhausted = self.stats.exhausted.saturating_add(1);
                None
            }
        }
    }

    fn instance_mut(&mut self, unit: UnitHandle) -> Option<&mut PooledUnit> {
        self.units
            .get_mut(unit.get() as usize)
            .filter(|instance| instance.active)
    }

    fn release(&mut self, unit: UnitHandle) -> bool {
        let Some(instance) = self.units.get_mut(unit.get() as usize) else {
            return false;
        };
        if !instance.active {
            return false;
        }
        instance.reset();
        self.stats.released = self.stats.released.saturating_add(1);
        true
    }
}
