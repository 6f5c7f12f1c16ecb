//! Versioned TOML stage files describing rules, unit stats and pool sizes.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::Path,
    time::Duration,
};

use anyhow::{bail, ensure, Context, Result};
use serde::Deserialize;
use stage_spawner_core::{SpawnRule, StageId, UnitKey, UnitStats};
use stage_spawner_system_spawning::{Config, RetryPolicy, SpawnArea};

const SUPPORTED_STAGE_FILE_VERSION: u32 = 1;

/// Validated contents of a stage file.
#[derive(Clone, Debug)]
pub(crate) struct StageFile {
    stage: StageId,
    area: SpawnArea,
    retry: RetryPolicy,
    rules: Vec<SpawnRule>,
    units: Vec<UnitStats>,
    pool: Vec<(UnitKey, u32)>,
}

impl StageFile {
    /// Reads and validates the stage file at `path`.
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read stage file at {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("invalid stage file {}", path.display()))
    }

    /// Parses and validates stage file contents.
    pub(crate) fn parse(contents: &str) -> Result<Self> {
        let raw: RawStageFile =
            toml::from_str(contents).context("failed to parse stage file toml contents")?;
        if raw.version != SUPPORTED_STAGE_FILE_VERSION {
            bail!(
                "unsupported stage file version {}; expected {}",
                raw.version,
                SUPPORTED_STAGE_FILE_VERSION
            );
        }

        let mut rules = Vec::with_capacity(raw.rules.len());
        for (index, rule) in raw.rules.into_iter().enumerate() {
            let [min_interval, max_interval] = rule.interval;
            let [min_batch, max_batch] = rule.batch;
            let parsed = SpawnRule::from_raw(
                StageId::new(rule.stage),
                UnitKey::new(rule.unit),
                (min_interval, max_interval),
                (min_batch, max_batch),
                rule.count,
            )
            .with_context(|| format!("rule {index} is invalid"))?;
            rules.push(parsed);
        }

        let mut seen = BTreeSet::new();
        for stats in &raw.units {
            if !seen.insert(stats.key.clone()) {
                bail!("stage file contains duplicate stats for unit `{}`", stats.key);
            }
        }

        Ok(Self {
            stage: StageId::new(raw.stage),
            area: raw.area.map_or(Ok(SpawnArea::default()), RawArea::resolve)?,
            retry: raw.retry.map_or(Ok(RetryPolicy::default()), RawRetry::resolve)?,
            rules,
            units: raw.units,
            pool: raw
                .pool
                .into_iter()
                .map(|(key, capacity)| (UnitKey::new(key), capacity))
                .collect(),
        })
    }

    /// Stage the file runs unless overridden.
    #[must_use]
    pub(crate) const fn stage(&self) -> StageId {
        self.stage
    }

    /// Rules of every stage in file order.
    #[must_use]
    pub(crate) fn rules(&self) -> &[SpawnRule] {
        &self.rules
    }

    /// Stats of every unit type.
    #[must_use]
    pub(crate) fn units(&self) -> &[UnitStats] {
        &self.units
    }

    /// Pool capacity per unit type.
    #[must_use]
    pub(crate) fn pool(&self) -> &[(UnitKey, u32)] {
        &self.pool
    }

    /// Spawning system configuration for the given seed.
    #[must_use]
    pub(crate) const fn config(&self, seed: u64) -> Config {
        Config::new(seed, self.area).with_retry_policy(self.retry)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStageFile {
    version: u32,
    stage: u32,
    area: Option<RawArea>,
    retry: Option<RawRetry>,
    #[serde(default)]
    rules: Vec<RawRule>,
    #[serde(default)]
    units: Vec<UnitStats>,
    #[serde(default)]
    pool: BTreeMap<String, u32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawArea {
    anchor_x: f32,
    min_y: Option<f32>,
    max_y: Option<f32>,
}

impl RawArea {
    fn resolve(self) -> Result<SpawnArea> {
        ensure!(self.anchor_x.is_finite(), "spawn anchor must be finite");
        let area = SpawnArea::at_anchor(self.anchor_x);
        match (self.min_y, self.max_y) {
            (None, None) => Ok(area),
            (Some(min_y), Some(max_y)) => {
                ensure!(
                    min_y.is_finite() && max_y.is_finite() && min_y <= max_y,
                    "spawn area y range [{min_y}, {max_y}) is invalid"
                );
                Ok(area.with_vertical_range(min_y, max_y))
            }
            _ => bail!("spawn area needs both min_y and max_y"),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRetry {
    max_attempts: u32,
    delay_secs: f32,
}

impl RawRetry {
    fn resolve(self) -> Result<RetryPolicy> {
        ensure!(self.max_attempts > 0, "retry max_attempts must be at least 1");
        let delay = Duration::try_from_secs_f32(self.delay_secs)
            .context("retry delay must be a finite, non-negative number of seconds")?;
        Ok(RetryPolicy::new(self.max_attempts, delay))
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRule {
    stage: u32,
    unit: String,
    interval: [f32; 2],
    batch: [u32; 2],
    count: i64,
}
