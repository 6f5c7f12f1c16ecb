//! Read-only stage data: spawn rules and unit stats.

use std::collections::BTreeMap;

use stage_spawner_core::{RuleRepository, SpawnRule, StageId, UnitCatalog, UnitKey, UnitStats};

/// Rules of every stage, kept in load order.
#[derive(Clone, Debug, Default)]
pub struct RuleTable {
    rules: Vec<SpawnRule>,
}

impl RuleTable {
    /// Creates a table from rules in load order.
    #[must_use]
    pub fn new(rules: Vec<SpawnRule>) -> Self {
        Self { rules }
    }

    /// Every loaded rule regardless of stage.
    #[must_use]
    pub fn rules(&self) -> &[SpawnRule] {
        &self.rules
    }
}

impl RuleRepository for RuleTable {
    fn rules_for(&self, stage: StageId) -> Option<Vec<SpawnRule>> {
        let matching: Vec<SpawnRule> = self
            .rules
            .iter()
            .filter(|rule| rule.stage() == stage)
            .cloned()
            .collect();
        if matching.is_empty() {
            None
        } else {
            Some(matching)
        }
    }
}

/// Static stats indexed by unit type.
#[derive(Clone, Debug, Default)]
pub struct StatsTable {
    entries: BTreeMap<UnitKey, UnitStats>,
}

impl StatsTable {
    /// Creates a table from stat definitions. Later entries replace earlier ones.
    #[must_use]
    pub fn new(stats: impl IntoIterator<Item = UnitStats>) -> Self {
        let mut entries = BTreeMap::new();
        for definition in stats {
            let _ = entries.insert(definition.key.clone(), definition);
        }
        Self { entries }
    }

    /// Number of unit types with stats.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Reports whether no stats were loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl UnitCatalog for StatsTable {
    fn lookup_stats(&self, key: &UnitKey) -> Option<UnitStats> {
        self.entries.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(stage: u32, key: &str) -> SpawnRule {
        SpawnRule::from_raw(StageId::new(stage), UnitKey::new(key), (1.0, 2.0), (1, 3), 10)
            .expect("valid rule")
    }

    #[test]
    fn rules_are_filtered_by_stage_in_load_order() {
        let table = RuleTable::new(vec![rule(1, "slime"), rule(2, "bat"), rule(1, "golem")]);

        let stage_one = table.rules_for(StageId::new(1)).expect("stage one rules");
        let keys: Vec<&str> = stage_one.iter().map(|rule| rule.key().as_str()).collect();
        assert_eq!(keys, ["slime", "golem"]);
    }

    #[test]
    fn unknown_stage_is_absent() {
        let table = RuleTable::new(vec![rule(1, "slime")]);
        assert!(table.rules_for(StageId::new(9)).is_none());
    }

    #[test]
    fn duplicate_rules_are_preserved() {
        let table = RuleTable::new(vec![rule(1, "slime"), rule(1, "slime")]);
        assert_eq!(table.rules_for(StageId::new(1)).map(|rules| rules.len()), Some(2));
    }

    #[test]
    fn stats_lookup_uses_latest_definition() {
        let table = StatsTable::new([
            UnitStats {
                key: UnitKey::new("slime"),
                attack: 1,
                speed: 0.5,
                health: 10,
            },
            UnitStats {
                key: UnitKey::new("slime"),
                attack: 2,
                speed: 0.5,
                health: 12,
            },
        ]);

        assert_eq!(table.len(), 1);
        let stats = table.lookup_stats(&UnitKey::new("slime")).expect("slime stats");
        assert_eq!(stats.attack, 2);
        assert!(table.lookup_stats(&UnitKey::new("bat")).is_none());
    }
}
